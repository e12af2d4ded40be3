use std::sync::OnceLock;

use ratatui::{layout::Rect, Frame};

use crate::ledger::Ledger;
use crate::registry::Registry;
use crate::screen::{screen_registry, ScreenBase, ScreenVariant};

/// Nothing but background.
#[derive(Debug)]
pub struct Blank {
    base: ScreenBase,
}

impl Blank {
    pub fn new() -> Self {
        Self {
            base: ScreenBase::new::<Self>(),
        }
    }
}

impl Default for Blank {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenVariant for Blank {
    const NAME: &'static str = "Blank";
    const STYLES: &'static [&'static str] = &["default"];

    fn base(&self) -> &ScreenBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ScreenBase {
        &mut self.base
    }

    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<Blank>> = OnceLock::new();
        REGISTRY.get_or_init(screen_registry::<Self>)
    }

    fn draw(&self, _style: &str, _frame: &mut Frame, _area: Rect, _ledger: &Ledger) {}
}
