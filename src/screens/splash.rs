use std::sync::OnceLock;

use ratatui::{layout::Rect, Frame};

use crate::ledger::Ledger;
use crate::registry::{Outcome, Registry};
use crate::screen::{screen_registry, ScreenBase, ScreenEnv, ScreenVariant, FOREGROUND};

use super::draw_centered;

/// A greeting in large letters.
#[derive(Debug)]
pub struct Splash {
    base: ScreenBase,
    greetings: String,
}

impl Splash {
    pub fn new(env: &ScreenEnv) -> Self {
        Self {
            base: ScreenBase::new::<Self>(),
            greetings: env.greeting.clone(),
        }
    }

    fn do_reset(&mut self, args: &[String]) -> Outcome {
        self.greetings = args.join(" ");
        self.base.is_dirty = true;
        Ok(None)
    }
}

impl ScreenVariant for Splash {
    const NAME: &'static str = "Splash";
    const STYLES: &'static [&'static str] = &["default"];

    fn base(&self) -> &ScreenBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ScreenBase {
        &mut self.base
    }

    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<Splash>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            screen_registry::<Self>().directive("reset", &["greetings"], Self::do_reset)
        })
    }

    fn extra_state(&self) -> Vec<(&'static str, String)> {
        vec![("greetings", self.greetings.clone())]
    }

    fn draw(&self, _style: &str, frame: &mut Frame, area: Rect, _ledger: &Ledger) {
        draw_centered(frame, area, &self.greetings, FOREGROUND, true);
    }
}
