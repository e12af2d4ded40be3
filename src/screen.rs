//! What every panel screen can do: take directives and queries through its
//! registry, claim input events, and render itself when dirty.
//!
//! Concrete screens implement [`ScreenVariant`]; panels hold them as
//! `Box<dyn Screen>` through the blanket impl below.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Margin, Rect},
    style::{Color, Stylize},
    widgets::Block,
    Frame,
};
use tracing::info;

use crate::audio::Audio;
use crate::ledger::Ledger;
use crate::protocol::Feedback;
use crate::registry::{CommandError, Outcome, Registry};

pub const BACKGROUND: Color = Color::Black;
pub const FOREGROUND: Color = Color::White;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Left,
    Right,
}

impl Position {
    pub const ALL: [Position; 2] = [Position::Left, Position::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Position::Left => "left",
            Position::Right => "right",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(Position::Left),
            "right" => Ok(Position::Right),
            _ => Err(CommandError::UnknownPosition(s.to_string())),
        }
    }
}

/// Discrete events offered to the engine and then each screen, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    Resize(u16, u16),
    Key(char),
    TimerFired(Position),
    ScoresChanged,
}

impl InputEvent {
    pub fn from_terminal(event: Event) -> Option<Self> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Esc => Some(InputEvent::Quit),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(InputEvent::Quit)
                }
                KeyCode::Char(c) => Some(InputEvent::Key(c)),
                _ => None,
            },
            Event::Resize(width, height) => Some(InputEvent::Resize(width, height)),
            _ => None,
        }
    }
}

/// What a screen gets from the engine when it is built.
#[derive(Clone)]
pub struct ScreenEnv {
    pub position: Position,
    pub audio: Arc<dyn Audio>,
    pub finish_hold: Duration,
    pub greeting: String,
}

impl fmt::Debug for ScreenEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenEnv")
            .field("position", &self.position)
            .field("finish_hold", &self.finish_hold)
            .field("greeting", &self.greeting)
            .finish_non_exhaustive()
    }
}

/// Style selection and redraw state shared by every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenBase {
    pub style: &'static str,
    pub is_dirty: bool,
}

impl ScreenBase {
    pub fn new<T: ScreenVariant>() -> Self {
        Self {
            style: T::STYLES[0],
            is_dirty: true,
        }
    }
}

pub trait ScreenVariant: Sized + Send + 'static {
    const NAME: &'static str;
    /// Renderer names. The first one is the default style.
    const STYLES: &'static [&'static str];

    fn base(&self) -> &ScreenBase;
    fn base_mut(&mut self) -> &mut ScreenBase;
    fn registry() -> &'static Registry<Self>;

    /// Variant-specific fields reported by `state?`.
    fn extra_state(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Claims an event; instructions it raises go to the back of the queue.
    fn on_event(&mut self, _event: &InputEvent, _raised: &mut Vec<String>) -> bool {
        false
    }

    fn poll_timer(&mut self, _now: Instant) -> bool {
        false
    }

    /// Instructions to run straight after the current one, before anything
    /// else queued.
    fn follow_ups(&mut self) -> Vec<String> {
        Vec::new()
    }

    /// True when content can change without a directive reaching this screen.
    fn stays_dirty(&self) -> bool {
        false
    }

    fn draw(&self, style: &str, frame: &mut Frame, area: Rect, ledger: &Ledger);
}

/// Object-safe face of a screen, as held by a panel.
pub trait Screen: Send {
    fn name(&self) -> &'static str;
    fn style(&self) -> &'static str;
    fn is_dirty(&self) -> bool;
    fn mark_dirty(&mut self);
    fn exposes(&self, handler: &str) -> bool;
    fn commands(&self) -> Vec<String>;
    fn params(&self, handler: &str) -> Option<&'static [&'static str]>;
    fn invoke(&mut self, handler: &str, args: &[String]) -> Option<Outcome>;
    fn handle_event(&mut self, event: &InputEvent, raised: &mut Vec<String>) -> bool;
    fn timer_due(&mut self, now: Instant) -> bool;
    fn take_follow_ups(&mut self) -> Vec<String>;
    fn render(&mut self, frame: &mut Frame, area: Rect, ledger: &Ledger);
}

impl<T: ScreenVariant> Screen for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn style(&self) -> &'static str {
        self.base().style
    }

    fn is_dirty(&self) -> bool {
        self.base().is_dirty
    }

    fn mark_dirty(&mut self) {
        self.base_mut().is_dirty = true;
    }

    fn exposes(&self, handler: &str) -> bool {
        T::registry().contains(handler)
    }

    fn commands(&self) -> Vec<String> {
        T::registry().commands().collect()
    }

    fn params(&self, handler: &str) -> Option<&'static [&'static str]> {
        T::registry().params(handler)
    }

    fn invoke(&mut self, handler: &str, args: &[String]) -> Option<Outcome> {
        T::registry().invoke(self, handler, args)
    }

    fn handle_event(&mut self, event: &InputEvent, raised: &mut Vec<String>) -> bool {
        self.on_event(event, raised)
    }

    fn timer_due(&mut self, now: Instant) -> bool {
        self.poll_timer(now)
    }

    fn take_follow_ups(&mut self) -> Vec<String> {
        self.follow_ups()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, ledger: &Ledger) {
        frame.render_widget(Block::default().bg(BACKGROUND), area);
        let inner = area.inner(Margin::new(1, 1));
        self.draw(self.base().style, frame, inner, ledger);
        if !self.stays_dirty() {
            self.base_mut().is_dirty = false;
        }
    }
}

/// A registry preloaded with the commands every screen answers.
pub fn screen_registry<T: ScreenVariant>() -> Registry<T> {
    Registry::new()
        .directive("style", &["style"], do_style::<T>)
        .query("styles", &[], get_styles::<T>)
        .query("state", &[], get_state::<T>)
}

fn do_style<T: ScreenVariant>(screen: &mut T, args: &[String]) -> Outcome {
    let requested = args
        .first()
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "default".to_string());
    let style = if requested == "default" {
        T::STYLES[0]
    } else {
        T::STYLES
            .iter()
            .copied()
            .find(|style| *style == requested)
            .ok_or(CommandError::UnknownStyle(requested))?
    };
    let base = screen.base_mut();
    base.style = style;
    base.is_dirty = true;
    info!(screen = T::NAME, style, "style selected");
    Ok(None)
}

fn get_styles<T: ScreenVariant>(_: &T, _: &[String]) -> Result<String, CommandError> {
    Ok(Feedback::new("STYLES").arg(T::STYLES.join(",")).into())
}

fn get_state<T: ScreenVariant>(screen: &T, _: &[String]) -> Result<String, CommandError> {
    let mut feedback = Feedback::new("STATE")
        .arg(T::NAME)
        .field("style", screen.base().style)
        .field("styles", T::STYLES.join(","));
    for (key, value) in screen.extra_state() {
        feedback = feedback.field(key, value);
    }
    Ok(feedback.into())
}
