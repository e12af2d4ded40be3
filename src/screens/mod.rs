//! The fixed set of screens a panel can show.

mod blank;
mod countdown;
mod scores;
mod splash;

use std::str::FromStr;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::Paragraph,
    Frame,
};
use tui_big_text::{BigText, PixelSize};

pub use blank::Blank;
pub use countdown::Countdown;
pub use scores::Scores;
pub use splash::Splash;

use crate::registry::CommandError;
use crate::screen::{Screen, ScreenEnv, ScreenVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Splash,
    Scores,
    Countdown,
    Blank,
}

impl ScreenKind {
    pub const ALL: [ScreenKind; 4] = [
        ScreenKind::Splash,
        ScreenKind::Scores,
        ScreenKind::Countdown,
        ScreenKind::Blank,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScreenKind::Splash => Splash::NAME,
            ScreenKind::Scores => Scores::NAME,
            ScreenKind::Countdown => Countdown::NAME,
            ScreenKind::Blank => Blank::NAME,
        }
    }

    pub fn build(self, env: &ScreenEnv) -> Box<dyn Screen> {
        match self {
            ScreenKind::Splash => Box::new(Splash::new(env)),
            ScreenKind::Scores => Box::new(Scores::new()),
            ScreenKind::Countdown => Box::new(Countdown::new(env)),
            ScreenKind::Blank => Box::new(Blank::new()),
        }
    }
}

impl FromStr for ScreenKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CommandError::UnknownScreen(s.to_string()))
    }
}

/// Draws `text` centred in `area`, as large as fits: full-size block letters,
/// then quadrant letters, then a plain bold line.
pub(crate) fn draw_centered(frame: &mut Frame, area: Rect, text: &str, colour: Color, large: bool) {
    let sizes: &[(PixelSize, u16, u16)] = if large {
        &[(PixelSize::Full, 8, 8), (PixelSize::Quadrant, 4, 4)]
    } else {
        &[(PixelSize::Quadrant, 4, 4)]
    };
    let chars = text.chars().count() as u16;
    for &(pixel_size, char_width, height) in sizes {
        if area.width >= chars.saturating_mul(char_width) && area.height >= height {
            let big_text = BigText::builder()
                .pixel_size(pixel_size)
                .style(Style::default().fg(colour))
                .lines(vec![text.to_string().into()])
                .alignment(Alignment::Center)
                .build();
            frame.render_widget(big_text, middle_rows(area, height));
            return;
        }
    }
    let line = Paragraph::new(text.to_string())
        .style(Style::default().fg(colour).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    frame.render_widget(line, middle_rows(area, 1));
}

fn middle_rows(area: Rect, height: u16) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(height), Constraint::Min(0)])
        .split(area);
    chunks[1]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use ratatui::{backend::TestBackend, Terminal};

    use crate::audio::testing::RecordingAudio;
    use crate::ledger::Ledger;
    use crate::screen::{Position, Screen, ScreenEnv};

    pub fn env(audio: &RecordingAudio) -> ScreenEnv {
        ScreenEnv {
            position: Position::Left,
            audio: Arc::new(audio.clone()),
            finish_hold: Duration::ZERO,
            greeting: "Westpark Quiz".to_string(),
        }
    }

    /// Renders a screen on a test terminal and returns the visible text.
    pub fn render_text(screen: &mut dyn Screen, ledger: &Ledger, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|frame| screen.render(frame, frame.area(), ledger))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::env;
    use super::*;
    use crate::audio::testing::RecordingAudio;

    #[test]
    fn variant_lookup_ignores_case() {
        assert_eq!("countdown".parse::<ScreenKind>().unwrap(), ScreenKind::Countdown);
        assert_eq!("SCORES".parse::<ScreenKind>().unwrap(), ScreenKind::Scores);
        assert!(matches!(
            "Leaderboard".parse::<ScreenKind>(),
            Err(CommandError::UnknownScreen(_))
        ));
    }

    #[test]
    fn every_variant_builds_under_its_own_name() {
        let env = env(&RecordingAudio::default());
        for kind in ScreenKind::ALL {
            let mut screen = kind.build(&env);
            assert_eq!(screen.name(), kind.name());
            assert!(screen.is_dirty());
            let styles = screen.invoke("get_styles", &[]).unwrap().unwrap().unwrap();
            assert!(styles.contains(screen.style()), "{styles}");
        }
    }
}
