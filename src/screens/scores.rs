use std::sync::OnceLock;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    widgets::{Block, Paragraph},
    Frame,
};

use crate::ledger::{Ledger, Team};
use crate::registry::Registry;
use crate::screen::{screen_registry, ScreenBase, ScreenVariant, BACKGROUND, FOREGROUND};

use super::draw_centered;

/// One coloured box per team with its name and score.
#[derive(Debug)]
pub struct Scores {
    base: ScreenBase,
}

impl Scores {
    pub fn new() -> Self {
        Self {
            base: ScreenBase::new::<Self>(),
        }
    }
}

impl Default for Scores {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenVariant for Scores {
    const NAME: &'static str = "Scores";
    const STYLES: &'static [&'static str] = &["stacked", "even_boxes"];

    fn base(&self) -> &ScreenBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ScreenBase {
        &mut self.base
    }

    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<Scores>> = OnceLock::new();
        REGISTRY.get_or_init(screen_registry::<Self>)
    }

    // Scores change through the engine, never through this screen.
    fn stays_dirty(&self) -> bool {
        true
    }

    fn draw(&self, style: &str, frame: &mut Frame, area: Rect, ledger: &Ledger) {
        if ledger.is_empty() {
            return;
        }
        match style {
            "even_boxes" => draw_even_boxes(frame, area, ledger),
            _ => draw_stacked(frame, area, ledger),
        }
    }
}

/// Leader at the top. Ties keep ledger order.
fn draw_stacked(frame: &mut Frame, area: Rect, ledger: &Ledger) {
    let mut teams: Vec<&Team> = ledger.teams().iter().collect();
    teams.sort_by(|a, b| b.score.cmp(&a.score));
    let rows = split_evenly(area, Direction::Vertical, teams.len());
    for (team, row) in teams.into_iter().zip(rows.iter()) {
        draw_team(frame, *row, team);
    }
}

/// Smallest square grid that holds every team, filled column by column.
fn draw_even_boxes(frame: &mut Frame, area: Rect, ledger: &Ledger) {
    let n_teams = ledger.len();
    let mut n_cols = 1;
    while n_cols * n_cols < n_teams {
        n_cols += 1;
    }
    let columns = split_evenly(area, Direction::Horizontal, n_cols);
    let cells: Vec<Vec<Rect>> = columns
        .iter()
        .map(|column| split_evenly(*column, Direction::Vertical, n_cols))
        .collect();
    for (n_team, team) in ledger.teams().iter().enumerate() {
        let (across, down) = (n_team / n_cols, n_team % n_cols);
        draw_team(frame, cells[across][down], team);
    }
}

fn split_evenly(area: Rect, direction: Direction, parts: usize) -> Vec<Rect> {
    let parts = parts.max(1);
    Layout::default()
        .direction(direction)
        .constraints(vec![Constraint::Ratio(1, parts as u32); parts])
        .split(area)
        .to_vec()
}

fn draw_team(frame: &mut Frame, area: Rect, team: &Team) {
    frame.render_widget(Block::default().bg(Color::from(team.colour())), area);
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(area);
    let title = Paragraph::new(team.name.clone())
        .style(
            Style::default()
                .fg(FOREGROUND)
                .bg(BACKGROUND)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    frame.render_widget(title, parts[0]);
    draw_centered(
        frame,
        parts[1],
        &team.score.to_string(),
        team.text_colour().into(),
        true,
    );
}
