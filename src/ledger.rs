//! Teams, colours and scores. Teams are addressed by position, so nothing here
//! ever reorders the ledger.

use std::fmt;
use std::str::FromStr;

use ratatui::style::Color;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no such team '{0}'")]
    NoSuchTeam(String),
    #[error("invalid colour '{0}'")]
    InvalidColour(String),
    #[error("invalid score '{value}': {reason}")]
    InvalidScore { value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// HSL lightness in percent.
    pub fn lightness(self) -> f64 {
        let Rgb(r, g, b) = self;
        let max = r.max(g).max(b) as f64;
        let min = r.min(g).min(b) as f64;
        (max + min) / 2.0 / 255.0 * 100.0
    }

    pub fn is_dark(self) -> bool {
        self.lightness() < 72.0
    }

    /// Text colour that stays readable on top of this one.
    pub fn contrast(self) -> Rgb {
        if self.is_dark() {
            Rgb::WHITE
        } else {
            Rgb::BLACK
        }
    }

    pub fn to_hex(self) -> String {
        let Rgb(r, g, b) = self;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = LedgerError;

    /// Accepts `#rrggbb`, `rrggbb` or one of the palette names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some((_, rgb)) = PALETTE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        {
            return Ok(*rgb);
        }
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LedgerError::InvalidColour(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| LedgerError::InvalidColour(s.to_string()))
        };
        Ok(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl From<Rgb> for Color {
    fn from(Rgb(r, g, b): Rgb) -> Self {
        Color::Rgb(r, g, b)
    }
}

/// Colours handed out to new teams, in order, wrapping around.
pub const PALETTE: &[(&str, Rgb)] = &[
    ("red", Rgb(255, 0, 0)),
    ("green", Rgb(0, 255, 0)),
    ("yellow", Rgb(255, 255, 0)),
    ("blue", Rgb(0, 0, 255)),
    ("purple", Rgb(160, 32, 240)),
    ("orange", Rgb(255, 165, 0)),
    ("royalblue", Rgb(65, 105, 225)),
    ("salmon", Rgb(250, 128, 114)),
    ("wheat", Rgb(245, 222, 179)),
];

/// Names for teams created without one.
pub const FALLBACK_NAMES: &[&str] = &["Haddock", "Kippers", "Plaice", "Trout", "Salmon", "Halibut"];

/// Deterministic round-robin over a fixed, non-empty table.
#[derive(Debug, Clone)]
struct Cycle<T: 'static> {
    items: &'static [T],
    position: usize,
}

impl<T: Copy> Cycle<T> {
    fn new(items: &'static [T]) -> Self {
        Self { items, position: 0 }
    }

    fn advance(&mut self) -> T {
        let item = self.items[self.position];
        self.position = (self.position + 1) % self.items.len();
        item
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: String,
    pub score: i64,
    colour: Rgb,
    text_colour: Rgb,
}

impl Team {
    fn new(name: String, colour: Rgb) -> Self {
        Self {
            name,
            score: 0,
            colour,
            text_colour: colour.contrast(),
        }
    }

    pub fn colour(&self) -> Rgb {
        self.colour
    }

    pub fn text_colour(&self) -> Rgb {
        self.text_colour
    }

    pub fn set_colour(&mut self, colour: Rgb) {
        self.colour = colour;
        self.text_colour = colour.contrast();
    }
}

/// How a `score` directive changes a team's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreChange {
    Set(i64),
    Add(i64),
}

impl ScoreChange {
    pub fn apply(self, score: i64) -> i64 {
        match self {
            ScoreChange::Set(value) => value,
            ScoreChange::Add(delta) => score.saturating_add(delta),
        }
    }
}

impl FromStr for ScoreChange {
    type Err = LedgerError;

    /// `=5` assigns; `+2`, `-1` and a bare `3` are deltas.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = |err: std::num::ParseIntError| LedgerError::InvalidScore {
            value: s.to_string(),
            reason: err.to_string(),
        };
        match trimmed.strip_prefix('=') {
            Some(value) => value.trim().parse().map(ScoreChange::Set).map_err(invalid),
            None => trimmed.parse().map(ScoreChange::Add).map_err(invalid),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreUpdate {
    pub before: i64,
    pub after: i64,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    teams: Vec<Team>,
    colours: Cycle<(&'static str, Rgb)>,
    names: Cycle<&'static str>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            teams: Vec::new(),
            colours: Cycle::new(PALETTE),
            names: Cycle::new(FALLBACK_NAMES),
        }
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Team> {
        self.teams.get(index)
    }

    /// Returns the team at `index`, appending placeholder teams up to it.
    pub fn ensure(&mut self, index: usize) -> &mut Team {
        while self.teams.len() <= index {
            let (_, colour) = self.colours.advance();
            let name = self.names.advance().to_string();
            self.teams.push(Team::new(name, colour));
        }
        &mut self.teams[index]
    }

    pub fn rename(&mut self, index: usize, name: &str) {
        self.ensure(index).name = name.to_string();
    }

    /// Removes a team; later teams move down one place.
    pub fn remove(&mut self, index: usize) -> Result<Team, LedgerError> {
        if index >= self.teams.len() {
            return Err(LedgerError::NoSuchTeam(index.to_string()));
        }
        Ok(self.teams.remove(index))
    }

    /// Resolves a team reference: a position first, then a case-insensitive name.
    pub fn resolve(&self, reference: &str) -> Result<usize, LedgerError> {
        let reference = reference.trim();
        if let Ok(index) = reference.parse::<usize>() {
            return if index < self.teams.len() {
                Ok(index)
            } else {
                Err(LedgerError::NoSuchTeam(reference.to_string()))
            };
        }
        let wanted = reference.to_lowercase();
        self.teams
            .iter()
            .position(|team| team.name.to_lowercase() == wanted)
            .ok_or_else(|| LedgerError::NoSuchTeam(reference.to_string()))
    }

    pub fn apply_score(&mut self, index: usize, change: ScoreChange) -> Result<ScoreUpdate, LedgerError> {
        let team = self
            .teams
            .get_mut(index)
            .ok_or_else(|| LedgerError::NoSuchTeam(index.to_string()))?;
        let before = team.score;
        team.score = change.apply(before);
        Ok(ScoreUpdate {
            before,
            after: team.score,
        })
    }

    pub fn set_colour(&mut self, index: usize, colour: Rgb) -> Result<(), LedgerError> {
        let team = self
            .teams
            .get_mut(index)
            .ok_or_else(|| LedgerError::NoSuchTeam(index.to_string()))?;
        team.set_colour(colour);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.teams.iter().map(|team| team.name.as_str())
    }

    pub fn scores(&self) -> impl Iterator<Item = i64> + '_ {
        self.teams.iter().map(|team| team.score)
    }

    pub fn hex_colours(&self) -> impl Iterator<Item = String> + '_ {
        self.teams.iter().map(|team| team.colour.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_a_distant_team_fills_the_gap() {
        let mut ledger = Ledger::new();
        ledger.rename(3, "X");
        assert_eq!(ledger.len(), 4);
        let names: Vec<&str> = ledger.names().collect();
        assert_eq!(names, vec!["Haddock", "Kippers", "Plaice", "X"]);
        assert!(ledger.scores().all(|s| s == 0));
    }

    #[test]
    fn palette_and_names_wrap_around() {
        let mut ledger = Ledger::new();
        ledger.ensure(9);
        assert_eq!(ledger.get(0).unwrap().colour(), Rgb(255, 0, 0));
        assert_eq!(ledger.get(8).unwrap().colour(), Rgb(245, 222, 179));
        assert_eq!(ledger.get(9).unwrap().colour(), Rgb(255, 0, 0));
        assert_eq!(ledger.get(6).unwrap().name, "Haddock");
        assert_eq!(ledger.get(7).unwrap().name, "Kippers");
    }

    #[test]
    fn text_colour_follows_colour() {
        let mut ledger = Ledger::new();
        let team = ledger.ensure(0);
        assert_eq!(team.colour(), Rgb(255, 0, 0));
        assert_eq!(team.text_colour(), Rgb::WHITE);
        team.set_colour("wheat".parse().unwrap());
        assert_eq!(team.text_colour(), Rgb::BLACK);
        ledger.set_colour(0, Rgb(10, 10, 40)).unwrap();
        assert_eq!(ledger.get(0).unwrap().text_colour(), Rgb::WHITE);
    }

    #[test]
    fn remove_compacts_later_teams() {
        let mut ledger = Ledger::new();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            ledger.rename(i, name);
        }
        let removed = ledger.remove(1).unwrap();
        assert_eq!(removed.name, "b");
        let names: Vec<&str> = ledger.names().collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(ledger.remove(5), Err(LedgerError::NoSuchTeam("5".into())));
    }

    #[test]
    fn resolve_by_index_or_name() {
        let mut ledger = Ledger::new();
        ledger.rename(0, "Quizzy Rascals");
        ledger.rename(1, "Brains");
        assert_eq!(ledger.resolve("1"), Ok(1));
        assert_eq!(ledger.resolve("quizzy rascals"), Ok(0));
        assert_eq!(ledger.resolve("BRAINS"), Ok(1));
        assert!(matches!(ledger.resolve("2"), Err(LedgerError::NoSuchTeam(_))));
        assert!(matches!(ledger.resolve("nobody"), Err(LedgerError::NoSuchTeam(_))));
    }

    #[test]
    fn score_delta_versus_assignment() {
        let mut ledger = Ledger::new();
        ledger.ensure(0);
        ledger.apply_score(0, ScoreChange::Set(5)).unwrap();
        let update = ledger.apply_score(0, "+2".parse().unwrap()).unwrap();
        assert_eq!(update, ScoreUpdate { before: 5, after: 7 });
        let update = ledger.apply_score(0, "=2".parse().unwrap()).unwrap();
        assert_eq!(update.after, 2);
        ledger.apply_score(0, "-3".parse().unwrap()).unwrap();
        ledger.apply_score(0, "4".parse().unwrap()).unwrap();
        assert_eq!(ledger.get(0).unwrap().score, 3);
    }

    #[test]
    fn score_change_rejects_garbage() {
        assert!("=".parse::<ScoreChange>().is_err());
        assert!("lots".parse::<ScoreChange>().is_err());
        assert_eq!("= 4".parse::<ScoreChange>(), Ok(ScoreChange::Set(4)));
    }

    #[test]
    fn hex_colours_parse_back_to_stored_colours() {
        let mut ledger = Ledger::new();
        ledger.ensure(8);
        for (hex, team) in ledger.hex_colours().zip(ledger.teams()) {
            assert_eq!(hex.parse::<Rgb>().unwrap(), team.colour());
        }
    }

    #[test]
    fn rgb_parsing() {
        assert_eq!("#0a0B0c".parse::<Rgb>(), Ok(Rgb(10, 11, 12)));
        assert_eq!("ff8000".parse::<Rgb>(), Ok(Rgb(255, 128, 0)));
        assert_eq!("RoyalBlue".parse::<Rgb>(), Ok(Rgb(65, 105, 225)));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
        assert!("#+1+2+3".parse::<Rgb>().is_err());
        assert!("-1-2-3".parse::<Rgb>().is_err());
    }
}
