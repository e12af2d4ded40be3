use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::AudioBackend;

/// Display settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind: SocketAddr,
    pub fps: u32,
    pub greeting: String,
    pub command_capacity: usize,
    pub quit_flush_ms: u64,
    pub finish_hold_ms: u64,
    pub audio: AudioBackend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 1234)),
            fps: 5,
            greeting: "Westpark Quiz".to_string(),
            command_capacity: 100,
            quit_flush_ms: 250,
            finish_hold_ms: 1500,
            audio: AudioBackend::Silent,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(settings)
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }

    pub fn quit_flush(&self) -> Duration {
        Duration::from_millis(self.quit_flush_ms)
    }

    pub fn finish_hold(&self) -> Duration {
        Duration::from_millis(self.finish_hold_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial() {
        let settings: Settings = serde_json::from_str(
            r#"{ "bind": "0.0.0.0:4000", "greeting": "Pub Quiz", "audio": "bell" }"#,
        )
        .expect("Failed to deserialize");
        assert_eq!(settings.bind.port(), 4000);
        assert_eq!(settings.greeting, "Pub Quiz");
        assert_eq!(settings.audio, AudioBackend::Bell);
        assert_eq!(settings.fps, 5);
        assert_eq!(settings.command_capacity, 100);
    }

    #[test]
    fn test_durations() {
        let settings = Settings {
            fps: 0,
            ..Settings::default()
        };
        assert_eq!(settings.frame(), Duration::from_secs(1));
        assert_eq!(Settings::default().frame(), Duration::from_millis(200));
        assert_eq!(Settings::default().finish_hold(), Duration::from_millis(1500));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load(Path::new("no-such-quizboard.json")).unwrap_err();
        assert!(err.to_string().contains("no-such-quizboard.json"));
    }
}
