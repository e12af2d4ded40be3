//! Audio cues. Playback is outside the core; back-ends only need to accept tones
//! and named clips, and may do nothing at all.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::trace;

pub trait Audio: Send + Sync {
    fn play_tone(&self, frequency: u32, duration: Duration);
    fn play_clip(&self, name: &str);
    fn stop_clip(&self);
}

/// A tone sequence: (frequency in Hz, duration in ms).
pub type Cue = &'static [(u32, u64)];

pub const SCORE_UP: Cue = &[(1440, 100), (2880, 200)];
pub const SCORE_DOWN: Cue = &[(440, 100), (220, 200)];

pub fn play_cue(audio: &dyn Audio, cue: Cue) {
    for &(frequency, millis) in cue {
        audio.play_tone(frequency, Duration::from_millis(millis));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    #[default]
    Silent,
    Bell,
}

impl AudioBackend {
    pub fn build(self) -> Arc<dyn Audio> {
        match self {
            AudioBackend::Silent => Arc::new(Silent),
            AudioBackend::Bell => Arc::new(TerminalBell),
        }
    }
}

#[derive(Debug, Default)]
pub struct Silent;

impl Audio for Silent {
    fn play_tone(&self, frequency: u32, duration: Duration) {
        trace!(frequency, ?duration, "audio.tone");
    }

    fn play_clip(&self, name: &str) {
        trace!(clip = name, "audio.clip");
    }

    fn stop_clip(&self) {}
}

/// Rings the terminal bell once per tone; pitch and length are lost.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl TerminalBell {
    fn ring(&self) {
        let mut out = std::io::stdout();
        if let Err(err) = out.write_all(b"\x07").and_then(|_| out.flush()) {
            trace!(%err, "audio.bell failed");
        }
    }
}

impl Audio for TerminalBell {
    fn play_tone(&self, frequency: u32, duration: Duration) {
        trace!(frequency, ?duration, "audio.tone");
        self.ring();
    }

    fn play_clip(&self, name: &str) {
        trace!(clip = name, "audio.clip");
        self.ring();
    }

    fn stop_clip(&self) {}
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sound {
        Tone(u32, u64),
        Clip(String),
        Stop,
    }

    /// Records every cue; clones share the same log.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingAudio {
        log: Arc<Mutex<Vec<Sound>>>,
    }

    impl RecordingAudio {
        pub fn take(&self) -> Vec<Sound> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }

        fn push(&self, sound: Sound) {
            self.log.lock().unwrap().push(sound);
        }
    }

    impl Audio for RecordingAudio {
        fn play_tone(&self, frequency: u32, duration: Duration) {
            self.push(Sound::Tone(frequency, duration.as_millis() as u64));
        }

        fn play_clip(&self, name: &str) {
            self.push(Sound::Clip(name.to_string()));
        }

        fn stop_clip(&self) {
            self.push(Sound::Stop);
        }
    }

    #[test]
    fn cues_play_in_order() {
        let audio = RecordingAudio::default();
        play_cue(&audio, SCORE_UP);
        play_cue(&audio, SCORE_DOWN);
        assert_eq!(
            audio.take(),
            vec![
                Sound::Tone(1440, 100),
                Sound::Tone(2880, 200),
                Sound::Tone(440, 100),
                Sound::Tone(220, 200),
            ]
        );
    }
}
