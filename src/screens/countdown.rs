use std::f64::consts::{FRAC_PI_2, TAU};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Color,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Circle},
        Widget,
    },
    Frame,
};
use tracing::{debug, info, warn};

use crate::countdown::{CountdownConfig, CountdownEngine, TickKind, TickOutcome, TickState};
use crate::ledger::Ledger;
use crate::protocol::Feedback;
use crate::registry::{optional_arg, CommandError, Outcome, Registry};
use crate::screen::{screen_registry, InputEvent, ScreenBase, ScreenEnv, ScreenVariant, FOREGROUND};

use super::draw_centered;

const FINISH_CLIP: &str = "alarm-clock";

/// A countdown of big and little ticks, one per timer firing.
#[derive(Debug)]
pub struct Countdown {
    base: ScreenBase,
    timer: CountdownEngine,
    env: ScreenEnv,
    follow_ups: Vec<String>,
}

impl Countdown {
    pub fn new(env: &ScreenEnv) -> Self {
        Self {
            base: ScreenBase::new::<Self>(),
            timer: CountdownEngine::default(),
            env: env.clone(),
            follow_ups: Vec::new(),
        }
    }

    fn status(&self) -> String {
        let ticks = self.timer.ticks();
        Feedback::new("COUNTDOWN")
            .arg(ticks.current_tick)
            .arg(ticks.remaining())
            .arg(self.timer.state())
            .into()
    }

    /// An instruction addressed to this panel only.
    fn scoped(&self, verb: &str) -> String {
        format!("{} {verb}", self.env.position)
    }

    fn do_reset(&mut self, args: &[String]) -> Outcome {
        let defaults = CountdownConfig::default();
        let config = CountdownConfig::new(
            optional_arg(args, 0, "total_ticks")?.unwrap_or(defaults.total_ticks),
            optional_arg(args, 1, "big_tick_every")?.unwrap_or(defaults.big_tick_every),
            optional_arg(args, 2, "tick_interval_secs")?.unwrap_or(defaults.tick_interval_secs),
            optional_arg(args, 3, "final_stretch")?,
        )?;
        self.timer.reset(config);
        self.follow_ups.clear();
        self.base.is_dirty = true;
        info!(position = %self.env.position, ?config, "countdown reset");
        Ok(None)
    }

    fn do_start(&mut self, _: &[String]) -> Outcome {
        if !self.timer.start(Instant::now()) {
            warn!(position = %self.env.position, "countdown has no ticks left; reset it first");
        }
        Ok(Some(self.status()))
    }

    fn do_pause(&mut self, _: &[String]) -> Outcome {
        self.timer.pause();
        Ok(Some(self.status()))
    }

    fn do_stop(&mut self, _: &[String]) -> Outcome {
        self.timer.stop();
        Ok(Some(self.status()))
    }

    /// Blocks the loop for the hold time; nothing else is due once the
    /// countdown is over.
    fn do_finish(&mut self, _: &[String]) -> Outcome {
        self.env.audio.play_clip(FINISH_CLIP);
        thread::sleep(self.env.finish_hold);
        self.env.audio.stop_clip();
        Ok(Some("FINISH".to_string()))
    }

    fn do_tick(&mut self, _: &[String]) -> Outcome {
        let tone = match self.timer.tick() {
            TickOutcome::Ignored => return Ok(None),
            TickOutcome::Advanced { tone } => tone,
            TickOutcome::Finished { tone } => {
                let stop = self.scoped("stop");
                let finish = self.scoped("finish");
                self.follow_ups.extend([stop, finish]);
                tone
            }
        };
        if let Some((frequency, millis)) = tone {
            self.env.audio.play_tone(frequency, Duration::from_millis(millis));
        }
        debug!(current_tick = self.timer.current_tick(), "countdown tick");
        self.base.is_dirty = true;
        Ok(None)
    }

    fn get_countdown(&self, _: &[String]) -> Result<String, CommandError> {
        Ok(self.status())
    }

    fn get_ticks(&self, _: &[String]) -> Result<String, CommandError> {
        let ticks = self.timer.ticks();
        Ok(Feedback::new("TICKS")
            .args(ticks.schedule.iter().map(|slot| TickKind::symbol(*slot)))
            .into())
    }
}

impl ScreenVariant for Countdown {
    const NAME: &'static str = "Countdown";
    const STYLES: &'static [&'static str] = &["clock", "vbars", "countdown"];

    fn base(&self) -> &ScreenBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ScreenBase {
        &mut self.base
    }

    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<Countdown>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            screen_registry::<Self>()
                .directive(
                    "reset",
                    &["total_ticks", "big_tick_every", "tick_interval_secs", "final_stretch"],
                    Self::do_reset,
                )
                .directive("start", &[], Self::do_start)
                .directive("pause", &[], Self::do_pause)
                .directive("stop", &[], Self::do_stop)
                .directive("finish", &[], Self::do_finish)
                .directive("tick", &[], Self::do_tick)
                .query("countdown", &[], Self::get_countdown)
                .query("ticks", &[], Self::get_ticks)
        })
    }

    fn extra_state(&self) -> Vec<(&'static str, String)> {
        let ticks = self.timer.ticks();
        vec![
            ("total_ticks", ticks.config.total_ticks.to_string()),
            ("big_tick_every", ticks.config.big_tick_every.to_string()),
            ("tick_interval_secs", ticks.config.tick_interval_secs.to_string()),
            ("final_stretch", ticks.config.final_stretch.to_string()),
            ("current_tick", ticks.current_tick.to_string()),
            ("state", ticks.state.to_string()),
        ]
    }

    fn on_event(&mut self, event: &InputEvent, raised: &mut Vec<String>) -> bool {
        let verb = match event {
            InputEvent::TimerFired(position) if *position == self.env.position => "tick",
            InputEvent::Key('s') => "start",
            InputEvent::Key('p') => "pause",
            InputEvent::Key('x') => "stop",
            _ => return false,
        };
        raised.push(self.scoped(verb));
        true
    }

    fn poll_timer(&mut self, now: Instant) -> bool {
        self.timer.timer_due(now)
    }

    fn follow_ups(&mut self) -> Vec<String> {
        std::mem::take(&mut self.follow_ups)
    }

    fn draw(&self, style: &str, frame: &mut Frame, area: Rect, _ledger: &Ledger) {
        let ticks = self.timer.ticks();
        match style {
            "countdown" => draw_number(frame, area, ticks),
            "vbars" => frame.render_widget(VBars { ticks }, area),
            _ => draw_clock(frame, area, ticks),
        }
    }
}

fn tick_colour(ticks: &TickState<'_>, index: u32, kind: TickKind) -> Color {
    match (kind, ticks.config.in_final_stretch(index)) {
        (TickKind::Big, false) => Color::Blue,
        (TickKind::Little, false) => FOREGROUND,
        (TickKind::Big, true) => Color::Red,
        (TickKind::Little, true) => Color::Yellow,
    }
}

/// Unconsumed slots with their index.
fn pending<'a>(ticks: &TickState<'a>) -> impl Iterator<Item = (u32, TickKind)> + 'a {
    let schedule: &'a [Option<TickKind>] = ticks.schedule;
    schedule
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| slot.map(|kind| (index as u32, kind)))
}

fn draw_number(frame: &mut Frame, area: Rect, ticks: TickState<'_>) {
    if let Some(kind) = ticks.current() {
        let left = ticks.config.total_ticks.saturating_sub(ticks.current_tick);
        let colour = tick_colour(&ticks, ticks.current_tick, kind);
        draw_centered(frame, area, &left.to_string(), colour, kind == TickKind::Big);
    }
}

fn draw_clock(frame: &mut Frame, area: Rect, ticks: TickState<'_>) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let total = f64::from(ticks.config.total_ticks);
    // Cells are about twice as tall as wide.
    let aspect = f64::from(area.width) / (f64::from(area.height) * 2.0);
    let scale = (60.0 / total).min(3.0);
    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([-aspect, aspect])
        .y_bounds([-1.0, 1.0])
        .paint(|ctx| {
            for (index, kind) in pending(&ticks) {
                let angle = TAU / total * f64::from(index) - FRAC_PI_2;
                let radius = match kind {
                    TickKind::Big => 0.05,
                    TickKind::Little => 0.03,
                } * scale;
                ctx.draw(&Circle {
                    x: angle.cos() * 0.8,
                    y: -angle.sin() * 0.8,
                    radius,
                    color: tick_colour(&ticks, index, kind),
                });
            }
        });
    frame.render_widget(canvas, area);
}

/// One horizontal bar per pending tick, top to bottom, in a centred column.
struct VBars<'a> {
    ticks: TickState<'a>,
}

impl Widget for VBars<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 5 || area.height == 0 {
            return;
        }
        let total = u64::from(self.ticks.config.total_ticks);
        let bar_width = area.width / 5;
        let left = area.left() + (area.width - bar_width) / 2;
        for (index, kind) in pending(&self.ticks) {
            let row = (u64::from(index - 1) * u64::from(area.height) / total) as u16;
            let colour = tick_colour(&self.ticks, index, kind);
            for x in left..left + bar_width {
                if let Some(cell) = buf.cell_mut((x, area.top() + row)) {
                    cell.set_bg(colour).set_char(' ');
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{RecordingAudio, Sound};
    use crate::screen::{Position, Screen};
    use crate::screens::testing::{env, render_text};

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn countdown(audio: &RecordingAudio, args: &[&str]) -> Countdown {
        let mut countdown = Countdown::new(&env(audio));
        countdown.invoke("do_reset", &strings(args)).unwrap().unwrap();
        countdown
    }

    fn run(screen: &mut Countdown, handler: &str) -> Option<String> {
        screen.invoke(handler, &[]).unwrap().unwrap()
    }

    #[test]
    fn defaults_to_clock_and_sixty_ticks() {
        let mut screen = Countdown::new(&env(&RecordingAudio::default()));
        assert_eq!(screen.style(), "clock");
        assert_eq!(
            run(&mut screen, "get_state").unwrap(),
            "STATE Countdown style=clock styles=clock,vbars,countdown total_ticks=60 \
             big_tick_every=5 tick_interval_secs=1 final_stretch=10 current_tick=1 state=idle"
        );
    }

    #[test]
    fn reset_builds_the_schedule() {
        let mut screen = countdown(&RecordingAudio::default(), &["10", "5", "1"]);
        assert_eq!(
            run(&mut screen, "get_ticks").unwrap(),
            "TICKS - l l l l b l l l l b"
        );
        assert_eq!(run(&mut screen, "get_countdown").unwrap(), "COUNTDOWN 1 10 idle");
    }

    #[test]
    fn bad_reset_keeps_the_old_schedule() {
        let mut screen = countdown(&RecordingAudio::default(), &["4", "2", "1"]);
        for args in [&["0", "5", "1"][..], &["ten"][..], &["4000000000", "1", "1"][..], &["3601"][..]] {
            let outcome = screen.invoke("do_reset", &strings(args)).unwrap();
            assert!(outcome.is_err(), "{args:?} accepted");
        }
        assert_eq!(run(&mut screen, "get_ticks").unwrap(), "TICKS - l b l b");
    }

    #[test]
    fn start_pause_stop_report_progress() {
        let mut screen = countdown(&RecordingAudio::default(), &["5", "5", "1"]);
        assert_eq!(run(&mut screen, "do_start").unwrap(), "COUNTDOWN 1 5 running");
        run(&mut screen, "do_tick");
        assert_eq!(run(&mut screen, "do_pause").unwrap(), "COUNTDOWN 2 4 paused");
        run(&mut screen, "do_tick");
        assert_eq!(run(&mut screen, "do_start").unwrap(), "COUNTDOWN 2 4 running");
        assert_eq!(run(&mut screen, "do_stop").unwrap(), "COUNTDOWN 2 4 stopped");
        assert!(!screen.timer.timer_armed());
    }

    #[test]
    fn last_tick_queues_stop_then_finish_once() {
        let audio = RecordingAudio::default();
        let mut screen = countdown(&audio, &["3", "3", "1", "0"]);
        run(&mut screen, "do_start");
        for _ in 0..2 {
            run(&mut screen, "do_tick");
            assert!(screen.take_follow_ups().is_empty());
        }
        run(&mut screen, "do_tick");
        assert_eq!(screen.take_follow_ups(), vec!["left stop", "left finish"]);
        run(&mut screen, "do_tick");
        assert!(screen.take_follow_ups().is_empty());
        assert_eq!(
            audio.take(),
            vec![
                Sound::Tone(880, 100),
                Sound::Tone(924, 100),
                Sound::Tone(1806, 100),
            ]
        );
    }

    #[test]
    fn finish_plays_the_alarm() {
        let audio = RecordingAudio::default();
        let mut screen = Countdown::new(&env(&audio));
        assert_eq!(run(&mut screen, "do_finish").unwrap(), "FINISH");
        assert_eq!(
            audio.take(),
            vec![Sound::Clip("alarm-clock".into()), Sound::Stop]
        );
    }

    #[test]
    fn claims_own_timer_and_control_keys() {
        let mut screen = Countdown::new(&env(&RecordingAudio::default()));
        let mut raised = Vec::new();
        assert!(screen.handle_event(&InputEvent::TimerFired(Position::Left), &mut raised));
        assert!(!screen.handle_event(&InputEvent::TimerFired(Position::Right), &mut raised));
        assert!(screen.handle_event(&InputEvent::Key('s'), &mut raised));
        assert!(screen.handle_event(&InputEvent::Key('x'), &mut raised));
        assert!(!screen.handle_event(&InputEvent::Key('z'), &mut raised));
        assert_eq!(raised, vec!["left tick", "left start", "left stop"]);
    }

    #[test]
    fn number_style_shows_ticks_left() {
        let mut screen = countdown(&RecordingAudio::default(), &["10", "5", "1"]);
        screen.invoke("do_style", &strings(&["countdown"])).unwrap().unwrap();
        let text = render_text(&mut screen, &Ledger::new(), 6, 5);
        assert!(text.contains('9'));
    }

    #[test]
    fn vbars_paint_pending_ticks() {
        use ratatui::{backend::TestBackend, Terminal};

        let mut screen = countdown(&RecordingAudio::default(), &["10", "5", "1"]);
        screen.invoke("do_style", &strings(&["vbars"])).unwrap().unwrap();
        let mut terminal = Terminal::new(TestBackend::new(22, 12)).unwrap();
        let ledger = Ledger::new();
        terminal
            .draw(|frame| screen.render(frame, frame.area(), &ledger))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let count = |colour: Color| buffer.content().iter().filter(|c| c.bg == colour).count();
        // 20 inner columns give bars 4 wide; the final stretch covers them all.
        assert_eq!(count(Color::Red), 2 * 4);
        assert_eq!(count(Color::Yellow), 8 * 4);
        assert!(!screen.is_dirty());
    }

    #[test]
    fn clock_renders_without_panicking_on_tiny_areas() {
        let mut screen = countdown(&RecordingAudio::default(), &["1", "1", "1"]);
        render_text(&mut screen, &Ledger::new(), 2, 2);
        render_text(&mut screen, &Ledger::new(), 40, 20);
    }
}
