//! The render/dispatch core: owns the team ledger and both panels, drains the
//! Command Channel once per frame and publishes feedback.
//!
//! Commands are offered to the engine first and then to the left and right
//! panels; the first registry holding the derived handler name runs it and no
//! other. `left ...` and `right ...` re-dispatch their arguments to one panel
//! only.

use std::cmp::Ordering;
use std::collections::{BTreeSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};
use tracing::{debug, error, info, trace, warn};

use crate::audio::{play_cue, Audio, SCORE_DOWN, SCORE_UP};
use crate::channel::{command_channel, CommandReceiver, CommandSender, FeedbackSender};
use crate::config::Settings;
use crate::ledger::{Ledger, Rgb, ScoreChange};
use crate::protocol::{self, Command, Feedback, ParseError};
use crate::registry::{arg, parse_arg, CommandError, Outcome, Registry};
use crate::screen::{InputEvent, Position, Screen, ScreenEnv};
use crate::screens::ScreenKind;

/// Naming a team further out than this is refused.
pub const MAX_TEAMS: usize = 100;

/// Where a command may be handled, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Engine,
    Panel(Position),
}

const TARGETS: [Target; 3] = [
    Target::Engine,
    Target::Panel(Position::Left),
    Target::Panel(Position::Right),
];

struct Panels {
    left: Box<dyn Screen>,
    right: Box<dyn Screen>,
}

impl Panels {
    fn get(&self, position: Position) -> &dyn Screen {
        match position {
            Position::Left => self.left.as_ref(),
            Position::Right => self.right.as_ref(),
        }
    }

    fn get_mut(&mut self, position: Position) -> &mut Box<dyn Screen> {
        match position {
            Position::Left => &mut self.left,
            Position::Right => &mut self.right,
        }
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (Position, &mut Box<dyn Screen>)> {
        [(Position::Left, &mut self.left), (Position::Right, &mut self.right)].into_iter()
    }
}

pub struct Engine {
    ledger: Ledger,
    panels: Panels,
    instructions: CommandReceiver,
    sender: CommandSender,
    feedback: FeedbackSender,
    audio: Arc<dyn Audio>,
    settings: Settings,
    pending_events: Vec<InputEvent>,
    raised: VecDeque<String>,
    should_quit: bool,
    repaint: bool,
}

impl Engine {
    pub fn new(settings: Settings, audio: Arc<dyn Audio>, feedback: FeedbackSender) -> Self {
        let (sender, instructions) = command_channel(settings.command_capacity);
        let left = ScreenKind::Splash.build(&screen_env(&settings, &audio, Position::Left));
        let right = ScreenKind::Scores.build(&screen_env(&settings, &audio, Position::Right));
        Self {
            ledger: Ledger::new(),
            panels: Panels { left, right },
            instructions,
            sender,
            feedback,
            audio,
            settings,
            pending_events: Vec::new(),
            raised: VecDeque::new(),
            should_quit: false,
            repaint: true,
        }
    }

    /// A producer handle for the transport.
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[cfg(test)]
    pub fn panel(&self, position: Position) -> &dyn Screen {
        self.panels.get(position)
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Parses and runs one raw instruction line.
    pub fn execute(&mut self, line: &str) -> Outcome {
        let command = Command::parse(line)?;
        match self.dispatch(&command) {
            Some(outcome) => outcome,
            None => {
                debug!(%command, "no handler for command");
                Ok(None)
            }
        }
    }

    /// The first target, in priority order, exposing `handler`.
    fn resolve(&self, handler: &str) -> Option<Target> {
        TARGETS.into_iter().find(|target| match target {
            Target::Engine => registry().contains(handler),
            Target::Panel(position) => self.panels.get(*position).exposes(handler),
        })
    }

    fn dispatch(&mut self, command: &Command) -> Option<Outcome> {
        let handler = command.handler_name();
        match self.resolve(&handler)? {
            Target::Engine => registry().invoke(self, &handler, &command.args),
            Target::Panel(position) => self.invoke_panel(position, &handler, &command.args),
        }
    }

    /// Routes the remaining words of a `left`/`right` command to that panel
    /// alone; nothing falls back to the engine or the other panel.
    fn dispatch_to_panel(&mut self, position: Position, args: &[String]) -> Outcome {
        let command = Command::from_tokens(args.iter().cloned())?;
        let handler = command.handler_name();
        match self.invoke_panel(position, &handler, &command.args) {
            Some(outcome) => outcome,
            None => {
                debug!(
                    %position,
                    screen = self.panels.get(position).name(),
                    %command,
                    "panel has no handler for command"
                );
                Ok(None)
            }
        }
    }

    /// Panel feedback is prefixed with the panel's position.
    fn invoke_panel(&mut self, position: Position, handler: &str, args: &[String]) -> Option<Outcome> {
        let outcome = self.panels.get_mut(position).invoke(handler, args)?;
        Some(outcome.map(|feedback| feedback.map(|feedback| format!("{position} {feedback}"))))
    }

    /// Runs everything queued on the Command Channel, in order, then the
    /// instructions raised by events. Instructions a screen asks to run next go
    /// ahead of the rest. A `quit` ends the drain.
    pub fn check_instructions(&mut self) {
        let mut queue: VecDeque<String> = self.instructions.drain().into();
        queue.append(&mut self.raised);
        while let Some(line) = queue.pop_front() {
            debug!(instruction = %line, "engine.instruction");
            match contained(|| self.execute(&line)) {
                Ok(Ok(Some(feedback))) => self.feedback.publish(feedback),
                Ok(Ok(None)) | Ok(Err(CommandError::Parse(ParseError::Empty))) => {}
                Ok(Err(err)) => warn!(instruction = %line, %err, "instruction rejected"),
                Err(message) => error!(instruction = %line, panic = %message, "instruction handler panicked"),
            }
            for (_, panel) in self.panels.iter_mut() {
                for follow_up in panel.take_follow_ups().into_iter().rev() {
                    queue.push_front(follow_up);
                }
            }
            if self.should_quit {
                if !queue.is_empty() {
                    debug!(dropped = queue.len(), "quitting with instructions still queued");
                }
                break;
            }
        }
    }

    /// Queues a timer event for every panel whose timer is due.
    pub fn timer_events(&mut self, now: Instant) {
        for (position, panel) in self.panels.iter_mut() {
            if panel.timer_due(now) {
                self.pending_events.push(InputEvent::TimerFired(position));
            }
        }
    }

    /// Offers each event to the engine, then the left and right panels, stopping
    /// at the first that claims it. Instructions they raise run after whatever
    /// the Command Channel holds at the next drain.
    pub fn handle_events(&mut self, events: impl IntoIterator<Item = InputEvent>) {
        let mut queue = std::mem::take(&mut self.pending_events);
        queue.extend(events);
        for event in queue {
            let mut raised = Vec::new();
            let mut claimed = self.on_event(&event, &mut raised);
            if !claimed {
                for (_, panel) in self.panels.iter_mut() {
                    if panel.handle_event(&event, &mut raised) {
                        claimed = true;
                        break;
                    }
                }
            }
            if !claimed {
                trace!(?event, "event unclaimed");
            }
            self.raised.extend(raised);
        }
    }

    fn on_event(&mut self, event: &InputEvent, raised: &mut Vec<String>) -> bool {
        match event {
            InputEvent::Quit | InputEvent::Key('q') => {
                raised.push("quit".to_string());
                true
            }
            InputEvent::Resize(width, height) => {
                debug!(width, height, "terminal resized");
                self.repaint();
                true
            }
            InputEvent::ScoresChanged => {
                for (_, panel) in self.panels.iter_mut() {
                    panel.mark_dirty();
                }
                true
            }
            _ => false,
        }
    }

    fn repaint(&mut self) {
        self.repaint = true;
        for (_, panel) in self.panels.iter_mut() {
            panel.mark_dirty();
        }
    }

    pub fn needs_redraw(&self) -> bool {
        self.repaint || Position::ALL.iter().any(|p| self.panels.get(*p).is_dirty())
    }

    /// Left panel 66%, right 34%. Both are drawn on every frame since the
    /// terminal backend diffs whole frames.
    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
            .split(frame.area());
        self.panels.left.render(frame, chunks[0], &self.ledger);
        self.panels.right.render(frame, chunks[1], &self.ledger);
        self.repaint = false;
    }

    fn help(&self, args: &[String]) -> Result<String, CommandError> {
        let Some(command) = args.first() else {
            let mut commands: BTreeSet<String> = registry().commands().collect();
            for position in Position::ALL {
                commands.extend(self.panels.get(position).commands());
            }
            return Ok(Feedback::new("HELP").args(commands).into());
        };
        let handler = protocol::handler_name(command);
        let params = registry().params(&handler).or_else(|| {
            Position::ALL
                .iter()
                .find_map(|position| self.panels.get(*position).params(&handler))
        });
        match params {
            Some(params) => Ok(Feedback::new("HELP")
                .arg(command.to_uppercase())
                .args(params.iter())
                .into()),
            None => Err(CommandError::UnknownCommand(command.clone())),
        }
    }

    fn do_name(&mut self, args: &[String]) -> Outcome {
        let index: usize = parse_arg(args, 0, "index")?;
        if index >= MAX_TEAMS {
            return Err(CommandError::InvalidArgument {
                name: "index",
                value: index.to_string(),
                reason: format!("at most {MAX_TEAMS} teams"),
            });
        }
        let name = args.get(1..).unwrap_or_default().join(" ");
        if name.is_empty() {
            return Err(CommandError::MissingArgument("name"));
        }
        self.ledger.rename(index, &name);
        info!(index, %name, "team named");
        Ok(None)
    }

    fn do_remove(&mut self, args: &[String]) -> Outcome {
        let index: usize = parse_arg(args, 0, "index")?;
        let team = self.ledger.remove(index)?;
        info!(index, name = %team.name, "team removed");
        self.pending_events.push(InputEvent::ScoresChanged);
        Ok(None)
    }

    fn do_score(&mut self, args: &[String]) -> Outcome {
        let index = self.ledger.resolve(arg(args, 0, "team")?)?;
        let change: ScoreChange = arg(args, 1, "value")?.parse()?;
        let update = self.ledger.apply_score(index, change)?;
        match update.after.cmp(&update.before) {
            Ordering::Greater => play_cue(self.audio.as_ref(), SCORE_UP),
            Ordering::Less => play_cue(self.audio.as_ref(), SCORE_DOWN),
            Ordering::Equal => {}
        }
        debug!(index, before = update.before, after = update.after, "score changed");
        self.pending_events.push(InputEvent::ScoresChanged);
        Ok(None)
    }

    fn do_colour(&mut self, args: &[String]) -> Outcome {
        let index = self.ledger.resolve(arg(args, 0, "team")?)?;
        let colour: Rgb = arg(args, 1, "colour")?.parse()?;
        self.ledger.set_colour(index, colour)?;
        info!(index, %colour, "team colour set");
        self.pending_events.push(InputEvent::ScoresChanged);
        Ok(None)
    }

    /// Replaces a panel's screen unless it already shows that variant.
    fn do_switch(&mut self, args: &[String]) -> Outcome {
        let position: Position = parse_arg(args, 0, "position")?;
        let kind: ScreenKind = arg(args, 1, "screen")?.parse()?;
        if self.panels.get(position).name() == kind.name() {
            debug!(%position, screen = kind.name(), "panel already shows screen");
            return Ok(None);
        }
        let env = screen_env(&self.settings, &self.audio, position);
        *self.panels.get_mut(position) = kind.build(&env);
        self.repaint();
        info!(%position, screen = kind.name(), "panel switched");
        Ok(Some(
            Feedback::new("SWITCH").arg(position).arg(kind.name()).into(),
        ))
    }

    /// Publishes `QUIT` straight away and gives the transport a moment to send
    /// it before the loop exits.
    fn do_quit(&mut self, _: &[String]) -> Outcome {
        self.feedback.publish("QUIT");
        thread::sleep(self.settings.quit_flush());
        self.should_quit = true;
        info!("quit requested");
        Ok(None)
    }

    fn do_left(&mut self, args: &[String]) -> Outcome {
        self.dispatch_to_panel(Position::Left, args)
    }

    fn do_right(&mut self, args: &[String]) -> Outcome {
        self.dispatch_to_panel(Position::Right, args)
    }

    #[cfg(test)]
    fn do_panic(&mut self, _: &[String]) -> Outcome {
        panic!("handler blew up")
    }

    fn do_help(&mut self, args: &[String]) -> Outcome {
        self.help(args).map(Some)
    }

    fn get_help(&self, args: &[String]) -> Result<String, CommandError> {
        self.help(args)
    }

    fn get_teams(&self, _: &[String]) -> Result<String, CommandError> {
        Ok(Feedback::new("TEAMS").quoted(self.ledger.names()).into())
    }

    fn get_scores(&self, _: &[String]) -> Result<String, CommandError> {
        Ok(Feedback::new("SCORES").args(self.ledger.scores()).into())
    }

    fn get_colours(&self, _: &[String]) -> Result<String, CommandError> {
        Ok(Feedback::new("COLOURS").args(self.ledger.hex_colours()).into())
    }

    fn get_positions(&self, _: &[String]) -> Result<String, CommandError> {
        Ok(Feedback::new("POSITIONS").args(Position::ALL).into())
    }

    fn get_position(&self, args: &[String]) -> Result<String, CommandError> {
        let position: Position = parse_arg(args, 0, "position")?;
        Ok(Feedback::new("POSITION")
            .arg(position)
            .arg(self.panels.get(position).name())
            .into())
    }

    fn get_state(&self, _: &[String]) -> Result<String, CommandError> {
        Ok(Feedback::new("STATE")
            .field("left", self.panels.left.name())
            .field("right", self.panels.right.name())
            .field("teams", self.ledger.len())
            .into())
    }
}

fn registry() -> &'static Registry<Engine> {
    static REGISTRY: OnceLock<Registry<Engine>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = Registry::new()
            .directive("name", &["index", "name"], Engine::do_name)
            .directive("remove", &["index"], Engine::do_remove)
            .directive("score", &["team", "value"], Engine::do_score)
            .directive("colour", &["team", "colour"], Engine::do_colour)
            .directive("switch", &["position", "screen"], Engine::do_switch)
            .directive("quit", &[], Engine::do_quit)
            .directive("left", &["command", "args"], Engine::do_left)
            .directive("right", &["command", "args"], Engine::do_right)
            .directive("help", &["command"], Engine::do_help)
            .query("help", &["command"], Engine::get_help)
            .query("teams", &[], Engine::get_teams)
            .query("scores", &[], Engine::get_scores)
            .query("colours", &[], Engine::get_colours)
            .query("positions", &[], Engine::get_positions)
            .query("position", &["position"], Engine::get_position)
            .query("state", &[], Engine::get_state);
        #[cfg(test)]
        let registry = registry.directive("panic", &[], Engine::do_panic);
        registry
    })
}

fn screen_env(settings: &Settings, audio: &Arc<dyn Audio>, position: Position) -> ScreenEnv {
    ScreenEnv {
        position,
        audio: Arc::clone(audio),
        finish_hold: settings.finish_hold(),
        greeting: settings.greeting.clone(),
    }
}

/// Runs `f`, turning a panic into its message so one bad command cannot take
/// the loop down.
fn contained<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}
