//! Reacts to engine messages and issues debugger commands.

use eyre::WrapErr;
use tokio::sync::mpsc;
use transport::{Break, Breakpoint, Command, DebugMessage, Login};

/// Destination for commands produced by the [`Controller`].
pub trait CommandSink {
    fn send(&mut self, command: Command) -> eyre::Result<()>;
}

impl CommandSink for Vec<Command> {
    fn send(&mut self, command: Command) -> eyre::Result<()> {
        self.push(command);
        Ok(())
    }
}

impl CommandSink for mpsc::UnboundedSender<Command> {
    fn send(&mut self, command: Command) -> eyre::Result<()> {
        mpsc::UnboundedSender::send(self, command)
            .map_err(|_| eyre::eyre!("command channel closed"))
    }
}

/// What the controller does on its own when the engine logs in or breaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Policy {
    /// Install breakpoints and step on login, resume on every break.
    #[default]
    Continue,
    /// Install breakpoints and step on login, step again on every break.
    Step,
    /// Install breakpoints on login, then wait for explicit commands.
    Hold,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub breakpoints: Vec<Breakpoint>,
    pub break_on_exceptions: bool,
    pub break_on_start: bool,
    pub policy: Policy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            breakpoints: Vec::new(),
            break_on_exceptions: true,
            break_on_start: false,
            policy: Policy::default(),
        }
    }
}

/// Client-side session logic.
///
/// Every decoded message goes through [`Controller::handle`], which runs
/// exactly one handler for it and then publishes it to subscribers.
pub struct Controller<S> {
    sink: S,
    breakpoints: Vec<Breakpoint>,
    break_on_exceptions: bool,
    break_on_start: bool,
    policy: Policy,
    subscribers: Vec<crossbeam_channel::Sender<DebugMessage>>,
}

impl<S> Controller<S>
where
    S: CommandSink,
{
    pub fn new(sink: S, config: ControllerConfig) -> Self {
        Self {
            sink,
            breakpoints: config.breakpoints,
            break_on_exceptions: config.break_on_exceptions,
            break_on_start: config.break_on_start,
            policy: config.policy,
            subscribers: Vec::new(),
        }
    }

    /// Subscribe to the messages the controller handles from now on.
    ///
    /// Each call opens a separate channel, so every subscriber sees every
    /// message. Dropping the receiver unsubscribes.
    pub fn events(&mut self) -> crossbeam_channel::Receiver<DebugMessage> {
        let (publisher, events) = crossbeam_channel::unbounded();
        self.subscribers.push(publisher);
        events
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[tracing::instrument(skip_all, fields(tag = message.tag()))]
    pub fn handle(&mut self, message: DebugMessage) -> eyre::Result<()> {
        match &message {
            DebugMessage::Login(login) => self.on_login(login)?,
            DebugMessage::Break(brk) => self.on_break(brk)?,
            DebugMessage::Samples(values) => tracing::trace!(?values, "instrument samples"),
            DebugMessage::Frames(frames) => {
                tracing::debug!(depth = frames.len(), "call stack")
            }
            DebugMessage::Local(local) => tracing::debug!(
                frame = %local.frame.name,
                properties = local.properties.len(),
                "local scope"
            ),
            DebugMessage::Global(properties) => {
                tracing::debug!(properties = properties.len(), "global scope")
            }
            DebugMessage::Module(properties) => {
                tracing::debug!(properties = properties.len(), "modules")
            }
            DebugMessage::Log(text) => tracing::info!(target: "xsbug", "{}", text.trim_end()),
            DebugMessage::Instruments(instruments) => {
                tracing::debug!(count = instruments.len(), "instruments configured")
            }
            DebugMessage::Unknown { tag } => {
                tracing::warn!(%tag, "unhandled message");
            }
        }

        self.publish(message);
        Ok(())
    }

    fn publish(&mut self, message: DebugMessage) {
        self.subscribers
            .retain(|subscriber| subscriber.send(message.clone()).is_ok());
    }

    fn on_login(&mut self, login: &Login) -> eyre::Result<()> {
        tracing::info!(name = %login.name, value = %login.value, "engine logged in");
        self.send_breakpoints().wrap_err("installing breakpoints")?;
        match self.policy {
            Policy::Continue | Policy::Step => self.step(),
            Policy::Hold => Ok(()),
        }
    }

    fn on_break(&mut self, brk: &Break) -> eyre::Result<()> {
        tracing::info!(path = %brk.path, line = brk.line, message = %brk.message, "break");
        match self.policy {
            Policy::Continue => self.go(),
            Policy::Step => self.step(),
            Policy::Hold => Ok(()),
        }
    }

    fn send(&mut self, command: Command) -> eyre::Result<()> {
        tracing::debug!(command = command.tag(), "issuing command");
        self.sink.send(command)
    }

    fn send_breakpoints(&mut self) -> eyre::Result<()> {
        let command = Command::set_all_breakpoints(
            self.breakpoints.iter().cloned(),
            self.break_on_exceptions,
            self.break_on_start,
        );
        self.send(command)
    }

    pub fn go(&mut self) -> eyre::Result<()> {
        self.send(Command::Go)
    }

    pub fn step(&mut self) -> eyre::Result<()> {
        self.send(Command::Step)
    }

    pub fn step_in(&mut self) -> eyre::Result<()> {
        self.send(Command::StepInside)
    }

    pub fn step_out(&mut self) -> eyre::Result<()> {
        self.send(Command::StepOutside)
    }

    /// Select a stack frame by the id reported in `frames`.
    pub fn select(&mut self, frame: impl Into<String>) -> eyre::Result<()> {
        self.send(Command::Select(frame.into()))
    }

    /// Expand or collapse a property by its value id.
    pub fn toggle(&mut self, property: impl Into<String>) -> eyre::Result<()> {
        self.send(Command::Toggle(property.into()))
    }

    pub fn set_breakpoint(&mut self, breakpoint: Breakpoint) -> eyre::Result<()> {
        if !self.breakpoints.contains(&breakpoint) {
            self.breakpoints.push(breakpoint.clone());
        }
        self.send(Command::SetBreakpoint(breakpoint))
    }

    pub fn clear_breakpoint(&mut self, breakpoint: Breakpoint) -> eyre::Result<()> {
        self.breakpoints.retain(|b| b != &breakpoint);
        self.send(Command::ClearBreakpoint(breakpoint))
    }

    /// Replace every breakpoint, including the exception and start triggers.
    pub fn set_all_breakpoints(
        &mut self,
        breakpoints: Vec<Breakpoint>,
        exceptions: bool,
        start: bool,
    ) -> eyre::Result<()> {
        self.breakpoints = breakpoints;
        self.break_on_exceptions = exceptions;
        self.break_on_start = start;
        self.send_breakpoints()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::Location;

    fn login() -> DebugMessage {
        DebugMessage::Login(Login {
            name: "runmod".into(),
            value: "XS".into(),
        })
    }

    fn brk() -> DebugMessage {
        DebugMessage::Break(Break {
            path: "main.js".into(),
            line: 3,
            message: "breakpoint".into(),
        })
    }

    fn controller(policy: Policy) -> Controller<Vec<Command>> {
        Controller::new(
            Vec::new(),
            ControllerConfig {
                breakpoints: vec![Breakpoint::new("main.js", 3)],
                policy,
                ..ControllerConfig::default()
            },
        )
    }

    #[test]
    fn continue_policy() {
        let mut controller = controller(Policy::Continue);
        controller.handle(login()).unwrap();
        controller.handle(brk()).unwrap();

        assert_eq!(
            controller.sink(),
            &[
                Command::SetAllBreakpoints(vec![
                    Breakpoint::exceptions(),
                    Breakpoint::new("main.js", 3)
                ]),
                Command::Step,
                Command::Go,
            ]
        );
    }

    #[test]
    fn step_policy() {
        let mut controller = controller(Policy::Step);
        controller.handle(login()).unwrap();
        controller.handle(brk()).unwrap();
        assert_eq!(controller.sink()[1..], [Command::Step, Command::Step]);
    }

    #[test]
    fn hold_policy() {
        let mut controller = controller(Policy::Hold);
        controller.handle(login()).unwrap();
        controller.handle(brk()).unwrap();
        assert_eq!(controller.sink().len(), 1);
        assert!(matches!(controller.sink()[0], Command::SetAllBreakpoints(_)));
    }

    #[test]
    fn passive_messages_issue_no_commands() {
        let mut controller = controller(Policy::Continue);
        for message in [
            DebugMessage::Samples(vec![1, 2]),
            DebugMessage::Log("hello\n".into()),
            DebugMessage::Frames(vec![transport::Frame {
                name: "f".into(),
                value: "@1".into(),
                location: Some(Location {
                    path: "main.js".into(),
                    line: 1,
                }),
            }]),
            DebugMessage::Global(vec![]),
            DebugMessage::Module(vec![]),
            DebugMessage::Instruments(vec![]),
            DebugMessage::Unknown { tag: "x".into() },
        ] {
            controller.handle(message).unwrap();
        }
        assert!(controller.sink().is_empty());
    }

    #[test]
    fn every_message_is_published_once() {
        let mut controller = controller(Policy::Hold);
        let events = controller.events();
        controller.handle(login()).unwrap();
        controller
            .handle(DebugMessage::Unknown { tag: "x".into() })
            .unwrap();

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], login());
        assert_eq!(received[1].tag(), "x");
    }

    #[test]
    fn each_subscriber_sees_every_message() {
        let mut controller = controller(Policy::Hold);
        let first = controller.events();
        let second = controller.events();
        let dropped = controller.events();
        drop(dropped);

        controller.handle(login()).unwrap();
        controller.handle(DebugMessage::Log("hi".into())).unwrap();

        assert_eq!(first.try_iter().count(), 2);
        assert_eq!(second.try_iter().count(), 2);
        assert_eq!(controller.subscribers.len(), 2);
    }

    #[test]
    fn explicit_breakpoint_edits_update_last_known_set() {
        let mut controller = controller(Policy::Hold);
        controller
            .set_breakpoint(Breakpoint::new("lib.js", 9))
            .unwrap();
        controller
            .set_breakpoint(Breakpoint::new("lib.js", 9))
            .unwrap();
        controller
            .clear_breakpoint(Breakpoint::new("main.js", 3))
            .unwrap();
        assert_eq!(controller.breakpoints(), [Breakpoint::new("lib.js", 9)]);

        controller
            .set_all_breakpoints(vec![Breakpoint::new("a.js", 5)], true, true)
            .unwrap();
        assert_eq!(
            controller.sink().last(),
            Some(&Command::SetAllBreakpoints(vec![
                Breakpoint::start(),
                Breakpoint::exceptions(),
                Breakpoint::new("a.js", 5),
            ]))
        );
    }

    #[test]
    fn navigation_commands() {
        let mut controller = controller(Policy::Hold);
        controller.step_in().unwrap();
        controller.step_out().unwrap();
        controller.select("@2").unwrap();
        controller.toggle("@3").unwrap();
        controller.go().unwrap();
        assert_eq!(
            controller.sink(),
            &[
                Command::StepInside,
                Command::StepOutside,
                Command::Select("@2".into()),
                Command::Toggle("@3".into()),
                Command::Go,
            ]
        );
    }

    #[tokio::test]
    async fn channel_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = Controller::new(tx, ControllerConfig::default());
        controller.go().unwrap();
        assert_eq!(rx.recv().await, Some(Command::Go));
    }
}
