use crate::engine::{LeaveReason, SessionCommand, SessionEvent, SessionSnapshot};
use crate::error::SessionError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Sends commands to a running session. Cheap to clone.
#[derive(Clone)]
pub struct SessionControl {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionControl {
    pub(crate) fn new(commands: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { commands }
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }

    pub fn toggle_video(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ToggleVideo)
    }

    pub fn toggle_audio(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ToggleAudio)
    }

    pub fn send_chat(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::SendChat(text.into()))
    }

    pub fn leave(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Leave)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(tx))?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

/// The application's end of a session.
pub struct SessionHandle {
    control: SessionControl,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    task: JoinHandle<LeaveReason>,
}

impl SessionHandle {
    pub(crate) fn new(
        control: SessionControl,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        task: JoinHandle<LeaveReason>,
    ) -> Self {
        Self {
            control,
            events,
            task,
        }
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Next event from the session; `None` once it has left and every
    /// event was consumed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Waits for the session to leave the room, either on request or
    /// because the server went away.
    pub async fn wait(self) -> Result<LeaveReason, SessionError> {
        let Self {
            control: _control,
            task,
            ..
        } = self;
        Ok(task.await?)
    }
}
