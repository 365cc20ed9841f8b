//! Messages flowing through the message bus.

use serde::{Deserialize, Serialize};

use crate::allocation::{Command, Event};

/// Either a command (a request to change state) or an event (a fact).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message", content = "body")]
pub enum Message {
    Command(Command),
    Event(Event),
}

impl Message {
    /// Returns the name of the command or event kind.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Command(command) => command.kind().as_str(),
            Message::Event(event) => event.kind().as_str(),
        }
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Message::Event(event)
    }
}
