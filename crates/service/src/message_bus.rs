//! Dispatch loop for commands and the events they raise.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use common::{BatchReference, OrderId};
use domain::{Command, CommandKind, Event, EventKind, Message};

use crate::error::{BusConfigError, Result, ServiceError};
use crate::unit_of_work::UnitOfWork;

/// What a command produced for its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// The command has no result to report.
    Empty,
    /// An order line was allocated to this batch.
    Allocated(BatchReference),
    /// A line of this order was released.
    Deallocated(OrderId),
}

/// Result of a command handler.
#[derive(Debug)]
pub struct Handled {
    /// Returned to the caller of [`MessageBus::handle`].
    pub output: CommandOutput,
    /// Follow-up messages, queued behind everything already pending.
    pub messages: Vec<Message>,
}

impl Handled {
    /// Creates a result carrying the events collected from a scope.
    pub fn new(output: CommandOutput, events: Vec<Event>) -> Self {
        Self {
            output,
            messages: events.into_iter().map(Message::from).collect(),
        }
    }
}

/// Handles exactly one kind of command.
#[async_trait]
pub trait CommandHandler<U: UnitOfWork>: Send + Sync {
    /// Returns the handler name used in logs.
    fn name(&self) -> &'static str;

    /// Handles the command, committing its own scope.
    async fn handle(&self, command: Command, uow: &U) -> Result<Handled>;
}

/// Reacts to events. Any number may be registered per event kind.
#[async_trait]
pub trait EventHandler<U: UnitOfWork>: Send + Sync {
    /// Returns the handler name used in logs.
    fn name(&self) -> &'static str;

    /// Handles the event, returning follow-up messages.
    async fn handle(&self, event: &Event, uow: &U) -> Result<Vec<Message>>;
}

/// Builds a [`MessageBus`], checking every command has exactly one handler.
pub struct MessageBusBuilder<U: UnitOfWork> {
    command_handlers: Vec<(CommandKind, Arc<dyn CommandHandler<U>>)>,
    event_handlers: Vec<(EventKind, Arc<dyn EventHandler<U>>)>,
}

impl<U: UnitOfWork> Default for MessageBusBuilder<U> {
    fn default() -> Self {
        Self {
            command_handlers: Vec::new(),
            event_handlers: Vec::new(),
        }
    }
}

impl<U: UnitOfWork> MessageBusBuilder<U> {
    /// Registers the handler for a command kind.
    pub fn command(mut self, kind: CommandKind, handler: impl CommandHandler<U> + 'static) -> Self {
        self.command_handlers.push((kind, Arc::new(handler)));
        self
    }

    /// Registers a handler for an event kind.
    pub fn event(mut self, kind: EventKind, handler: impl EventHandler<U> + 'static) -> Self {
        self.event_handlers.push((kind, Arc::new(handler)));
        self
    }

    /// Registers one handler for several event kinds.
    pub fn events(mut self, kinds: &[EventKind], handler: impl EventHandler<U> + 'static) -> Self {
        let handler: Arc<dyn EventHandler<U>> = Arc::new(handler);
        for &kind in kinds {
            self.event_handlers.push((kind, Arc::clone(&handler)));
        }
        self
    }

    /// Builds the bus.
    pub fn build(self) -> std::result::Result<MessageBus<U>, BusConfigError> {
        let mut command_handlers: HashMap<CommandKind, Arc<dyn CommandHandler<U>>> = HashMap::new();
        for (kind, handler) in self.command_handlers {
            if let Some(existing) = command_handlers.get(&kind) {
                return Err(BusConfigError::DuplicateCommandHandler {
                    kind,
                    existing: existing.name(),
                    duplicate: handler.name(),
                });
            }
            command_handlers.insert(kind, handler);
        }

        if let Some(&kind) = CommandKind::ALL
            .iter()
            .find(|kind| !command_handlers.contains_key(kind))
        {
            return Err(BusConfigError::MissingCommandHandler(kind));
        }

        let mut event_handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler<U>>>> = HashMap::new();
        for (kind, handler) in self.event_handlers {
            event_handlers.entry(kind).or_default().push(handler);
        }

        Ok(MessageBus {
            command_handlers,
            event_handlers,
        })
    }
}

/// Routes messages to their handlers until no message is left.
///
/// Command failures abort the dispatch and reach the caller. Event handler
/// failures are logged and skipped.
pub struct MessageBus<U: UnitOfWork> {
    command_handlers: HashMap<CommandKind, Arc<dyn CommandHandler<U>>>,
    event_handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler<U>>>>,
}

impl<U: UnitOfWork> MessageBus<U> {
    /// Starts building a bus.
    pub fn builder() -> MessageBusBuilder<U> {
        MessageBusBuilder::default()
    }

    /// Returns the number of handlers registered for an event kind.
    pub fn event_handler_count(&self, kind: EventKind) -> usize {
        self.event_handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Handles a message and everything it leads to.
    ///
    /// Returns the outputs of every command handled, in order.
    #[tracing::instrument(skip(self, message, uow), fields(message = message.name()))]
    pub async fn handle(&self, message: Message, uow: &U) -> Result<Vec<CommandOutput>> {
        let mut queue = VecDeque::from([message]);
        let mut outputs = Vec::new();

        while let Some(message) = queue.pop_front() {
            match message {
                Message::Command(command) => {
                    let handled = self.handle_command(command, uow).await?;
                    outputs.push(handled.output);
                    queue.extend(handled.messages);
                }
                Message::Event(event) => {
                    let messages = self.handle_event(&event, uow).await;
                    queue.extend(messages);
                }
            }
        }

        Ok(outputs)
    }

    async fn handle_command(&self, command: Command, uow: &U) -> Result<Handled> {
        let kind = command.kind();
        let handler = self
            .command_handlers
            .get(&kind)
            .ok_or(ServiceError::UnhandledCommand(kind))?;

        tracing::debug!(command = %kind, handler = handler.name(), "Handling command");
        match handler.handle(command, uow).await {
            Ok(handled) => {
                metrics::counter!("bus_commands_handled_total", "command" => kind.as_str())
                    .increment(1);
                Ok(handled)
            }
            Err(err) => {
                tracing::warn!(command = %kind, error = %err, "Command failed");
                metrics::counter!("bus_command_failures_total", "command" => kind.as_str())
                    .increment(1);
                Err(err)
            }
        }
    }

    async fn handle_event(&self, event: &Event, uow: &U) -> Vec<Message> {
        let kind = event.kind();
        let Some(handlers) = self.event_handlers.get(&kind) else {
            tracing::debug!(event = %kind, "No handler for event");
            return Vec::new();
        };

        let mut messages = Vec::new();
        for handler in handlers {
            tracing::debug!(event = %kind, handler = handler.name(), "Handling event");
            match handler.handle(event, uow).await {
                Ok(follow_ups) => messages.extend(follow_ups),
                Err(err) => {
                    tracing::error!(
                        event = %kind,
                        handler = handler.name(),
                        error = %err,
                        "Event handler failed"
                    );
                    metrics::counter!(
                        "bus_event_handler_failures_total",
                        "event" => kind.as_str(),
                        "handler" => handler.name()
                    )
                    .increment(1);
                }
            }
        }
        messages
    }
}
