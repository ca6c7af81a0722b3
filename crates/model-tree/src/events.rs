//! Execution trace events emitted by the step engine.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A step sequence is about to run.
    StepsStart,
    /// A single step is about to run.
    StepStart,
    /// A `whileDo` test was evaluated (or failed to evaluate).
    WhileDoTest,
    /// A `whileDo` operation failed and the loop carries on.
    WhileDoOperation,
    /// `tryExcept` caught a failure and is handing over to its handler.
    ExceptionHandled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvent {
    pub kind: EventKind,
    /// Path of the node the event originated from.
    pub path: String,
    pub message: String,
}

impl ModelEvent {
    pub fn new(kind: EventKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        ModelEvent {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Receives trace events. Implemented for closures.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &ModelEvent);
}

impl<F> EventSink for F
where
    F: Fn(&ModelEvent) + Send + Sync,
{
    fn notify(&self, event: &ModelEvent) {
        self(event)
    }
}

/// Default sink: forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: &ModelEvent) {
        match event.kind {
            EventKind::StepsStart | EventKind::StepStart => {
                tracing::debug!(kind = ?event.kind, path = %event.path, "{}", event.message)
            }
            EventKind::WhileDoTest => {
                tracing::trace!(kind = ?event.kind, path = %event.path, "{}", event.message)
            }
            EventKind::WhileDoOperation | EventKind::ExceptionHandled => {
                tracing::warn!(kind = ?event.kind, path = %event.path, "{}", event.message)
            }
        }
    }
}
