//! Routing of failed messages to exception sinks.

use crate::error::{Error, ErrorKind, SetupError};
use crate::sink::MessageSink;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps routable error kinds to the sink that receives the failing message.
///
/// Registration is wiring-time configuration: registering a kind the
/// pipeline never routes is rejected immediately rather than silently
/// ignored. Registering the same kind twice keeps the last sink.
#[derive(Default)]
pub struct ExceptionRouter {
    sinks: HashMap<ErrorKind, Arc<dyn MessageSink>>,
}

impl ExceptionRouter {
    pub fn new() -> Self {
        ExceptionRouter::default()
    }

    /// Register a sink for a routable error kind.
    pub fn register(
        &mut self,
        kind: ErrorKind,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), SetupError> {
        if !kind.is_routable() {
            return Err(SetupError::NotRoutable(kind));
        }
        self.sinks.insert(kind, sink);
        Ok(())
    }

    /// The sink registered for this error's kind, if any.
    pub fn route(&self, err: &Error) -> Option<&Arc<dyn MessageSink>> {
        self.sinks.get(&err.kind())
    }
}
