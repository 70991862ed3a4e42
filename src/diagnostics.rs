//! Diagnostic channel from `tracing` to the notification stream.
//!
//! [`ErrorForwardLayer`] turns every ERROR event into an error-passthrough
//! command for the registry, which re-emits it as an `error` notification.
//! The layer is installed with the subscriber at startup, before the
//! registry exists, so it forwards through an [`ErrorSink`] that is attached
//! later. Events logged while detached only go to the other layers.

use crate::registry::{RegistryCommand, RegistryQueue};
use parking_lot::RwLock;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Shared, attachable target of forwarded errors.
#[derive(Clone, Default)]
pub struct ErrorSink {
    queue: Arc<RwLock<Option<RegistryQueue>>>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached(queue: RegistryQueue) -> Self {
        let sink = Self::new();
        sink.attach(queue);
        sink
    }

    pub fn attach(&self, queue: RegistryQueue) {
        *self.queue.write() = Some(queue);
    }

    pub fn detach(&self) {
        *self.queue.write() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.queue.read().is_some()
    }

    /// Queues `message` for the registry; dropped while detached.
    pub fn forward(&self, message: String) {
        if let Some(queue) = self.queue.read().as_ref() {
            queue.push(RegistryCommand::Error(message));
        }
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// `tracing` layer forwarding ERROR events to an [`ErrorSink`].
pub struct ErrorForwardLayer {
    sink: ErrorSink,
}

impl ErrorForwardLayer {
    pub fn new(sink: ErrorSink) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for ErrorForwardLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.sink.forward(visitor.message);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.insert_str(0, value);
        } else {
            let _ = write!(self.message, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message.insert_str(0, &format!("{:?}", value));
        } else {
            let _ = write!(self.message, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::router::create_queue;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_only_errors_are_forwarded() {
        let queue: RegistryQueue = create_queue(8);
        let sink = ErrorSink::new();
        let subscriber = tracing_subscriber::registry().with(ErrorForwardLayer::new(sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("lost before attach");
            sink.attach(queue.clone());
            tracing::warn!("not forwarded");
            tracing::error!(path = "/tmp/x", "Position export failed");
        });

        let forwarded: Vec<_> = queue.drain();
        assert_eq!(
            forwarded,
            vec![RegistryCommand::Error("Position export failed path=/tmp/x".to_string())]
        );
    }
}
