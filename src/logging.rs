//! Structured gateway events delivered through a host-supplied callback.
//!
//! The gateway never renders its own diagnostics; it emits typed
//! [`GatewayEvent`] records and lets the host decide where they go: a
//! diagnostic ring buffer, a web socket, stdout. Events are serde-ready so
//! hosts can ship them as JSON verbatim. When no callback is installed,
//! emitting is free apart from constructing the event.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Notable moments in the gateway lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A discovery cycle finished.
    DiscoverComplete { unit_count: usize },
    /// A status poll for one unit failed; the sweep continued.
    PollError { unit: u8, message: String },
    /// A holding write was acknowledged by the adapter.
    WriteComplete { unit: u8, address: u16 },
    /// A transport exchange ran into its deadline.
    TransportTimeout { operation: String },
}

impl fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayEvent::DiscoverComplete { unit_count } => {
                write!(f, "discover complete: {unit_count} units")
            }
            GatewayEvent::PollError { unit, message } => {
                write!(f, "poll error on unit {unit}: {message}")
            }
            GatewayEvent::WriteComplete { unit, address } => {
                write!(f, "write complete for unit {unit} at address {address}")
            }
            GatewayEvent::TransportTimeout { operation } => {
                write!(f, "transport timeout during {operation}")
            }
        }
    }
}

/// Callback type receiving every emitted event.
pub type EventCallback = Box<dyn Fn(&GatewayEvent) + Send + Sync>;

/// Event sink handed to the gateway at construction.
#[derive(Clone, Default)]
pub struct EventLogger {
    callback: Option<Arc<EventCallback>>,
}

impl EventLogger {
    /// Create a logger delivering events to `callback`.
    pub fn new(callback: EventCallback) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    /// Create a logger that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create a logger printing timestamped events to stdout.
    pub fn console() -> Self {
        Self::new(Box::new(|event| {
            let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
            println!("[{timestamp}] {event}");
        }))
    }

    /// Deliver one event to the callback, if any.
    pub fn emit(&self, event: GatewayEvent) {
        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_events_reach_the_callback() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let logger = EventLogger::new(Box::new(move |event| {
            sink.lock().unwrap().push(event.to_string());
        }));

        logger.emit(GatewayEvent::DiscoverComplete { unit_count: 3 });
        logger.emit(GatewayEvent::WriteComplete {
            unit: 7,
            address: 2021,
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], "discover complete: 3 units");
        assert!(seen[1].contains("unit 7"));
    }

    #[test]
    fn test_disabled_logger_is_silent() {
        EventLogger::disabled().emit(GatewayEvent::TransportTimeout {
            operation: "read".to_string(),
        });
    }

    #[test]
    fn test_events_serialise_as_tagged_json() {
        let event = GatewayEvent::PollError {
            unit: 5,
            message: "timeout".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"poll_error\""));
        assert!(json.contains("\"unit\":5"));
    }
}
