//! # Event Bus System
//!
//! Provides an event-driven architecture for the platform client core using
//! `tokio::sync::broadcast`. Session state changes are announced here so the
//! host UI can react (transient notifications, navigation on hard logout)
//! without the core knowing anything about rendering.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, SessionEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! let event = CoreEvent::Session(SessionEvent::SignedIn {
//!     user_id: "b3f9c1d2-0000-0000-0000-000000000000".to_string(),
//!     role: "DOCTOR".to_string(),
//! });
//! event_bus.emit(event).ok();
//! ```
//!
//! ## Error Handling
//!
//! The bus wraps `tokio::sync::broadcast`, which produces two receive errors:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber was too slow and missed `n`
//!   events. Non-fatal; the subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: all senders have been dropped; shutdown signal.
//!
//! ## Thread Safety
//!
//! The event bus is fully thread-safe (`Send + Sync`) and cheap to clone; it
//! can be shared across async tasks directly or behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
///
/// This is the main event type published and received through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle events (sign-in, sign-out, expiry)
    Session(SessionEvent),
    /// Profile events (identity snapshot changes)
    Profile(ProfileEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Profile(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Session(SessionEvent::SessionExpired { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Session(SessionEvent::SignedOut { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Session Events
// ============================================================================

/// Events related to the authentication session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// User successfully signed in.
    SignedIn {
        /// The signed-in user's ID.
        user_id: String,
        /// The session role (wire form, e.g. "PATIENT").
        role: String,
    },
    /// User signed out.
    SignedOut {
        /// The user ID that was signed out, if one was known.
        user_id: Option<String>,
    },
    /// A new access token was obtained through silent refresh.
    TokenRefreshed,
    /// The session could not be recovered; the host must navigate to the
    /// unauthenticated entry point and discard in-memory state.
    SessionExpired {
        /// Human-readable reason.
        message: String,
    },
    /// Authentication error occurred.
    AuthError {
        /// Human-readable error message.
        message: String,
        /// Whether the error is recoverable (e.g., retry possible).
        recoverable: bool,
    },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::SignedIn { .. } => "User signed in successfully",
            SessionEvent::SignedOut { .. } => "User signed out",
            SessionEvent::TokenRefreshed => "Access token refreshed",
            SessionEvent::SessionExpired { .. } => "Session expired",
            SessionEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Profile Events
// ============================================================================

/// Events related to the current identity snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ProfileEvent {
    /// The identity snapshot was replaced (profile edit or re-fetch).
    Updated {
        /// The user whose profile changed.
        user_id: String,
        /// The session role (unchanged by updates).
        role: String,
    },
}

impl ProfileEvent {
    fn description(&self) -> &str {
        match self {
            ProfileEvent::Updated { .. } => "Identity snapshot updated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
///
/// Multiple subscribers can listen independently; each receives every event
/// emitted after it subscribed. Slow subscribers get `RecvError::Lagged`
/// without blocking fast ones.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, CoreEvent, SessionEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
/// let mut subscriber = event_bus.subscribe();
///
/// event_bus
///     .emit(CoreEvent::Session(SessionEvent::TokenRefreshed))
///     .ok();
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future
    /// events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let stream = EventStream::new(event_bus.subscribe());
///
/// // Session events only
/// let mut session_stream = stream.filter(|event| {
///     matches!(event, CoreEvent::Session(_))
/// });
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events. Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}
