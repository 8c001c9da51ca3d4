//! The declarative alert engine (C7-C10): loads a JSON alert script into
//! typed events, queues them per host, and dispatches them against live
//! host metrics on each evaluation tick (spec.md §4.7-§4.10).

pub mod dispatch;
pub mod eval;
pub mod queue;
pub mod script;

pub use dispatch::{Dispatcher, FiredAlert};
pub use eval::Operator;
pub use queue::EventQueue;
pub use script::{AlertScript, EmailConfig, Event, EventTarget};

/// Build-time interval between dispatcher ticks (spec.md §6).
pub const ALERT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);
