//! Event queue (C8): host -> ordered list of events awaiting dispatch
//! (spec.md §4.8). Write-once from the loader in this core; read by the
//! dispatcher.

use std::collections::HashMap;
use std::sync::RwLock;

use super::script::Event;

#[derive(Default)]
pub struct EventQueue {
	events: RwLock<HashMap<String, Vec<Event>>>,
}

impl EventQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces any prior event list for `host`.
	pub fn push(&self, host: impl Into<String>, events: Vec<Event>) {
		self.events.write().unwrap().insert(host.into(), events);
	}

	/// A snapshot of the current queue contents, cloned out from under the
	/// lock so the dispatcher can iterate without holding it.
	pub fn snapshot(&self) -> Vec<(String, Vec<Event>)> {
		self.events.read().unwrap().iter().map(|(h, e)| (h.clone(), e.clone())).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::alert::script::EventTarget;

	fn event(host: &str) -> Event {
		Event { host: host.to_string(), target: EventTarget::Status, attr: String::new(), condition: None, callback: "alert".to_string() }
	}

	#[test]
	fn push_replaces_prior_list() {
		let q = EventQueue::new();
		q.push("H", vec![event("H")]);
		assert_eq!(q.snapshot().len(), 1);
		q.push("H", vec![event("H"), event("H")]);
		let snap = q.snapshot();
		assert_eq!(snap.len(), 1);
		assert_eq!(snap[0].1.len(), 2);
	}
}
