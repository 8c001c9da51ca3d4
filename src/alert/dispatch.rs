//! Event dispatcher (C10): one pass over the event queue, evaluated against
//! live host metrics, firing callbacks for true conditions (spec.md §4.10).

use tracing::{info, warn};

use crate::registry::{HostInfo, HostRegistry, HostStatus};

use super::eval::evaluate;
use super::queue::EventQueue;
use super::script::{Event, EventTarget};

/// One fired alert, handed to the callback surface. Actual delivery (email)
/// is an external collaborator; this crate only produces the identifier and
/// context (spec.md §4.10).
#[derive(Debug, Clone, PartialEq)]
pub struct FiredAlert {
	pub host: String,
	pub callback: String,
}

pub struct Dispatcher;

impl Dispatcher {
	/// Runs one dispatch pass. Hosts absent from the registry are skipped
	/// with a log entry; partial completion on a per-host failure is
	/// acceptable (spec.md §4.10, §5).
	pub fn dispatch_once(queue: &EventQueue, registry: &HostRegistry) -> Vec<FiredAlert> {
		let mut fired = Vec::new();
		for (host, events) in queue.snapshot() {
			let Some(info) = registry.get(&host) else {
				warn!(%host, "host not found in registry during alert dispatch, skipping");
				continue;
			};
			for event in &events {
				if Self::should_fire(&info, event) {
					info!(host = %host, callback = %event.callback, target = ?event.target, "alert fired");
					fired.push(FiredAlert { host: host.clone(), callback: event.callback.clone() });
				}
			}
		}
		fired
	}

	fn should_fire(info: &HostInfo, event: &Event) -> bool {
		match event.target {
			EventTarget::Disk => {
				if event.attr != "used" {
					return false;
				}
				Self::check(event, info.disk_used_percent)
			},
			EventTarget::Mem => {
				if event.attr != "used" {
					return false;
				}
				Self::check(event, info.vm_used_percent)
			},
			EventTarget::Cpu => Self::check(event, info.cpu_mean()),
			EventTarget::Load => {
				Self::check(event, info.load1) || Self::check(event, info.load5) || Self::check(event, info.load15)
			},
			// Status has no numeric comparison: the branch itself is the
			// trigger, for either status value (matches the original, which
			// sends a distinct notification per branch).
			EventTarget::Status => matches!(info.status, HostStatus::Active | HostStatus::Unactive),
		}
	}

	fn check(event: &Event, sample: f64) -> bool {
		match event.condition {
			Some((op, threshold)) => evaluate(op, threshold, sample),
			None => {
				warn!(callback = %event.callback, "alert event has no comparison operator, treating as false");
				false
			},
		}
	}
}
