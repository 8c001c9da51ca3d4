//! Periodic statistics driver (C11) and the forwarder's per-request hook.
//!
//! Statistics aggregation itself is an external collaborator (spec.md §1);
//! this crate only owns the `update_cluster` call site and the fixed-rate
//! timer that drives it (spec.md §4.11).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Build-time statistics tick interval (spec.md §6 "Runtime environment").
pub const STATISTICS_INTERVAL: Duration = Duration::from_secs(60);

/// The hook surface statistics aggregation exposes to the proxy core. The
/// default `Counters` implementation is a placeholder counter; a real
/// deployment would swap in a sink that ships to the external aggregator.
pub trait StatisticsSink: Send + Sync {
	fn update_cluster(&self, host: &str, delta: i64);
}

/// A minimal in-process sink: total request count and tick count. Good
/// enough to exercise the call sites in tests without external wiring.
#[derive(Default)]
pub struct Counters {
	requests: AtomicU64,
	ticks: AtomicU64,
}

impl StatisticsSink for Counters {
	fn update_cluster(&self, _host: &str, delta: i64) {
		if delta == 0 {
			self.requests.fetch_add(1, Ordering::Relaxed);
		} else {
			self.ticks.fetch_add(delta as u64, Ordering::Relaxed);
		}
	}
}

impl Counters {
	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	pub fn ticks(&self) -> u64 {
		self.ticks.load(Ordering::Relaxed)
	}
}

/// Runs for process lifetime, rearming after each tick (fixed-rate
/// delivery; drift permitted, per spec.md §4.11 and §5).
pub async fn run(sink: std::sync::Arc<dyn StatisticsSink>, interval: Duration) -> ! {
	let mut ticker = tokio::time::interval(interval);
	loop {
		ticker.tick().await;
		sink.update_cluster("", 1);
	}
}
