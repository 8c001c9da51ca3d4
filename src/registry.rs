//! Host registry (C1): host identifier -> live metrics snapshot, plus a
//! liveness-ordered view used by the "alived" selection policy.
//!
//! The precise liveness ordering criterion lives outside this crate (the
//! telemetry collector ranks hosts by weight); this registry only stores
//! whatever order it is given and serves it back front-to-back.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum HostStatus {
	Active,
	Unactive,
}

/// One host's current resource snapshot.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HostInfo {
	pub ip: String,
	pub domain: Option<String>,
	pub cpu_percent: Vec<f64>,
	pub cpu_nums: u32,
	pub vm_used_percent: f64,
	pub disk_used_percent: f64,
	pub load1: f64,
	pub load5: f64,
	pub load15: f64,
	pub status: HostStatus,
}

impl HostInfo {
	/// Mean CPU utilization across cores, matching the original's
	/// `sum(CpuPercent) / CpuNums` (C10 "cpu" target).
	pub fn cpu_mean(&self) -> f64 {
		if self.cpu_nums == 0 {
			return 0.0;
		}
		self.cpu_percent.iter().sum::<f64>() / self.cpu_nums as f64
	}

	/// True if `candidate` matches either this host's IP or configured domain,
	/// used by the "alived" selector to match a liveness-ordered host against
	/// a cluster's configured endpoints (spec.md §4.5).
	pub fn matches(&self, candidate: &str) -> bool {
		self.ip == candidate || self.domain.as_deref() == Some(candidate)
	}
}

#[derive(Default)]
struct Inner {
	hosts: HashMap<String, HostInfo>,
	/// Most-alive-first ordering of host keys. Rebuilt wholesale by
	/// `set_liveness_order`; entries not present in `hosts` are ignored by
	/// readers but not eagerly pruned (cheap to tolerate staleness per
	/// spec.md §5: "tolerate a sample that is one tick stale").
	liveness_order: Vec<String>,
}

/// The shared, reader-mostly host registry (spec.md §4.1).
#[derive(Default)]
pub struct HostRegistry {
	inner: RwLock<Inner>,
}

impl HostRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace the snapshot for `host`. Newly seen hosts are
	/// appended to the liveness order's tail until reordered.
	pub fn upsert(&self, host: impl Into<String>, info: HostInfo) {
		let host = host.into();
		let mut inner = self.inner.write().unwrap();
		if !inner.hosts.contains_key(&host) {
			inner.liveness_order.push(host.clone());
		}
		inner.hosts.insert(host, info);
	}

	pub fn get(&self, host: &str) -> Option<HostInfo> {
		self.inner.read().unwrap().hosts.get(host).cloned()
	}

	/// Replace the liveness ordering wholesale. Called by the (external)
	/// telemetry side whenever it recomputes host weights.
	pub fn set_liveness_order(&self, order: Vec<String>) {
		self.inner.write().unwrap().liveness_order = order;
	}

	/// Iterate known hosts most-alive first, skipping any key whose snapshot
	/// has since been removed.
	pub fn iterate_by_liveness(&self) -> Vec<HostInfo> {
		let inner = self.inner.read().unwrap();
		inner
			.liveness_order
			.iter()
			.filter_map(|key| inner.hosts.get(key).cloned())
			.collect()
	}
}
