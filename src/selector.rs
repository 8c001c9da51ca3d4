//! Backend selector (C5): chooses one endpoint from a domain's cluster
//! according to the configured selection policy (spec.md §4.5).

use rand::Rng;
use rand::rngs::SmallRng;
use std::sync::Mutex;

use crate::config::{ProxyStore, SelectionPolicy};
use crate::registry::HostRegistry;
use crate::routing::Endpoint;

/// Supplies the index the "random" policy draws against a domain's endpoint
/// list. `SmallRng` is the production source; tests substitute a fixed
/// sequence so spec.md §8 S3's determinism claim is actually exercised
/// rather than merely plausible.
trait IndexSource: Send {
	fn next_index(&self, bound: usize) -> usize;
}

impl IndexSource for Mutex<SmallRng> {
	fn next_index(&self, bound: usize) -> usize {
		self.lock().unwrap().random_range(0..bound)
	}
}

/// Wraps a seedable index source so selection is deterministic under test
/// (spec.md §8 S3 requires a seeded RNG producing a known index sequence).
pub struct Selector {
	source: Box<dyn IndexSource>,
}

impl Selector {
	pub fn new(rng: SmallRng) -> Self {
		Self { source: Box::new(Mutex::new(rng)) }
	}

	#[cfg(test)]
	fn with_source(source: impl IndexSource + 'static) -> Self {
		Self { source: Box::new(source) }
	}

	/// Uniform random pick over `domain`'s endpoint list. `None` on an empty
	/// list — must not divide by zero.
	pub fn random(&self, config: &ProxyStore, domain: &str) -> Option<Endpoint> {
		let endpoints = config.endpoints(domain);
		if endpoints.is_empty() {
			return None;
		}
		let idx = self.source.next_index(endpoints.len());
		Some(endpoints[idx].clone())
	}

	/// Walks the liveness-ordered host view front-to-back; returns the first
	/// endpoint in `domain`'s list whose host matches that host's IP or
	/// configured domain name.
	pub fn alived(&self, config: &ProxyStore, registry: &HostRegistry, domain: &str) -> Option<Endpoint> {
		let endpoints = config.endpoints(domain);
		if endpoints.is_empty() {
			return None;
		}
		for host in registry.iterate_by_liveness() {
			if let Some(ep) = endpoints.iter().find(|ep| host.matches(&ep.host)) {
				return Some(ep.clone());
			}
		}
		None
	}

	/// Selects per `policy`, falling back once to "random" when "alived"
	/// finds nothing (spec.md §4.5).
	pub fn select(&self, config: &ProxyStore, registry: &HostRegistry, domain: &str, policy: SelectionPolicy) -> Option<Endpoint> {
		match policy {
			SelectionPolicy::Random => self.random(config, domain),
			SelectionPolicy::Alived => self.alived(config, registry, domain).or_else(|| self.random(config, domain)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ProxyConfigDocument;
	use crate::registry::{HostInfo, HostStatus};
	use rand::SeedableRng;
	use std::collections::VecDeque;

	/// A deterministic stand-in for the RNG: yields the given indices in
	/// order, then panics if drawn past the end (every test using this
	/// provisions exactly as many draws as it asserts on).
	struct FixedSequence {
		remaining: Mutex<VecDeque<usize>>,
	}

	impl FixedSequence {
		fn new(indices: impl IntoIterator<Item = usize>) -> Self {
			Self { remaining: Mutex::new(indices.into_iter().collect()) }
		}
	}

	impl IndexSource for FixedSequence {
		fn next_index(&self, bound: usize) -> usize {
			let idx = self.remaining.lock().unwrap().pop_front().expect("fixed sequence exhausted");
			assert!(idx < bound, "fixed index {idx} out of bounds for length {bound}");
			idx
		}
	}

	fn store_with(dir: &tempfile::TempDir, domain: &str, clients: Vec<(&str, &str)>) -> ProxyStore {
		let path = dir.path().join("proxy.json");
		let doc = ProxyConfigDocument {
			proxy_method: None,
			http_proxy_addr: String::new(),
			https_proxy_addr: String::new(),
			http_switch: "on".to_string(),
			https_switch: "off".to_string(),
			reserve_proxy: vec![crate::config::LbNode {
				domain: domain.to_string(),
				http_switch: "on".to_string(),
				https_switch: "off".to_string(),
				clients: clients
					.into_iter()
					.map(|(h, p)| crate::config::ClientEntry { host: h.to_string(), port: p.to_string() })
					.collect(),
			}],
		};
		std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();
		ProxyStore::load(path).unwrap()
	}

	#[test]
	fn random_is_none_on_empty_list() {
		let dir = tempfile::tempdir().unwrap();
		let cfg = store_with(&dir, "b.example", vec![]);
		let sel = Selector::new(SmallRng::seed_from_u64(1));
		assert!(sel.random(&cfg, "b.example").is_none());
	}

	#[test]
	fn s3_seeded_random_sequence() {
		let dir = tempfile::tempdir().unwrap();
		let cfg = store_with(&dir, "b.example", vec![("10.0.0.1", "80"), ("10.0.0.2", "80")]);
		// Indices 0,1,0 against this 2-element list (spec.md §8 S3).
		let sel = Selector::with_source(FixedSequence::new([0, 1, 0]));
		let picks: Vec<String> = (0..3).map(|_| sel.random(&cfg, "b.example").unwrap().host).collect();
		assert_eq!(picks, vec!["10.0.0.1", "10.0.0.2", "10.0.0.1"]);
	}

	#[test]
	fn alived_returns_first_liveness_match_not_earlier_hosts() {
		let dir = tempfile::tempdir().unwrap();
		let cfg = store_with(&dir, "b.example", vec![("10.0.0.2", "80")]);
		let registry = HostRegistry::new();
		registry.upsert(
			"10.0.0.1",
			HostInfo {
				ip: "10.0.0.1".into(),
				domain: None,
				cpu_percent: vec![],
				cpu_nums: 1,
				vm_used_percent: 0.0,
				disk_used_percent: 0.0,
				load1: 0.0,
				load5: 0.0,
				load15: 0.0,
				status: HostStatus::Active,
			},
		);
		registry.upsert(
			"10.0.0.2",
			HostInfo {
				ip: "10.0.0.2".into(),
				domain: None,
				cpu_percent: vec![],
				cpu_nums: 1,
				vm_used_percent: 0.0,
				disk_used_percent: 0.0,
				load1: 0.0,
				load5: 0.0,
				load15: 0.0,
				status: HostStatus::Active,
			},
		);
		registry.set_liveness_order(vec!["10.0.0.1".into(), "10.0.0.2".into()]);
		let sel = Selector::new(SmallRng::seed_from_u64(1));
		// 10.0.0.1 is more alive but has no matching endpoint; 10.0.0.2 does.
		let picked = sel.alived(&cfg, &registry, "b.example").unwrap();
		assert_eq!(picked.host, "10.0.0.2");
	}

	#[test]
	fn alived_falls_back_to_random_when_no_match() {
		let dir = tempfile::tempdir().unwrap();
		let cfg = store_with(&dir, "b.example", vec![("10.0.0.9", "80")]);
		let registry = HostRegistry::new();
		let sel = Selector::new(SmallRng::seed_from_u64(1));
		assert!(sel.alived(&cfg, &registry, "b.example").is_none());
		let picked = sel.select(&cfg, &registry, "b.example", SelectionPolicy::Alived).unwrap();
		assert_eq!(picked.host, "10.0.0.9");
	}
}
