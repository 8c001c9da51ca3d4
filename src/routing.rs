//! Domain routing table (C2): domain -> ordered backend endpoint list.
//!
//! Stored in a plain in-memory map behind a reader-writer lock (spec.md §4.2
//! names a pluggable "memory" backend; it is the only variant in this core).
//! Endpoint insertion order is preserved since the random policy indexes by
//! numeric offset and tests rely on deterministic ordering.

use std::collections::HashMap;

/// One upstream server for one domain. A value type: equality is field-wise.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Endpoint {
	pub host: String,
	pub port: u16,
}

impl Endpoint {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self { host: host.into(), port }
	}
}

/// In-memory domain -> endpoint list mapping; the hot path for request
/// dispatch. Kept in lockstep with the persisted cluster-node list by
/// `ProxyStore` (spec.md §4.3).
#[derive(Default)]
pub struct RoutingTable {
	domains: HashMap<String, Vec<Endpoint>>,
}

impl RoutingTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn has(&self, domain: &str) -> bool {
		self.domains.contains_key(domain)
	}

	pub fn get(&self, domain: &str) -> Option<&[Endpoint]> {
		self.domains.get(domain).map(|v| v.as_slice())
	}

	/// Atomic per-key replace: a concurrent reader (under the caller's lock)
	/// either sees the whole pre-image or the whole post-image, never a
	/// partial list.
	pub fn set(&mut self, domain: impl Into<String>, endpoints: Vec<Endpoint>) {
		self.domains.insert(domain.into(), endpoints);
	}

	pub fn delete(&mut self, domain: &str) {
		self.domains.remove(domain);
	}

	pub fn domains(&self) -> Vec<&str> {
		self.domains.keys().map(|s| s.as_str()).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_preserves_insertion_order() {
		let mut rt = RoutingTable::new();
		rt.set(
			"b.example",
			vec![Endpoint::new("10.0.0.1", 80), Endpoint::new("10.0.0.2", 80)],
		);
		let eps = rt.get("b.example").unwrap();
		assert_eq!(eps[0].host, "10.0.0.1");
		assert_eq!(eps[1].host, "10.0.0.2");
	}

	#[test]
	fn delete_removes_entry() {
		let mut rt = RoutingTable::new();
		rt.set("a.example", vec![]);
		assert!(rt.has("a.example"));
		rt.delete("a.example");
		assert!(!rt.has("a.example"));
	}

	#[test]
	fn get_missing_domain_is_none() {
		let rt = RoutingTable::new();
		assert!(rt.get("nope.example").is_none());
	}
}
