//! Proxy configuration store (C3): the JSON document that is the source of
//! truth for domains/clusters/switches, plus the derived routing table and
//! the admin mutation surface that keeps both in lockstep (spec.md §4.3).

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{ConfigError, PersistError};
use crate::routing::{Endpoint, RoutingTable};

pub const DEFAULT_HTTP_ADDR: &str = ":80";
pub const DEFAULT_HTTPS_ADDR: &str = ":443";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
	Random,
	Alived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
	Http,
	Https,
}

fn switch_str(on: bool) -> &'static str {
	if on { "on" } else { "off" }
}

fn parse_switch(s: &str) -> bool {
	s == "on"
}

/// One domain's persisted cluster record (spec.md §3 "Cluster node").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LbNode {
	pub domain: String,
	#[serde(default)]
	pub http_switch: String,
	#[serde(default)]
	pub https_switch: String,
	#[serde(default)]
	pub clients: Vec<ClientEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientEntry {
	pub host: String,
	pub port: String,
}

/// The on-disk JSON document (spec.md §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProxyConfigDocument {
	#[serde(default)]
	pub proxy_method: Option<SelectionPolicy>,
	#[serde(default)]
	pub http_proxy_addr: String,
	#[serde(default)]
	pub https_proxy_addr: String,
	pub http_switch: String,
	pub https_switch: String,
	#[serde(default, rename = "reserve_proxy")]
	pub reserve_proxy: Vec<LbNode>,
}

struct Inner {
	doc: ProxyConfigDocument,
	policy: SelectionPolicy,
	http_addr: String,
	https_addr: String,
	global_http: bool,
	global_https: bool,
	/// Derived domain -> (http_on, https_on). Always rebuilt from `doc` after
	/// any mutation; never itself persisted (spec.md §3 invariant).
	switches: HashMap<String, (bool, bool)>,
	routing: RoutingTable,
}

impl Inner {
	fn from_document(doc: ProxyConfigDocument) -> Result<Self, ConfigError> {
		let global_http = parse_switch(&doc.http_switch);
		let global_https = parse_switch(&doc.https_switch);
		if !global_http && !global_https {
			return Err(ConfigError::NoProtocolEnabled);
		}
		let http_addr = if doc.http_proxy_addr.is_empty() {
			DEFAULT_HTTP_ADDR.to_string()
		} else {
			doc.http_proxy_addr.clone()
		};
		let https_addr = if doc.https_proxy_addr.is_empty() {
			DEFAULT_HTTPS_ADDR.to_string()
		} else {
			doc.https_proxy_addr.clone()
		};
		let policy = doc.proxy_method.unwrap_or(SelectionPolicy::Random);

		let mut inner = Inner {
			doc,
			policy,
			http_addr,
			https_addr,
			global_http,
			global_https,
			switches: HashMap::new(),
			routing: RoutingTable::new(),
		};
		inner.rebuild_derived();
		Ok(inner)
	}

	/// Rebuilds `switches` and `routing` wholesale from `doc.reserve_proxy`.
	/// Called on load and after every admin mutation so the two derived
	/// views can never drift from the persisted cluster-node list.
	fn rebuild_derived(&mut self) {
		self.switches.clear();
		for node in &self.doc.reserve_proxy {
			self.switches.insert(
				node.domain.clone(),
				(parse_switch(&node.http_switch), parse_switch(&node.https_switch)),
			);
			let endpoints = node
				.clients
				.iter()
				.filter_map(|c| c.port.parse::<u16>().ok().map(|p| Endpoint::new(c.host.clone(), p)))
				.collect();
			self.routing.set(node.domain.clone(), endpoints);
		}
		let live: std::collections::HashSet<&str> = self.doc.reserve_proxy.iter().map(|n| n.domain.as_str()).collect();
		let stale: Vec<String> = self
			.routing
			.domains()
			.into_iter()
			.filter(|d| !live.contains(d))
			.map(|d| d.to_string())
			.collect();
		for d in stale {
			self.routing.delete(&d);
		}
	}

	fn find_node_mut(&mut self, domain: &str) -> Option<&mut LbNode> {
		self.doc.reserve_proxy.iter_mut().find(|n| n.domain == domain)
	}

	fn find_node(&self, domain: &str) -> Option<&LbNode> {
		self.doc.reserve_proxy.iter().find(|n| n.domain == domain)
	}
}

/// The shared proxy config store: persisted document + derived routing
/// table + derived switch map, all behind one reader-writer lock so that a
/// concurrent reader never observes a half-mutated view (spec.md §5).
pub struct ProxyStore {
	inner: RwLock<Inner>,
	path: PathBuf,
}

impl ProxyStore {
	/// Loads and validates the configuration document at `path`. Fatal on
	/// malformed JSON or on neither global switch being on (spec.md §4.3,
	/// §7 "Configuration-fatal").
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref().to_path_buf();
		let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
		let doc: ProxyConfigDocument =
			serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.clone(), e))?;
		let inner = Inner::from_document(doc)?;
		info!(http = inner.global_http, https = inner.global_https, policy = ?inner.policy, "proxy config loaded");
		Ok(Self { inner: RwLock::new(inner), path })
	}

	pub fn policy(&self) -> SelectionPolicy {
		self.inner.read().unwrap().policy
	}

	pub fn http_addr(&self) -> String {
		self.inner.read().unwrap().http_addr.clone()
	}

	pub fn https_addr(&self) -> String {
		self.inner.read().unwrap().https_addr.clone()
	}

	pub fn global_switch(&self, protocol: Protocol) -> bool {
		let inner = self.inner.read().unwrap();
		match protocol {
			Protocol::Http => inner.global_http,
			Protocol::Https => inner.global_https,
		}
	}

	/// `(http_on, https_on)` for `domain`, or `None` if the domain is
	/// unconfigured.
	pub fn domain_switch(&self, domain: &str) -> Option<(bool, bool)> {
		self.inner.read().unwrap().switches.get(domain).copied()
	}

	/// Endpoint list for `domain`, cloned out from under the lock.
	pub fn endpoints(&self, domain: &str) -> Vec<Endpoint> {
		self.inner
			.read()
			.unwrap()
			.routing
			.get(domain)
			.map(|s| s.to_vec())
			.unwrap_or_default()
	}

	pub fn domains(&self) -> Vec<String> {
		self.inner.read().unwrap().routing.domains().into_iter().map(String::from).collect()
	}

	/// Writes `doc` to `self.path` atomically: write to a temp file in the
	/// same directory, then rename over the target. A write failure leaves
	/// the previous on-disk document untouched (resolves the Open Question
	/// in spec.md §9 about `SaveToFile`'s ambiguous truncate-before-check
	/// semantics) but, per spec.md §7, does NOT roll back the in-memory
	/// mutation that was already applied.
	fn persist(&self, doc: &ProxyConfigDocument) -> Result<(), PersistError> {
		let bytes = serde_json::to_vec_pretty(doc).map_err(PersistError::Serialize)?;
		let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
		let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PersistError::Write(self.path.clone(), e))?;
		tmp
			.write_all(&bytes)
			.and_then(|_| tmp.flush())
			.map_err(|e| PersistError::Write(self.path.clone(), e))?;
		tmp.persist(&self.path).map_err(|e| PersistError::Write(self.path.clone(), e.error))?;
		Ok(())
	}

	#[instrument(skip(self), fields(domain = %domain))]
	pub fn add_domain(&self, domain: &str) -> bool {
		let mut inner = self.inner.write().unwrap();
		if inner.find_node(domain).is_some() {
			return false;
		}
		inner.doc.reserve_proxy.push(LbNode {
			domain: domain.to_string(),
			http_switch: "off".to_string(),
			https_switch: "off".to_string(),
			clients: vec![],
		});
		inner.rebuild_derived();
		let doc = inner.doc.clone();
		drop(inner);
		if let Err(e) = self.persist(&doc) {
			warn!(%domain, error = %e, "failed to persist config after add_domain");
		}
		true
	}

	pub fn delete_domain(&self, domain: &str) -> bool {
		let mut inner = self.inner.write().unwrap();
		let before = inner.doc.reserve_proxy.len();
		inner.doc.reserve_proxy.retain(|n| n.domain != domain);
		if inner.doc.reserve_proxy.len() == before {
			return false;
		}
		inner.rebuild_derived();
		let doc = inner.doc.clone();
		drop(inner);
		if let Err(e) = self.persist(&doc) {
			warn!(%domain, error = %e, "failed to persist config after delete_domain");
		}
		true
	}

	/// Returns -1 duplicate, 0 persist-failed, 1 ok (spec.md §4.3). A freshly
	/// created domain has its switches set to `https=off, http=<given>`
	/// (spec.md §4.3, explicit regardless of `https_switch`); an existing
	/// domain's switches are updated from `https_switch`/`http_switch` only
	/// once the client is confirmed non-duplicate, matching the
	/// commit-on-success discipline spec.md §9 requires of `update_client`.
	pub fn add_client(&self, domain: &str, host: &str, port: &str, https_switch: bool, http_switch: bool) -> i32 {
		let mut inner = self.inner.write().unwrap();
		let is_new = inner.find_node(domain).is_none();
		if is_new {
			inner.doc.reserve_proxy.push(LbNode {
				domain: domain.to_string(),
				http_switch: switch_str(http_switch).to_string(),
				https_switch: "off".to_string(),
				clients: vec![],
			});
		}
		let node = inner.find_node_mut(domain).expect("just inserted or already present");
		if node.clients.iter().any(|c| c.host == host && c.port == port) {
			return -1;
		}
		if !is_new {
			node.http_switch = switch_str(http_switch).to_string();
			node.https_switch = switch_str(https_switch).to_string();
		}
		node.clients.push(ClientEntry { host: host.to_string(), port: port.to_string() });
		inner.rebuild_derived();
		let doc = inner.doc.clone();
		drop(inner);
		match self.persist(&doc) {
			Ok(()) => 1,
			Err(e) => {
				warn!(%domain, %host, %port, error = %e, "failed to persist config after add_client");
				0
			},
		}
	}

	pub fn delete_client(&self, domain: &str, host: &str, port: &str) -> bool {
		let mut inner = self.inner.write().unwrap();
		let Some(node) = inner.find_node_mut(domain) else { return false };
		let before = node.clients.len();
		node.clients.retain(|c| !(c.host == host && c.port == port));
		if node.clients.len() == before {
			return false;
		}
		inner.rebuild_derived();
		let doc = inner.doc.clone();
		drop(inner);
		if let Err(e) = self.persist(&doc) {
			warn!(%domain, %host, %port, error = %e, "failed to persist config after delete_client");
		}
		true
	}

	/// Switch fields commit only if the endpoint match succeeds (spec.md §9:
	/// the original flips switches before verifying the match; this
	/// implementation does not).
	pub fn update_client(
		&self,
		domain: &str,
		pre_host: &str,
		pre_port: &str,
		new_host: &str,
		new_port: &str,
		https_switch: bool,
		http_switch: bool,
	) -> bool {
		let mut inner = self.inner.write().unwrap();
		let Some(node) = inner.find_node_mut(domain) else { return false };
		let Some(client) = node.clients.iter_mut().find(|c| c.host == pre_host && c.port == pre_port) else {
			return false;
		};
		client.host = new_host.to_string();
		client.port = new_port.to_string();
		node.http_switch = switch_str(http_switch).to_string();
		node.https_switch = switch_str(https_switch).to_string();
		inner.rebuild_derived();
		let doc = inner.doc.clone();
		drop(inner);
		if let Err(e) = self.persist(&doc) {
			warn!(%domain, error = %e, "failed to persist config after update_client");
		}
		true
	}

	/// Returns `false` on no-match (spec.md §9 deviates from the original's
	/// `return true`).
	pub fn update_domain(&self, pre_domain: &str, new_domain: &str, https_switch: bool, http_switch: bool) -> bool {
		let mut inner = self.inner.write().unwrap();
		let Some(node) = inner.find_node_mut(pre_domain) else { return false };
		node.domain = new_domain.to_string();
		node.http_switch = switch_str(http_switch).to_string();
		node.https_switch = switch_str(https_switch).to_string();
		inner.rebuild_derived();
		let doc = inner.doc.clone();
		drop(inner);
		if let Err(e) = self.persist(&doc) {
			warn!(%pre_domain, %new_domain, error = %e, "failed to persist config after update_domain");
		}
		true
	}

	pub fn set_switch(&self, domain: &str, protocol: Protocol, state: bool) -> bool {
		let mut inner = self.inner.write().unwrap();
		let Some(node) = inner.find_node_mut(domain) else { return false };
		match protocol {
			Protocol::Http => node.http_switch = switch_str(state).to_string(),
			Protocol::Https => node.https_switch = switch_str(state).to_string(),
		}
		inner.rebuild_derived();
		let doc = inner.doc.clone();
		drop(inner);
		if let Err(e) = self.persist(&doc) {
			warn!(%domain, error = %e, "failed to persist config after set_switch");
		}
		true
	}

	pub fn set_global_switch(&self, protocol: Protocol, state: bool) {
		let mut inner = self.inner.write().unwrap();
		match protocol {
			Protocol::Http => {
				inner.global_http = state;
				inner.doc.http_switch = switch_str(state).to_string();
			},
			Protocol::Https => {
				inner.global_https = state;
				inner.doc.https_switch = switch_str(state).to_string();
			},
		}
		let doc = inner.doc.clone();
		drop(inner);
		if let Err(e) = self.persist(&doc) {
			warn!(error = %e, "failed to persist config after set_global_switch");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn write_doc(dir: &tempfile::TempDir, doc: &ProxyConfigDocument) -> PathBuf {
		let path = dir.path().join("proxy.json");
		std::fs::write(&path, serde_json::to_vec_pretty(doc).unwrap()).unwrap();
		path
	}

	fn base_doc() -> ProxyConfigDocument {
		ProxyConfigDocument {
			proxy_method: None,
			http_proxy_addr: String::new(),
			https_proxy_addr: String::new(),
			http_switch: "on".to_string(),
			https_switch: "off".to_string(),
			reserve_proxy: vec![],
		}
	}

	#[test]
	fn rejects_both_switches_off() {
		let dir = tempfile::tempdir().unwrap();
		let mut doc = base_doc();
		doc.http_switch = "off".to_string();
		let path = write_doc(&dir, &doc);
		assert!(matches!(ProxyStore::load(path), Err(ConfigError::NoProtocolEnabled)));
	}

	#[test]
	fn defaults_addr_and_policy_when_empty() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_doc(&dir, &base_doc());
		let store = ProxyStore::load(path).unwrap();
		assert_eq!(store.http_addr(), DEFAULT_HTTP_ADDR);
		assert_eq!(store.policy(), SelectionPolicy::Random);
	}

	#[test]
	fn routing_mirrors_config_after_mutations() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_doc(&dir, &base_doc());
		let store = ProxyStore::load(path).unwrap();

		assert!(store.add_domain("a.example"));
		assert!(!store.add_domain("a.example"));
		assert_eq!(store.add_client("a.example", "10.0.0.1", "8080", false, true), 1);
		assert_eq!(store.add_client("a.example", "10.0.0.1", "8080", false, true), -1);
		assert_eq!(store.endpoints("a.example"), vec![Endpoint::new("10.0.0.1", 8080)]);

		assert!(store.update_client("a.example", "10.0.0.1", "8080", "10.0.0.9", "9090", false, true));
		assert_eq!(store.endpoints("a.example"), vec![Endpoint::new("10.0.0.9", 9090)]);
		assert!(!store.update_client("a.example", "nope", "1", "x", "2", false, true));

		assert!(store.delete_client("a.example", "10.0.0.9", "9090"));
		assert!(!store.delete_client("a.example", "10.0.0.9", "9090"));
		assert!(store.endpoints("a.example").is_empty());

		assert!(store.delete_domain("a.example"));
		assert!(!store.delete_domain("a.example"));
	}

	#[test]
	fn add_client_creates_domain_with_https_off() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_doc(&dir, &base_doc());
		let store = ProxyStore::load(path).unwrap();
		assert_eq!(store.add_client("new.example", "10.0.0.1", "80", true, true), 1);
		assert_eq!(store.domain_switch("new.example"), Some((true, false)));
	}

	#[test]
	fn add_client_updates_switches_on_existing_domain_only_on_success() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_doc(&dir, &base_doc());
		let store = ProxyStore::load(path).unwrap();
		store.add_domain("a.example");
		assert_eq!(store.domain_switch("a.example"), Some((false, false)));

		assert_eq!(store.add_client("a.example", "10.0.0.1", "80", true, true), 1);
		assert_eq!(store.domain_switch("a.example"), Some((true, true)));

		// A duplicate endpoint add must not flip switches even though new
		// values are supplied (commit-on-success, spec.md §9).
		assert_eq!(store.add_client("a.example", "10.0.0.1", "80", false, false), -1);
		assert_eq!(store.domain_switch("a.example"), Some((true, true)));
	}

	#[test]
	fn update_domain_and_set_switch_no_match_returns_false() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_doc(&dir, &base_doc());
		let store = ProxyStore::load(path).unwrap();
		assert!(!store.update_domain("ghost.example", "new.example", true, true));
		assert!(!store.set_switch("ghost.example", Protocol::Http, true));

		store.add_domain("a.example");
		assert!(store.update_domain("a.example", "b.example", true, true));
		assert_eq!(store.domain_switch("b.example"), Some((true, true)));
		assert_eq!(store.domain_switch("a.example"), None);
	}

	#[test]
	fn set_global_switch_flips_admission() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_doc(&dir, &base_doc());
		let store = ProxyStore::load(path).unwrap();
		assert!(store.global_switch(Protocol::Http));
		store.set_global_switch(Protocol::Http, false);
		assert!(!store.global_switch(Protocol::Http));
	}

	#[test]
	fn reload_matches_prerestart_state() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_doc(&dir, &base_doc());
		{
			let store = ProxyStore::load(&path).unwrap();
			store.add_domain("c.example");
			store.add_client("c.example", "10.0.0.5", "80", false, true);
		}
		let reloaded = ProxyStore::load(&path).unwrap();
		assert_eq!(reloaded.endpoints("c.example"), vec![Endpoint::new("10.0.0.5", 80)]);
	}
}
