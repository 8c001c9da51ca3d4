//! Certificate directory layout (spec.md §6): a root directory with one
//! subdirectory per TLS-serviceable domain, each holding a fixed-named
//! certificate and key file. The TLS listener itself is out of scope (only
//! its interface is specified here, per spec.md §1); this module only
//! answers "is this domain TLS-serviceable".

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CERT_FILE_NAME: &str = "cert.pem";
pub const KEY_FILE_NAME: &str = "key.pem";

#[derive(Default, Debug, Clone)]
pub struct CertStore {
	domains: HashSet<String>,
}

impl CertStore {
	/// Enumerates `root`'s subdirectories to build the set of domains with a
	/// certificate on file. A missing or non-directory root yields an empty
	/// store rather than an error — absence of the certificate directory
	/// just means no domain is TLS-serviceable.
	pub fn load(root: impl AsRef<Path>) -> std::io::Result<Self> {
		let root = root.as_ref();
		let mut domains = HashSet::new();
		let entries = match std::fs::read_dir(root) {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self { domains }),
			Err(e) => return Err(e),
		};
		for entry in entries {
			let entry = entry?;
			if !entry.file_type()?.is_dir() {
				continue;
			}
			let domain = entry.file_name().to_string_lossy().into_owned();
			domains.insert(domain);
		}
		Ok(Self { domains })
	}

	pub fn has_cert(&self, domain: &str) -> bool {
		self.domains.contains(domain)
	}

	pub fn cert_paths(&self, root: impl AsRef<Path>, domain: &str) -> Option<(PathBuf, PathBuf)> {
		if !self.has_cert(domain) {
			return None;
		}
		let dir = root.as_ref().join(domain);
		Some((dir.join(CERT_FILE_NAME), dir.join(KEY_FILE_NAME)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_root_yields_empty_store() {
		let store = CertStore::load("/nonexistent/cert/root/for/edgegate/tests").unwrap();
		assert!(!store.has_cert("a.example"));
	}

	#[test]
	fn enumerates_domain_subdirectories() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir(dir.path().join("a.example")).unwrap();
		let store = CertStore::load(dir.path()).unwrap();
		assert!(store.has_cert("a.example"));
		assert!(!store.has_cert("b.example"));
	}
}
