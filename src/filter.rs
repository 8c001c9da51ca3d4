//! Access filter (C4): admits or rejects a request before selection runs,
//! per the decision table in spec.md §4.4.

use crate::config::{Protocol, ProxyStore};
use crate::tls::CertStore;

pub struct Decision {
	pub admit: bool,
	/// Explanatory HTML body, set only when `admit` is false.
	pub body: Option<String>,
}

impl Decision {
	fn admit() -> Self {
		Self { admit: true, body: None }
	}

	fn reject(host: &str, reason: &str) -> Self {
		Self { admit: false, body: Some(format!("{host}&nbsp;&nbsp;{reason}")) }
	}
}

/// Evaluates the §4.4 decision table for one request. `host` should already
/// have any port suffix stripped by the caller (matching the selector's
/// host-header handling).
pub fn check(config: &ProxyStore, certs: &CertStore, host: &str, is_tls: bool) -> Decision {
	if is_tls {
		if !certs.has_cert(host) {
			return Decision::reject(host, "can't be accessed via https, please configure a digital certificate.");
		}
		if !config.global_switch(Protocol::Https) {
			return Decision::reject(host, "please open global https proxy switch.");
		}
		let https_on = config.domain_switch(host).map(|(_, https)| https).unwrap_or(false);
		if !https_on {
			return Decision::reject(host, "please open https proxy switch.");
		}
		Decision::admit()
	} else {
		if !config.global_switch(Protocol::Http) {
			return Decision::reject(host, "please open global http proxy switch.");
		}
		let http_on = config.domain_switch(host).map(|(http, _)| http).unwrap_or(false);
		if !http_on {
			return Decision::reject(host, "please open http proxy switch.");
		}
		Decision::admit()
	}
}

/// Strips a `:port` suffix from a `Host` header value, per spec.md §4.5.
pub fn strip_port(host: &str) -> &str {
	host.split(':').next().unwrap_or(host)
}
