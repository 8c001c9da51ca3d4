use std::path::PathBuf;

/// Errors that abort process startup (spec.md §7, "Configuration-fatal").
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
	#[error("failed to read config file {0}: {1}")]
	Io(PathBuf, #[source] std::io::Error),
	#[error("failed to parse config file {0}: {1}")]
	Parse(PathBuf, #[source] serde_json::Error),
	#[error("neither http_switch nor https_switch is on")]
	NoProtocolEnabled,
	#[error("unrecognized key in alert script: {0}")]
	UnknownAlertKey(String),
	#[error("eventtarget {0:?} is not one of disk, mem, cpu, load, status")]
	UnknownEventTarget(String),
}

/// Errors raised by admin mutations against the persisted proxy config.
/// These never abort the process; see spec.md §7 "Admin-rejected".
#[derive(thiserror::Error, Debug)]
pub enum PersistError {
	#[error("failed to serialize config: {0}")]
	Serialize(#[source] serde_json::Error),
	#[error("failed to write config file {0}: {1}")]
	Write(PathBuf, #[source] std::io::Error),
}

/// Errors from forwarding a request to a chosen backend.
#[derive(thiserror::Error, Debug)]
pub enum ForwardError {
	#[error("no backend available for host {0}")]
	NoBackend(String),
	#[error("connection to backend {0}:{1} failed: {2}")]
	Connect(String, u16, #[source] std::io::Error),
	#[error("error relaying request to backend: {0}")]
	Relay(#[from] hyper_util::client::legacy::Error),
}
