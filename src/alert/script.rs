//! Alert script loader (C7): parses the alert configuration document into
//! typed `Event`s (spec.md §4.7, §6).

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;

use super::eval::Operator;

/// The metric family an event observes (spec.md §3 "Event", §4.10).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventTarget {
	Disk,
	Mem,
	Cpu,
	Load,
	Status,
}

impl EventTarget {
	fn from_str(s: &str) -> Result<Self, ConfigError> {
		match s {
			"disk" => Ok(EventTarget::Disk),
			"mem" => Ok(EventTarget::Mem),
			"cpu" => Ok(EventTarget::Cpu),
			"load" => Ok(EventTarget::Load),
			"status" => Ok(EventTarget::Status),
			other => Err(ConfigError::UnknownEventTarget(other.to_string())),
		}
	}
}

/// One alert rule bound to one host at parse time (spec.md §3 "Event").
#[derive(Clone, Debug)]
pub struct Event {
	pub host: String,
	pub target: EventTarget,
	pub attr: String,
	pub condition: Option<(Operator, f64)>,
	pub callback: String,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
	pub open: bool,
	pub to: String,
	pub username: String,
	pub password: String,
	pub smtp_server: String,
}

impl Default for EmailConfig {
	fn default() -> Self {
		Self { open: false, to: String::new(), username: String::new(), password: String::new(), smtp_server: String::new() }
	}
}

/// A parsed alert document: email notification context plus per-host event
/// lists ready to push into the event queue.
pub struct AlertScript {
	pub email: EmailConfig,
	pub hosts: Vec<(String, Vec<Event>)>,
}

#[derive(Deserialize)]
struct RawDocument {
	#[serde(default)]
	email_open: Option<String>,
	#[serde(default)]
	emailto: Option<String>,
	#[serde(default)]
	username: Option<String>,
	#[serde(default)]
	password: Option<String>,
	#[serde(default)]
	smtp_server: Option<String>,
	#[serde(default)]
	script: Vec<RawHostBlock>,
}

#[derive(Deserialize)]
struct RawHostBlock {
	host: String,
	#[serde(default)]
	hookscript: Vec<serde_json::Map<String, Value>>,
}

/// The syntax table's fixed set of accepted rule keys (spec.md §3).
const SYNTAX_KEYS: &[&str] = &["host", "hookscript", "attr", "callback", "eventtarget"];

fn is_recognized_key(key: &str) -> bool {
	SYNTAX_KEYS.contains(&key) || Operator::ALL.contains(&key)
}

impl AlertScript {
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref().to_path_buf();
		let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
		let raw: RawDocument = serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.clone(), e))?;
		Self::from_raw(raw)
	}

	fn from_raw(raw: RawDocument) -> Result<Self, ConfigError> {
		let open = raw.email_open.as_deref() == Some("1");
		let email = EmailConfig {
			open,
			to: raw.emailto.unwrap_or_default(),
			username: raw.username.unwrap_or_default(),
			password: raw.password.unwrap_or_default(),
			smtp_server: raw.smtp_server.unwrap_or_default(),
		};

		let mut hosts = Vec::with_capacity(raw.script.len());
		for block in raw.script {
			let mut events = Vec::with_capacity(block.hookscript.len());
			for item in block.hookscript {
				events.push(parse_rule(&block.host, item)?);
			}
			hosts.push((block.host, events));
		}
		Ok(Self { email, hosts })
	}
}

/// Parses one hookscript rule object into an `Event`. Unknown keys fail the
/// load fatally (spec.md §3, §4.7), matching the original's
/// `checkScriptItem`.
fn parse_rule(host: &str, item: serde_json::Map<String, Value>) -> Result<Event, ConfigError> {
	for key in item.keys() {
		if !is_recognized_key(key) {
			return Err(ConfigError::UnknownAlertKey(key.clone()));
		}
	}

	let attr = item.get("attr").and_then(Value::as_str).unwrap_or_default().to_string();
	let callback = item.get("callback").and_then(Value::as_str).unwrap_or_default().to_string();
	let target_str = item.get("eventtarget").and_then(Value::as_str).ok_or_else(|| ConfigError::UnknownEventTarget(String::new()))?;
	let target = EventTarget::from_str(target_str)?;

	let mut condition = None;
	for (key, value) in &item {
		if let Ok(op) = key.parse::<Operator>() {
			let threshold_str = value.as_str().unwrap_or_default();
			let threshold: f64 = threshold_str.parse().unwrap_or_else(|_| {
				tracing::warn!(key = %key, value = %threshold_str, "alert threshold is not a number; treating as NaN");
				f64::NAN
			});
			condition = Some((op, threshold));
			break;
		}
	}

	Ok(Event { host: host.to_string(), target, attr, condition, callback })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn load_str(text: &str) -> Result<AlertScript, ConfigError> {
		let raw: RawDocument = serde_json::from_str(text).map_err(|e| ConfigError::Parse("<test>".into(), e))?;
		AlertScript::from_raw(raw)
	}

	#[test]
	fn s4_cpu_rule_parses_condition_and_target() {
		let doc = r#"{
			"email_open": "0",
			"script": [
				{ "host": "H", "hookscript": [
					{ "eventtarget": "cpu", "attr": "cpu", ">=": "80", "callback": "alert" }
				]}
			]
		}"#;
		let script = load_str(doc).unwrap();
		assert_eq!(script.hosts.len(), 1);
		let (host, events) = &script.hosts[0];
		assert_eq!(host, "H");
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].target, EventTarget::Cpu);
		assert_eq!(events[0].condition, Some((Operator::Ge, 80.0)));
		assert_eq!(events[0].callback, "alert");
	}

	#[test]
	fn s8_unknown_key_is_fatal() {
		let doc = r#"{
			"script": [
				{ "host": "H", "hookscript": [
					{ "eventtarget": "cpu", "foo": "bar" }
				]}
			]
		}"#;
		let err = load_str(doc).unwrap_err();
		assert!(matches!(err, ConfigError::UnknownAlertKey(k) if k == "foo"));
	}

	#[test]
	fn email_open_1_enables_email_with_credentials() {
		let doc = r#"{
			"email_open": "1",
			"emailto": "ops@example.com",
			"username": "bot",
			"password": "secret",
			"smtp_server": "smtp.example.com",
			"script": []
		}"#;
		let script = load_str(doc).unwrap();
		assert!(script.email.open);
		assert_eq!(script.email.to, "ops@example.com");
	}
}
