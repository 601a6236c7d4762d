use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("image must not be empty")]
    EmptyImage,
    #[error("invalid port mapping '{0}', expected '<port>', '<host>:<container>' or '<ip>:<host>:<container>'")]
    InvalidPort(String),
    #[error("field '{0}' is managed by provision and must not be set")]
    ReservedField(String),
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// Orchestrator-shaped description of one service, in Compose vocabulary.
///
/// Field order is preserved so regenerated documents stay diff-friendly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(Map<String, Value>);

impl Descriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn image(&self) -> Option<&str> {
        self.0.get("image").and_then(Value::as_str)
    }

    pub fn hostname(&self) -> Option<&str> {
        self.0.get("hostname").and_then(Value::as_str)
    }

    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.0.insert("hostname".to_owned(), Value::String(hostname.into()));
    }

    /// Set `build.context` and `build.dockerfile`, keeping any other build keys.
    ///
    /// The short form `build: <context>` is expanded to the mapping form.
    pub fn set_build(&mut self, context: &str, dockerfile: &str) {
        let build = self
            .0
            .entry("build")
            .or_insert_with(|| Value::Object(Map::new()));
        if !build.is_object() {
            *build = Value::Object(Map::new());
        }
        if let Value::Object(map) = build {
            map.insert("context".to_owned(), Value::String(context.to_owned()));
            map.insert("dockerfile".to_owned(), Value::String(dockerfile.to_owned()));
        }
    }

    /// Add one environment variable.
    ///
    /// Compose accepts both a mapping and a `KEY=VALUE` list; the existing
    /// form is kept. A missing environment becomes a mapping.
    pub fn insert_environment(&mut self, key: &str, value: &str) -> Result<(), DescriptorError> {
        let env = self
            .0
            .entry("environment")
            .or_insert_with(|| Value::Object(Map::new()));
        match env {
            Value::Object(map) => {
                map.insert(key.to_owned(), Value::String(value.to_owned()));
                Ok(())
            }
            Value::Array(items) => {
                let prefix = format!("{key}=");
                items.retain(|item| !item.as_str().is_some_and(|s| s.starts_with(&prefix)));
                items.push(Value::String(format!("{key}={value}")));
                Ok(())
            }
            _ => Err(DescriptorError::InvalidField {
                field: "environment".to_owned(),
                reason: "expected a table or an array".to_owned(),
            }),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Check a Compose short-syntax port mapping.
///
/// Values that use `${VAR}` interpolation are left to the orchestrator.
pub fn validate_port(spec: &str) -> Result<(), DescriptorError> {
    let invalid = || DescriptorError::InvalidPort(spec.to_owned());
    if spec.contains('$') {
        return Ok(());
    }
    let mapping = match spec.rsplit_once('/') {
        Some((mapping, "tcp" | "udp")) => mapping,
        Some(_) => return Err(invalid()),
        None => spec,
    };
    // IPv6 host addresses are bracketed: [::1]:8080:80
    let (bracketed_ip, rest) = match mapping.strip_prefix('[') {
        Some(tail) => match tail.split_once("]:") {
            Some((ip, rest)) if !ip.is_empty() => (true, rest),
            _ => return Err(invalid()),
        },
        None => (false, mapping),
    };
    let parts: Vec<&str> = rest.split(':').collect();
    // An empty host port after an IP lets the host pick one.
    let (host, container) = match (bracketed_ip, parts.as_slice()) {
        (false, [container]) => (None, *container),
        (false, [host, container]) => (Some(*host), *container),
        (false, [ip, host, container]) if !ip.is_empty() => {
            (Some(*host).filter(|h| !h.is_empty()), *container)
        }
        (true, [host, container]) => (Some(*host).filter(|h| !h.is_empty()), *container),
        _ => return Err(invalid()),
    };
    for port in host.into_iter().chain([container]) {
        // Compose also allows ranges such as 8000-8010.
        let ok = port
            .split('-')
            .all(|p| p.parse::<u16>().is_ok_and(|n| n > 0));
        if !ok || port.split('-').count() > 2 {
            return Err(invalid());
        }
    }
    Ok(())
}
