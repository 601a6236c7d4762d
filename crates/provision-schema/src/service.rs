//! Service variants that can be attached to a server.
//!
//! Only variants implementing [`ComposableService`] take part in compose
//! document generation; [`ServiceSpec::as_composable`] is the capability check.

use crate::descriptor::{validate_port, Descriptor, DescriptorError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A service that can describe itself as a Compose service entry.
pub trait ComposableService {
    fn describe(&self) -> Result<Descriptor, DescriptorError>;
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceSpec {
    Http(HttpService),
    Db(DbService),
    Cache(CacheService),
    Compose(RawComposeService),
    External(ExternalService),
}

impl ServiceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Db(_) => "db",
            Self::Cache(_) => "cache",
            Self::Compose(_) => "compose",
            Self::External(_) => "external",
        }
    }

    pub fn as_composable(&self) -> Option<&dyn ComposableService> {
        match self {
            Self::Http(s) => Some(s),
            Self::Db(s) => Some(s),
            Self::Cache(s) => Some(s),
            Self::Compose(s) => Some(s),
            Self::External(_) => None,
        }
    }
}

/// Web server container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpService {
    #[serde(default = "default_http_image")]
    pub image: String,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl Default for HttpService {
    fn default() -> Self {
        Self {
            image: default_http_image(),
            ports: Vec::new(),
            volumes: Vec::new(),
            environment: BTreeMap::new(),
        }
    }
}

/// MySQL-compatible database container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DbService {
    #[serde(default = "default_db_image")]
    pub image: String,
    #[serde(default)]
    pub root_password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
}

impl Default for DbService {
    fn default() -> Self {
        Self {
            image: default_db_image(),
            root_password: None,
            database: None,
            user: None,
            password: None,
            ports: Vec::new(),
            volumes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheService {
    #[serde(default = "default_cache_image")]
    pub image: String,
    #[serde(default)]
    pub ports: Vec<String>,
}

impl Default for CacheService {
    fn default() -> Self {
        Self {
            image: default_cache_image(),
            ports: Vec::new(),
        }
    }
}

/// Compose fields passed through as written in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawComposeService {
    #[serde(flatten)]
    pub fields: toml::Table,
}

/// A service hosted outside this server's container stack.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalService {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

fn default_http_image() -> String {
    "nginx:stable".to_owned()
}

fn default_db_image() -> String {
    "mariadb:10.11".to_owned()
}

fn default_cache_image() -> String {
    "redis:7".to_owned()
}

fn base_descriptor(image: &str, ports: &[String]) -> Result<Descriptor, DescriptorError> {
    if image.trim().is_empty() {
        return Err(DescriptorError::EmptyImage);
    }
    let mut d = Descriptor::new();
    d.insert("image", image);
    if !ports.is_empty() {
        for port in ports {
            validate_port(port)?;
        }
        d.insert("ports", json!(ports));
    }
    Ok(d)
}

impl ComposableService for HttpService {
    fn describe(&self) -> Result<Descriptor, DescriptorError> {
        let mut d = base_descriptor(&self.image, &self.ports)?;
        if !self.volumes.is_empty() {
            d.insert("volumes", json!(self.volumes));
        }
        if !self.environment.is_empty() {
            d.insert("environment", json!(self.environment));
        }
        Ok(d)
    }
}

impl ComposableService for DbService {
    fn describe(&self) -> Result<Descriptor, DescriptorError> {
        let mut d = base_descriptor(&self.image, &self.ports)?;
        if self.user.is_some() != self.password.is_some() {
            return Err(DescriptorError::InvalidField {
                field: "user".to_owned(),
                reason: "user and password must be set together".to_owned(),
            });
        }
        let env: Map<String, Value> = [
            ("MYSQL_ROOT_PASSWORD", &self.root_password),
            ("MYSQL_DATABASE", &self.database),
            ("MYSQL_USER", &self.user),
            ("MYSQL_PASSWORD", &self.password),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_owned(), Value::String(v.clone()))))
        .collect();
        if !env.is_empty() {
            d.insert("environment", Value::Object(env));
        }
        if !self.volumes.is_empty() {
            d.insert("volumes", json!(self.volumes));
        }
        Ok(d)
    }
}

impl ComposableService for CacheService {
    fn describe(&self) -> Result<Descriptor, DescriptorError> {
        base_descriptor(&self.image, &self.ports)
    }
}

impl ComposableService for RawComposeService {
    fn describe(&self) -> Result<Descriptor, DescriptorError> {
        if self.fields.contains_key("hostname") {
            return Err(DescriptorError::ReservedField("hostname".to_owned()));
        }
        let mut map = Map::new();
        for (key, value) in &self.fields {
            map.insert(key.clone(), toml_value_to_json(key, value.clone())?);
        }

        match map.get("image") {
            Some(Value::String(image)) if image.trim().is_empty() => {
                return Err(DescriptorError::EmptyImage)
            }
            Some(Value::String(_)) | None => {}
            Some(_) => {
                return Err(DescriptorError::InvalidField {
                    field: "image".to_owned(),
                    reason: "expected a string".to_owned(),
                })
            }
        }
        if !matches!(
            map.get("environment"),
            None | Some(Value::Object(_) | Value::Array(_))
        ) {
            return Err(DescriptorError::InvalidField {
                field: "environment".to_owned(),
                reason: "expected a table or an array".to_owned(),
            });
        }
        if let Some(ports) = map.get("ports") {
            let Some(ports) = ports.as_array() else {
                return Err(DescriptorError::InvalidField {
                    field: "ports".to_owned(),
                    reason: "expected an array".to_owned(),
                });
            };
            for port in ports {
                match port {
                    Value::String(s) => validate_port(s)?,
                    Value::Number(n) => validate_port(&n.to_string())?,
                    // Long syntax entries are left to the orchestrator.
                    Value::Object(_) => {}
                    other => return Err(DescriptorError::InvalidPort(other.to_string())),
                }
            }
        }
        Ok(Descriptor::from_map(map))
    }
}

/// Convert a [`toml::Value`] into a [`serde_json::Value`].
///
/// TOML has no null; datetimes are stringified. JSON cannot hold `inf` or
/// `nan`, so those are rejected under the top-level `field` name.
fn toml_value_to_json(field: &str, val: toml::Value) -> Result<Value, DescriptorError> {
    Ok(match val {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => json!(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| DescriptorError::InvalidField {
                field: field.to_owned(),
                reason: format!("{f} is not a finite number"),
            })?,
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Array(arr) => Value::Array(
            arr.into_iter()
                .map(|v| toml_value_to_json(field, v))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(tbl) => Value::Object(
            tbl.into_iter()
                .map(|(k, v)| toml_value_to_json(field, v).map(|v| (k, v)))
                .collect::<Result<_, DescriptorError>>()?,
        ),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
    })
}
