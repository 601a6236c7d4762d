//! Validated string newtypes for server and service identifiers.
//!
//! Both identifiers end up in container hostnames and in file names
//! (`Dockerfile.<type key>`), so they are checked once at construction and
//! carried around as proof of validity. They serialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use thiserror::Error;

const MAX_IDENTIFIER_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}': {reason}")]
pub struct InvalidIdentifier {
    pub kind: &'static str,
    pub value: String,
    pub reason: &'static str,
}

fn validate(kind: &'static str, value: &str, allow_dot: bool) -> Result<(), InvalidIdentifier> {
    let fail = |reason| InvalidIdentifier {
        kind,
        value: value.to_owned(),
        reason,
    };
    if value.is_empty() || value.len() > MAX_IDENTIFIER_LEN {
        return Err(fail("must be 1-64 characters"));
    }
    let valid = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || (allow_dot && b == b'.'));
    if !valid {
        return Err(fail(if allow_dot {
            "must match [a-zA-Z0-9_.-]"
        } else {
            "must match [a-zA-Z0-9_-]"
        }));
    }
    if value.starts_with(['-', '.']) {
        return Err(fail("must not start with '-' or '.'"));
    }
    Ok(())
}

macro_rules! identifier_newtype {
    ($(#[$meta:meta])* $name:ident, $kind:literal, allow_dot = $dot:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier.
            pub fn new(s: impl Into<String>) -> Result<Self, InvalidIdentifier> {
                let s = s.into();
                validate($kind, &s, $dot)?;
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidIdentifier;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = InvalidIdentifier;
            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.0
            }
        }
    };
}

identifier_newtype!(
    /// Name of a provisioned server. Forms the first label of every service hostname.
    ServerName,
    "server name",
    allow_dot = true
);

identifier_newtype!(
    /// Key of a service attached to a server (`web`, `db`, ...).
    TypeKey,
    "service type key",
    allow_dot = false
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert_eq!(TypeKey::new("web").unwrap().as_str(), "web");
        assert_eq!(TypeKey::new("db_2-main").unwrap(), "db_2-main");
        assert_eq!(ServerName::new("web1.example").unwrap(), "web1.example");
    }

    #[test]
    fn type_key_rejects_dots() {
        let err = TypeKey::new("web.1").unwrap_err();
        assert_eq!(err.kind, "service type key");
        assert!(err.to_string().contains("web.1"));
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(ServerName::new("").is_err());
        assert!(TypeKey::new("a".repeat(65)).is_err());
        assert!(TypeKey::new("a".repeat(64)).is_ok());
    }

    #[test]
    fn rejects_path_and_leading_punctuation() {
        assert!(TypeKey::new("../etc").is_err());
        assert!(TypeKey::new("-web").is_err());
        assert!(ServerName::new(".hidden").is_err());
        assert!(ServerName::new("web 1").is_err());
    }

    #[test]
    fn serde_is_transparent_and_validating() {
        let key = TypeKey::new("cache").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"cache\"");
        let back: TypeKey = serde_json::from_str("\"cache\"").unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<TypeKey>("\"bad key\"").is_err());
    }
}
