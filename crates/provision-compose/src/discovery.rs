use crate::ComposeError;
use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

const FRAGMENT_PREFIX: &str = "docker-compose";
const FRAGMENT_SUFFIX: &str = ".yml";

/// Whether `name` matches `docker-compose*.yml`.
pub fn is_fragment_name(name: &str) -> bool {
    name.len() >= FRAGMENT_PREFIX.len() + FRAGMENT_SUFFIX.len()
        && name.starts_with(FRAGMENT_PREFIX)
        && name.ends_with(FRAGMENT_SUFFIX)
}

fn stem(name: &str) -> &str {
    name.strip_suffix(FRAGMENT_SUFFIX).unwrap_or(name)
}

/// Fragment precedence order: lexical by stem.
///
/// A stem that prefixes another sorts first, so `docker-compose.yml` loads
/// before `docker-compose-overrides.yml` and the overrides win.
fn fragment_order(a: &str, b: &str) -> Ordering {
    stem(a).cmp(stem(b))
}

/// List the compose fragments in `config_dir` (non-recursive), as base
/// file names in a stable order. A missing directory has no fragments.
pub fn discover_fragments(config_dir: &Path) -> Result<Vec<String>, ComposeError> {
    let read_err = |source| ComposeError::Read {
        path: config_dir.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(config_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(read_err(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(read_err)?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            debug!("skipping non UTF-8 entry {}", entry.path().display());
            continue;
        };
        if is_fragment_name(name) && entry.path().is_file() {
            names.push(name.to_owned());
        }
    }
    names.sort_by(|a, b| fragment_order(a, b));
    debug!("discovered {} compose fragments in {}", names.len(), config_dir.display());
    Ok(names)
}
