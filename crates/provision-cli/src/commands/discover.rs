use super::{json_pretty, load_server, EXIT_SUCCESS};
use provision_compose::{discover_fragments, resolve_override};
use std::path::Path;

pub fn run(manifest: &Path, json: bool) -> Result<u8, String> {
    let (_, server) = load_server(manifest)?;
    let fragments = discover_fragments(&server.config_dir).map_err(|e| e.to_string())?;

    let overrides: serde_json::Map<String, serde_json::Value> = server
        .services
        .keys()
        .filter_map(|key| {
            let found = resolve_override(&server.config_dir, key);
            found
                .present
                .then(|| (key.to_string(), found.path.display().to_string().into()))
        })
        .collect();

    if json {
        let payload = serde_json::json!({
            "config_dir": server.config_dir,
            "fragments": fragments,
            "overrides": overrides,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if fragments.is_empty() {
        println!("no compose fragments in {}", server.config_dir.display());
    }
    for name in &fragments {
        println!("{name}");
    }
    for (key, path) in &overrides {
        println!("override {key}: {}", path.as_str().unwrap_or_default());
    }
    Ok(EXIT_SUCCESS)
}
