use super::{json_pretty, load_server, EXIT_SUCCESS};
use provision_compose::{build_compose_document, compose_env_file};
use std::path::Path;

/// Print a generated file. Nothing is written.
pub fn run(manifest: &Path, env: bool, json: bool) -> Result<u8, String> {
    let (_, server) = load_server(manifest)?;
    let artifact = if env {
        compose_env_file(&server.config_dir)
    } else {
        build_compose_document(&server)
    }
    .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&artifact)?);
    } else {
        print!("{}", artifact.content);
    }
    Ok(EXIT_SUCCESS)
}
