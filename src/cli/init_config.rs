//! Write a commented default operator config.

use super::config::{default_config_path, default_credentials_dir, ConsortiumConfig};
use std::path::PathBuf;

pub fn execute(
    path: Option<String>,
    credentials_dir: Option<String>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(default_config_path);
    let credentials_dir = credentials_dir
        .map(PathBuf::from)
        .unwrap_or_else(default_credentials_dir);

    if config_path.exists() && !force {
        return Err(format!(
            "Config file '{}' already exists (use --force to overwrite)",
            config_path.display()
        )
        .into());
    }

    ConsortiumConfig::create_default(&config_path, &credentials_dir)?;
    println!("Wrote {}", config_path.display());
    Ok(())
}
