//! Check that the configured member credentials can be read.

use super::config::{default_credentials_dir, ConsortiumConfig};
use consortium::credentials::{CredentialProvider, FileCredentials};
use std::path::Path;

pub fn execute(config: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConsortiumConfig::load_or_default(config.as_deref().map(Path::new))?;
    let dir = config
        .credentials
        .dir
        .clone()
        .unwrap_or_else(default_credentials_dir);

    let credentials = FileCredentials::new(dir);
    let members = credentials.members(&config.consortium.members)?;
    let network_cert = credentials.network_cert()?;

    println!("Credentials in {}", credentials.dir().display());
    for member in &members {
        println!("  {}: certificate {} bytes", member.id, member.cert.len());
    }
    println!("  network certificate {} bytes", network_cert.len());
    Ok(())
}
