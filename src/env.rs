use std::path::Path;

use tracing::{info, warn};

pub const PRODUCTION_PROFILE: &str = "production";

/// What happened to one env file during start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFile {
    Loaded(&'static str),
    Missing(&'static str),
}

/// Loads the env files for the profile named by `ROCKET_PROFILE`.
pub fn load_environment() -> Result<Vec<EnvFile>, dotenvy::Error> {
    let profile = dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());
    load_profile(&profile)
}

/// Later files override earlier ones.
pub fn load_profile(profile: &str) -> Result<Vec<EnvFile>, dotenvy::Error> {
    let profile_file = if profile == PRODUCTION_PROFILE {
        "config/prod.env"
    } else {
        "config/dev.env"
    };

    ["config/common.env", profile_file, ".secrets.env"]
        .into_iter()
        .map(load_env_file)
        .collect()
}

fn load_env_file(path: &'static str) -> Result<EnvFile, dotenvy::Error> {
    if !Path::new(path).exists() {
        return Ok(EnvFile::Missing(path));
    }

    dotenvy::from_filename_override(path)?;
    Ok(EnvFile::Loaded(path))
}

/// Reports the outcome of [`load_environment`]. Call once tracing is up.
pub fn log_env_files(files: &[EnvFile]) {
    for file in files {
        match file {
            EnvFile::Loaded(path) => info!("Loaded environment from: {}", path),
            EnvFile::Missing(path) => warn!("Environment file {} not found, skipping", path),
        }
    }
}
