mod config;
pub mod linkage;

pub use config::{Config, GoogleConfig, NotionConfig, OllamaConfig, WorkdayConfig};
pub use linkage::{LinkageRecorder, LinkageStore, Mapping};

use std::path::PathBuf;

/// Returns `~/.config/focusroute[-dev]/` based on FOCUSROUTE_ENV.
///
/// Set FOCUSROUTE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSROUTE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusroute-dev")
    } else {
        base_dir.join("focusroute")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
