use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{resolve_app_paths, AppPaths, ClientConfig, StartupError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::runner::RunError;

const FRAMES_ENV_VAR: &str = "CELLVIEW_FRAMES";
const EXPORT_ATLAS_ENV_VAR: &str = "CELLVIEW_EXPORT_ATLAS";
const DEFAULT_FRAMES: u32 = 900;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path} at {field}: {source}")]
    Field {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub(crate) enum ClientError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Run(#[from] RunError),
}

#[derive(Debug, Clone)]
pub(crate) struct RunOptions {
    pub(crate) frames: u32,
    pub(crate) export_atlas: bool,
}

pub(crate) struct AppWiring {
    pub(crate) paths: AppPaths,
    pub(crate) config: ClientConfig,
    pub(crate) options: RunOptions,
}

pub(crate) fn build_app() -> Result<AppWiring, ClientError> {
    init_tracing();
    info!("=== cellview startup ===");

    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        floors = %paths.floor_textures_dir.display(),
        cache_dir = %paths.cache_dir.display(),
        "startup"
    );
    let config = load_config(&paths.config_file)?;
    let options = RunOptions {
        frames: parse_frames_from_env(),
        export_atlas: parse_flag_from_env(EXPORT_ATLAS_ENV_VAR),
    };

    Ok(AppWiring {
        paths,
        config,
        options,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Reads `path` as JSON; a missing file means defaults.
pub(crate) fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config_missing_using_defaults");
            return Ok(ClientConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let config = parse_config(path, &raw)?;
    info!(path = %path.display(), "config_loaded");
    Ok(config)
}

fn parse_config(path: &Path, raw: &str) -> Result<ClientConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        let source = error.into_inner();
        if field.is_empty() || field == "." {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        } else {
            ConfigError::Field {
                path: path.to_path_buf(),
                field,
                source,
            }
        }
    })
}

fn parse_frames_from_env() -> u32 {
    std::env::var(FRAMES_ENV_VAR)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(DEFAULT_FRAMES)
}

fn parse_flag_from_env(var: &str) -> bool {
    std::env::var(var)
        .map(|raw| matches!(raw.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(&dir.path().join("cellview.json")).expect("defaults");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cellview.json");
        fs::write(
            &path,
            r#"{"animations_enabled": true, "transitions": {"seed": 5}}"#,
        )
        .expect("write");
        let config = load_config(&path).expect("config");
        assert!(config.animations_enabled);
        assert_eq!(config.transitions.seed, 5);
        assert_eq!(config.transitions.tile_size, 32);
        assert_eq!(config.path_search_budget, 100);
    }

    #[test]
    fn bad_field_reports_its_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cellview.json");
        fs::write(&path, r#"{"transitions": {"diffusion_depth": "deep"}}"#).expect("write");
        match load_config(&path) {
            Err(ConfigError::Field { field, .. }) => {
                assert_eq!(field, "transitions.diffusion_depth")
            }
            other => panic!("expected field error, got {other:?}"),
        }
    }
}
