use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
mod atomic_io;
pub mod config;
pub mod events;
pub mod tasks;
pub mod transitions;

pub use app::{
    ActiveView, CardinalDirection, Cell, CharacterId, ClientLoop, Direction8, FieldOfView,
    FloorGrid, FloorTypeId, FrameSummary, InputAction, InputOutcome, ItemId, LogEntry,
    MetricsHandle, PlaneLevel, PresentationMetricsSnapshot, Stage, UiPortion, UiState,
};
pub use config::{ClientConfig, ProtocolPolicy, TransitionConfig};
pub use events::{decode_event, Event, EventInbox, EventScheduler, ProtocolError};
pub use tasks::{GridPathfinder, PathFinder, TaskManager, Volition, WalkToCell, WorldView};
pub use transitions::{
    SharedTransitions, TransitionAtlas, TransitionError, TransitionGenerator, TransitionKey,
};

pub const ROOT_ENV_VAR: &str = "CELLVIEW_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub floor_textures_dir: PathBuf,
    pub cache_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create cache directory at {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "{env_var} is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot {
        path: PathBuf,
        env_var: &'static str,
    },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/cellview\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Locates the project root (from `CELLVIEW_ROOT` or by walking up from the executable) and
/// makes sure the cache directory exists.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_under(root)
}

pub fn app_paths_under(root: PathBuf) -> Result<AppPaths, StartupError> {
    let config_file = root.join("cellview.json");
    let floor_textures_dir = root.join("assets").join("floors");
    let cache_dir = root.join("cache");

    fs::create_dir_all(&cache_dir).map_err(|source| StartupError::CreateCacheDir {
        path: cache_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        config_file,
        floor_textures_dir,
        cache_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    path: normalized,
                    env_var: ROOT_ENV_VAR,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file()
        && (path.join("crates").is_dir() || path.join("assets").is_dir())
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml_and_a_source_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(!is_repo_marker(dir.path()));
        fs::write(dir.path().join("Cargo.toml"), "[workspace]\n").expect("manifest");
        assert!(!is_repo_marker(dir.path()));
        fs::create_dir(dir.path().join("assets")).expect("assets");
        assert!(is_repo_marker(dir.path()));
    }

    #[test]
    fn app_paths_create_cache_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = app_paths_under(dir.path().to_path_buf()).expect("paths");
        assert!(paths.cache_dir.is_dir());
        assert_eq!(
            paths.floor_textures_dir,
            dir.path().join("assets").join("floors")
        );
        assert_eq!(paths.config_file, dir.path().join("cellview.json"));
    }
}
