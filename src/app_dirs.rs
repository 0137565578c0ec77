use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/walktest`, falling back to the platform data dir
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("walktest"),
            )
        } else {
            ProjectDirs::from("", "", "walktest")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn log_dir() -> PathBuf {
        Self::state_dir()
            .map(|d| d.join("logs"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn export_dir() -> PathBuf {
        Self::state_dir()
            .map(|d| d.join("records"))
            .unwrap_or_else(|| PathBuf::from("walktest-records"))
    }
}
