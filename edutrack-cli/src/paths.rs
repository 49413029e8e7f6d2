//! XDG data paths for edutrack.

use std::path::PathBuf;

/// Get the edutrack data directory.
///
/// Returns `$XDG_DATA_HOME/edutrack` if set, otherwise
/// `~/.local/share/edutrack`.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("edutrack")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share/edutrack")
    } else {
        PathBuf::from(".local/share/edutrack")
    }
}

/// Default location of the activity database.
pub fn default_database_path() -> PathBuf {
    data_dir().join("edutrack.db")
}
