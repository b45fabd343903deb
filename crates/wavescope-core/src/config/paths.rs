//! Standard location of the wavescope configuration file

use std::path::PathBuf;

/// Configuration file name inside the config directory
pub const CONFIG_FILENAME: &str = "wavescope.yaml";

/// Directory holding wavescope configuration
///
/// Returns `<platform config dir>/wavescope`, or `./wavescope` when the
/// platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wavescope")
}

/// Default config file path: `<config dir>/wavescope/wavescope.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILENAME)
}
