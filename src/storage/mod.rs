// Storage module for persistent autopilot state
pub mod mirror;
pub mod pending_settings;
pub mod purchase_cooldown;
pub mod cycle_marker;

pub use mirror::*;
pub use pending_settings::*;
pub use purchase_cooldown::*;
pub use cycle_marker::*;

use std::fs;
use std::path::Path;

/// Write through a sibling temp file so a cooperating reader never sees a
/// half-written document.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
