//! Locations of local state.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;

/// Root of local state: `$WINCLOUD_HOME`, else `~/.wincloud`.
///
/// # Errors
///
/// Returns an error if neither is available.
pub fn wincloud_home() -> Result<PathBuf> {
    resolve_home(std::env::var_os("WINCLOUD_HOME"), dirs::home_dir())
}

fn resolve_home(overridden: Option<OsString>, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = overridden.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = home.ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".wincloud"))
}
