use std::path::{Path, PathBuf};

use alpha_validator::{ValidatorContext, OPERATORS_FILE};
use anyhow::{anyhow, Context, Result};
use dirs_next::home_dir;
use tracing::debug;

pub const DATA_DIR_ENV: &str = "ALPHA_DATA_DIR";
pub const DEFAULT_REGION: &str = "USA";
pub const DEFAULT_DELAY: u32 = 1;
pub const DEFAULT_UNIVERSE: &str = "TOP3000";

/// Picks the catalog directory: an explicit path (flag or environment),
/// then `./data` when it holds an operator catalog, then the per-user
/// directory under the home folder.
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        debug!(dir = %dir.display(), "using configured data directory");
        return Ok(dir.to_path_buf());
    }

    let local = PathBuf::from("data");
    if local.join(OPERATORS_FILE).is_file() {
        debug!(dir = %local.display(), "using local data directory");
        return Ok(local);
    }

    let user = user_data_dir()
        .ok_or_else(|| anyhow!("no data directory given and the home directory is unknown"))?;
    debug!(dir = %user.display(), "using per-user data directory");
    Ok(user)
}

fn user_data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".alpha-validator").join("data"))
}

pub fn load_context(dir: &Path) -> Result<ValidatorContext> {
    ValidatorContext::load(dir)
        .with_context(|| format!("failed to load catalogs from {}", dir.display()))
}
