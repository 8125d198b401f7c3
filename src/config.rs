use anyhow::Result;
use std::path::PathBuf;

use crate::cli::Cli;

pub fn resolve_data_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.data.clone() {
        return Ok(p);
    }
    Ok(mapping_finder_home()?.join("mappings"))
}

fn mapping_finder_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("mapping-finder"))
}
