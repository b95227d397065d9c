use anyhow::bail;
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::success;
use crate::core::config::{default_config, save_config};
use crate::core::paths::default_config_path;

#[derive(Args)]
pub struct InitConfigArgs {
    /// Where to write the file (defaults to ~/.kestrel/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitConfigArgs) -> anyhow::Result<()> {
    let path = args.output.unwrap_or_else(default_config_path);
    if path.exists() && !args.force {
        bail!("{} already exists; use --force to overwrite", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    save_config(&path, &default_config())?;
    success(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}
