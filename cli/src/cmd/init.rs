use std::path::PathBuf;

use anyhow::{ensure, Context as _};
use proctor_core::Config;

use super::{GlobalArgs, SubcmdResult};
use crate::util;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Directory to create proctor.toml in
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

pub fn exec(args: &Args, _global_args: &GlobalArgs) -> SubcmdResult {
    let dir = if args.dir.is_absolute() {
        args.dir.clone()
    } else {
        util::current_dir().join(&args.dir)
    };
    let path = dir.join(Config::FILENAME);
    ensure!(!path.exists(), "{:?} already exists", path);

    std::fs::write(&path, Config::example_toml())
        .with_context(|| format!("Failed to write {:?}", path))?;
    log::info!("Created {:?}", path);
    Ok(())
}
