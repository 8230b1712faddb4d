use std::path::PathBuf;

use anyhow::Context as _;
use proctor_core::action;

use super::{GlobalArgs, SourceArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Write the submission JSON here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Submit without asking once the tests have run
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let mut cfg = global_args.load_config()?;
    if args.yes {
        cfg.session.confirm_before_submit = false;
    }
    let (question, code, lang) = args.source.load()?;
    let record = action::do_session(question, code, lang, &cfg).await?;

    let json = serde_json::to_string_pretty(&record).context("Failed to serialize submission")?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            log::info!("Submission written to {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
