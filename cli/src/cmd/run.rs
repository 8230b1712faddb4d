use proctor_core::action;

use super::{GlobalArgs, SourceArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    pub source: SourceArgs,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let (question, code, lang) = args.source.load()?;
    let _ = action::do_run(&question, code, lang, &cfg).await?;
    Ok(())
}
