pub mod init;
pub mod run;
pub mod session;

use std::path::PathBuf;

use proctor_core::{question::Question, Config, Language};

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Config file (default: nearest proctor.toml in the current dir or its ancestors)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    Init(init::Args),

    #[command(alias("r"))]
    Run(run::Args),

    #[command(alias("t"))]
    Test(test::Args),

    #[command(alias("s"))]
    Session(session::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Init(args) => init::exec(args, self),
            Run(args) => run::exec(args, self).await,
            Test(args) => test::exec(args, self).await,
            Session(args) => session::exec(args, self).await,
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::from_toml_file(path.clone()),
            None => Config::from_file_finding_in_ancestors(util::current_dir()),
        }
    }
}

/// Question and candidate code shared by `run`, `test` and `session`.
#[derive(Debug, clap::Args)]
pub struct SourceArgs {
    /// Question file (.toml or .json)
    #[arg()]
    pub question_file: PathBuf,

    /// Candidate source file (default: the question's starter code)
    #[arg()]
    pub source_file: Option<PathBuf>,

    /// Language to use (default: guessed from the source file extension, else the question's default)
    #[arg(short, long)]
    pub lang: Option<Language>,
}

impl SourceArgs {
    pub fn load(&self) -> anyhow::Result<(Question, Option<String>, Option<Language>)> {
        let question = Question::from_file(&self.question_file)?;
        let code = self
            .source_file
            .as_ref()
            .map(util::read_source)
            .transpose()?;
        let lang = self.lang.or_else(|| {
            self.source_file
                .as_deref()
                .and_then(util::guess_language)
        });
        Ok((question, code, lang))
    }
}
