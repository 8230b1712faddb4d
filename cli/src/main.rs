mod cmd;
mod util;

use std::future::Future;

use clap::Parser;
use cmd::GlobalArgs;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = GlobalArgs::parse();
    block_on_detached(app.exec_subcmd())
        .map_err(anyhow::Error::from)
        .and_then(|res| res)
        .unwrap_or_else(|e| {
            eprintln!("Error: {:?}", e);
            std::process::exit(1);
        });
}

/// Drives `fut` to completion, then shuts the runtime down without waiting for
/// blocking tasks. A confirmation prompt that lost the race against the timer
/// is still blocked on stdin at that point.
fn block_on_detached<F: Future>(fut: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(fut);
    runtime.shutdown_background();
    Ok(output)
}
