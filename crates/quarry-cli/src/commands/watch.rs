//! Watch command implementation.

use crate::cli::WatchArgs;
use crate::context::Context;
use crate::error::{CliError, Result};
use quarry_batch::PollerWorker;

/// Execute the watch command.
///
/// The service client is blocking, so the poller is built before the tokio
/// runtime exists and the worker is dropped after it has stopped.
pub fn execute_watch(args: WatchArgs, context: &Context) -> Result<()> {
    let mut config = context.config.poller.clone();
    if let Some(interval) = args.interval {
        config.sweep_interval_secs = interval;
    }
    config.validate().map_err(CliError::Config)?;

    let mut worker = PollerWorker::new(context.poller_with(config)?);
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    let outcome = match args.cycles {
        Some(cycles) => runtime.block_on(worker.run_cycles(cycles)).map(|_| ()),
        None => runtime.block_on(worker.run()),
    };
    drop(runtime);
    outcome?;

    println!("{}", worker.metrics().summary());
    Ok(())
}
