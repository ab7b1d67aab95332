//! Sweep command implementation.

use crate::context::Context;
use crate::error::Result;

/// Execute the sweep command.
pub fn execute_sweep(context: &Context) -> Result<()> {
    let report = context.poller()?.sweep();
    println!("{}", context.formatter.format_report(&report)?);
    Ok(())
}
