//! Subcommand handlers. Each prints its outcome as JSON on stdout.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

pub mod bank;
pub mod report;
pub mod session;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
