use std::process::Command;

use tracing::info;

use crate::error::{RbtError, Result};
use crate::types::RunMode;

pub fn render_command(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    format!("{} {}", program, args.join(" "))
}

pub fn maybe_print_command(cmd: &Command, run_mode: RunMode) {
    if run_mode.dry_run {
        println!("dry-run: {}", render_command(cmd));
    } else if run_mode.verbose {
        info!("exec: {}", render_command(cmd));
    }
}

/// Runs `cmd` to completion. `None` means the child was killed by a signal.
pub fn run_command(cmd: &mut Command, run_mode: RunMode) -> Result<Option<i32>> {
    maybe_print_command(cmd, run_mode);
    let status = cmd.status().map_err(|e| {
        RbtError::message(format!("{}: {}", cmd.get_program().to_string_lossy(), e))
    })?;
    Ok(status.code())
}
