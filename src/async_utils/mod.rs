//! Asynchronous utilities for use with Tokio, plus helpers for running
//! external commands.

use std::{pin::Pin, process::Output};

use crate::prelude::*;

pub mod io;

/// A type alias for a boxed future. This is used to make it easier to work with
/// with complex futures.
pub type BoxedFuture<Output> = Pin<Box<dyn Future<Output = Output> + Send>>;

/// Report any command failures, and include any error output.
///
/// Standard output and standard error are logged at `debug` level. Lines of
/// standard error which satisfy `is_warning_line` are logged as warnings
/// even when the command succeeds, which is how Poppler reports damaged but
/// readable files.
pub fn check_for_command_failure(
    command_name: &str,
    output: &Output,
    is_warning_line: Option<&dyn Fn(&str) -> bool>,
) -> Result<()> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        command_name = command_name,
        output = %String::from_utf8_lossy(&output.stdout),
        "Standard output from command"
    );
    debug!(
        command_name = command_name,
        output = %stderr,
        "Standard error from command",
    );

    if output.status.success() {
        if let Some(is_warning_line) = is_warning_line {
            for line in stderr.lines() {
                if is_warning_line(line) {
                    warn!(command_name = command_name, "{}", line.trim());
                }
            }
        }
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr.trim(),
        ))
    } else {
        Err(anyhow!(
            "{} was terminated by a signal, with error output:\n{}",
            command_name,
            stderr.trim(),
        ))
    }
}

/// Was this I/O error caused by a missing executable?
pub fn is_command_not_found(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::NotFound
}
