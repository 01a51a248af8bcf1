//! Blocking invocation of the external programs the jobs delegate to.

use std::io;
use std::process::{Command, ExitStatus};

use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Run `command` to completion, failing on a non-zero exit.
///
/// Standard output is discarded; standard error is kept for the error
/// message.
pub fn run(command: &mut Command) -> Result<(), CommandError> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!("Running {:?}", command);

    let output = command.output().map_err(|source| CommandError::Spawn {
        program: program.clone(),
        source,
    })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    warn!("{} exited with {}", program, output.status);
    Err(CommandError::Failed {
        program,
        status: output.status,
        stderr,
    })
}
