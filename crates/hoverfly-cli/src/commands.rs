use anyhow::{anyhow, Context, Result};
use hoverfly_harness::{Directive, Harness, Outcome};
use std::process::{Command, ExitCode, ExitStatus};

use crate::output::output_status;

fn child(command: &[String]) -> Result<Command> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("No command given"))?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        // Killed by a signal
        None => ExitCode::FAILURE,
    }
}

/// Run `command` with the instance's connection variables set, so harnesses
/// inside it use this instance instead of starting their own
pub fn serve(harness: &Harness, command: &[String]) -> Result<ExitCode> {
    tracing::debug!(?command, admin = %harness.instance().admin_endpoint(), "running command");
    let status = child(command)?
        .envs(harness.instance().connection_env())
        .status()
        .with_context(|| format!("Failed to run {}", command[0]))?;

    output_status(command, &status);
    Ok(exit_code(status))
}

/// Run `command` inside a record or replay session. The child inherits the
/// proxy environment.
pub fn session(harness: &Harness, directive: &Directive, command: &[String]) -> Result<ExitCode> {
    let mut cmd = child(command)?;
    let active = harness.open(directive)?;
    tracing::debug!(?command, simulation = %directive.file_name(), "running command in session");

    let status = cmd.status();
    let call_failed = !matches!(&status, Ok(s) if s.success());
    active.on_outcome(Outcome {
        setup_passed: true,
        call_failed,
    });
    active.finish()?;

    let status = status.with_context(|| format!("Failed to run {}", command[0]))?;
    output_status(command, &status);
    Ok(exit_code(status))
}
