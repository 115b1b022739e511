use colored::Colorize;
use std::process::ExitStatus;

pub fn output_error(err: &anyhow::Error) {
    eprintln!("{}: {:#}", "Error".red().bold(), err);
}

pub fn output_status(command: &[String], status: &ExitStatus) {
    let name = command.first().map(String::as_str).unwrap_or("command");
    if status.success() {
        eprintln!("{} {}", name.cyan(), "finished".green());
    } else {
        eprintln!("{} {} ({})", name.cyan(), "failed".red().bold(), status);
    }
}
