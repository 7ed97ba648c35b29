// SPDX-License-Identifier: Apache-2.0

use colored::Colorize;
use exsyn::ExsynError;

/// Exit status for command line misuse (bad flags, unreadable config).
pub const EXIT_USAGE: i32 = 2;

/// Distinct exit statuses so scripts can tell "no network within the bound"
/// apart from a malformed request.
pub fn exit_code_for(error: &ExsynError) -> i32 {
    match error {
        ExsynError::InvalidSpec(_) => EXIT_USAGE,
        ExsynError::SynthesisExhausted { .. } => 3,
        ExsynError::SolverUnavailable(_) => 4,
        ExsynError::InternalInvariantViolation(_) => 70,
    }
}

pub fn report_cli_error_and_exit(
    message: &str,
    subcommand: Option<&str>,
    details: Vec<(&str, &str)>,
) -> ! {
    report_and_exit(message, subcommand, details, EXIT_USAGE)
}

pub fn report_synthesis_error_and_exit(
    error: &ExsynError,
    subcommand: &str,
    details: Vec<(&str, &str)>,
) -> ! {
    report_and_exit(
        &error.to_string(),
        Some(subcommand),
        details,
        exit_code_for(error),
    )
}

fn report_and_exit(
    message: &str,
    subcommand: Option<&str>,
    details: Vec<(&str, &str)>,
    code: i32,
) -> ! {
    let subcommand_str = match subcommand {
        Some(subcommand) => format!("{}: ", subcommand),
        None => String::new(),
    };
    eprintln!("exsyn-driver: {}{}", subcommand_str, message.red().bold());
    for (key, value) in details {
        eprintln!("  {}: {}", key, value);
    }
    std::process::exit(code);
}
