// SPDX-License-Identifier: Apache-2.0

//! Command line driver for exact synthesis of implication and majority
//! networks.
//!
//! Commands are given like:
//!
//! ```text
//! exsyn-driver <global-options> <command> <command-args-and-options>
//! ```
//!
//! Commands are:
//!
//! - synth: Finds a minimum-size network for one or more truth tables.
//! - batch: Synthesizes every truth table listed in a file, one per line.
//!
//! Sample usage:
//!
//! ```shell
//! $ cargo run -- synth 0x96 --gate=maj
//! $ cargo run -- synth 0x8 0xe --gate=imply --max_gates=6 --json
//! $ cargo run -- --config=$HOME/exsyn.toml batch functions.txt --output=out.txt
//! ```
//!
//! Settings may also come from an `exsyn.toml` file with a `[synthesis]`
//! table; flags given on the command line take precedence.

mod batch;
mod report_cli_error;
mod synth;
mod synth_config;

use clap::{Arg, ArgAction};
use report_cli_error::report_cli_error_and_exit;

use crate::synth_config::{ExsynConfigFile, SynthesisConfig};

trait AppExt {
    fn add_synthesis_args(self) -> Self;
    fn add_bool_arg(self, long: &'static str, help: &'static str) -> Self;
    fn add_value_arg(self, long: &'static str, value_name: &'static str, help: &'static str)
        -> Self;
}

impl AppExt for clap::Command {
    fn add_bool_arg(self, long: &'static str, help: &'static str) -> Self {
        (self as clap::Command).arg(
            Arg::new(long)
                .long(long)
                .value_name("BOOL")
                .action(ArgAction::Set)
                .value_parser(["true", "false"])
                .num_args(1)
                .help(help),
        )
    }

    fn add_value_arg(
        self,
        long: &'static str,
        value_name: &'static str,
        help: &'static str,
    ) -> Self {
        (self as clap::Command).arg(
            Arg::new(long)
                .long(long)
                .value_name(value_name)
                .help(help)
                .action(ArgAction::Set),
        )
    }

    fn add_synthesis_args(self) -> Self {
        (self as clap::Command)
            .add_value_arg(
                "gate",
                "GATE",
                "Gate family: imply, maj (3-input majority) or majority<k>",
            )
            .add_bool_arg(
                "complemented_edges",
                "Allow inverted gate inputs and outputs (default: true for majority)",
            )
            .add_value_arg("min_gates", "N", "Smallest gate count to try")
            .add_value_arg("max_gates", "N", "Largest gate count to try")
            .add_value_arg("max_levels", "N", "Largest number of levels to try")
            .add_value_arg(
                "level_rule",
                "RULE",
                "Fence shape rule: any or non-increasing",
            )
            .add_bool_arg(
                "symmetry_breaking",
                "Add clauses that prune symmetric solutions",
            )
            .add_bool_arg(
                "require_support_inputs",
                "Require every input the function depends on to be used",
            )
            .add_value_arg(
                "operand_window",
                "LEVELS",
                "Only connect gates to the previous LEVELS levels and the inputs",
            )
            .add_value_arg(
                "parallelism",
                "MODE",
                "sequential, parallel (one worker per CPU) or a worker count",
            )
            .add_value_arg(
                "solver_exe",
                "PATH",
                "External DIMACS SAT solver to run instead of the built-in one",
            )
            .arg(
                Arg::new("solver_arg")
                    .long("solver_arg")
                    .value_name("ARG")
                    .help("Argument passed to the external solver; may be repeated")
                    .allow_hyphen_values(true)
                    .action(ArgAction::Append),
            )
            .add_value_arg(
                "time_budget_ms",
                "MS",
                "Stop after this many milliseconds of search",
            )
            .add_value_arg(
                "max_solver_calls",
                "N",
                "Stop after this many solver calls",
            )
    }
}

fn load_config(path: Option<&String>) -> Option<SynthesisConfig> {
    let path = path?;
    if !std::path::Path::new(path).exists() {
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        report_cli_error_and_exit(
            "config toml file does not exist",
            None,
            vec![("path", path), ("working directory", &cwd)],
        );
    }
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => report_cli_error_and_exit(
            "could not read config toml file",
            None,
            vec![("path", path), ("error", &e.to_string())],
        ),
    };
    match toml::from_str::<ExsynConfigFile>(&text) {
        Ok(file) => Some(file.synthesis),
        Err(e) => report_cli_error_and_exit(
            "could not parse config toml file",
            None,
            vec![("path", path), ("error", &e.to_string())],
        ),
    }
}

fn main() {
    let _ = env_logger::try_init();

    log::info!(
        "exsyn-driver starting; version: {}",
        env!("CARGO_PKG_VERSION")
    );

    let matches = clap::Command::new("exsyn-driver")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Command line driver for exact logic synthesis")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("CONFIG")
                .help("Path to an exsyn.toml file")
                .action(ArgAction::Set),
        )
        .subcommand(clap::Command::new("version").about("Prints the version of the driver"))
        .subcommand(
            clap::Command::new("synth")
                .about("Finds a minimum-size network realizing the given truth tables")
                .arg(
                    Arg::new("FUNCTIONS")
                        .help("Truth tables in hex, e.g. 0xe8; several give a multi-output network")
                        .required(true)
                        .num_args(1..)
                        .action(ArgAction::Append),
                )
                .add_value_arg(
                    "num_vars",
                    "N",
                    "Number of variables, when the hex width is ambiguous",
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Emit the result as JSON")
                        .action(ArgAction::SetTrue),
                )
                .add_synthesis_args(),
        )
        .subcommand(
            clap::Command::new("batch")
                .about("Synthesizes each truth table listed in a file, one per line")
                .arg(
                    Arg::new("INPUT")
                        .help("Input file of hex truth tables")
                        .required(true)
                        .index(1),
                )
                .add_value_arg(
                    "output",
                    "OUTPUT",
                    "Write results here instead of stdout",
                )
                .add_synthesis_args(),
        )
        .get_matches();

    let config = load_config(matches.get_one::<String>("config"));

    if let Some(matches) = matches.subcommand_matches("synth") {
        synth::handle_synth(matches, &config);
    } else if let Some(matches) = matches.subcommand_matches("batch") {
        batch::handle_batch(matches, &config);
    } else if let Some(_matches) = matches.subcommand_matches("version") {
        println!("{}", env!("CARGO_PKG_VERSION"));
    } else {
        report_cli_error_and_exit("No valid subcommand provided.", None, vec![]);
    }
}
