// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::str::FromStr;

use clap::ArgMatches;
use exsyn::fence::LevelRule;
use exsyn::gate::GateKind;
use exsyn::solver::SolverChoice;
use exsyn::synth::{Parallelism, SynthesisOptions};
use serde::Deserialize;

/// The `[synthesis]` table of an `exsyn.toml` file. Every field is optional;
/// command line flags win over values given here.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynthesisConfig {
    /// Gate family, e.g. "imply", "maj" or "majority5".
    pub gate: Option<String>,

    pub complemented_edges: Option<bool>,

    pub min_gates: Option<usize>,
    pub max_gates: Option<usize>,
    pub max_levels: Option<usize>,

    /// "any" or "non-increasing".
    pub level_rule: Option<String>,

    pub symmetry_breaking: Option<bool>,
    pub require_support_inputs: Option<bool>,

    /// Restricts operands to the previous N levels and the inputs.
    pub operand_window: Option<usize>,

    /// "sequential", "parallel" or a worker count.
    pub parallelism: Option<String>,

    /// External DIMACS solver; the built-in solver is used when absent.
    pub solver_exe: Option<String>,
    pub solver_args: Option<Vec<String>>,

    pub time_budget_ms: Option<u64>,
    pub max_solver_calls: Option<usize>,
}

/// Top-level layout of the config file.
#[derive(Debug, Deserialize)]
pub struct ExsynConfigFile {
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

/// Flag value if given, else the config value, parsed with `FromStr`.
fn flag_or_config<T>(
    matches: &ArgMatches,
    id: &str,
    config_value: Option<&String>,
) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text = matches.get_one::<String>(id).or(config_value);
    match text {
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("invalid value {:?} for {}: {}", text, id, e)),
        None => Ok(None),
    }
}

/// Same as `flag_or_config` for settings whose config value is already typed.
fn flag_or_value<T>(
    matches: &ArgMatches,
    id: &str,
    config_value: Option<T>,
) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match matches.get_one::<String>(id) {
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("invalid value {:?} for {}: {}", text, id, e)),
        None => Ok(config_value),
    }
}

/// Builds synthesis options from the defaults, then the config file, then the
/// command line flags.
pub fn resolve_options(
    matches: &ArgMatches,
    config: &Option<SynthesisConfig>,
) -> Result<SynthesisOptions, String> {
    let empty = SynthesisConfig::default();
    let config = config.as_ref().unwrap_or(&empty);
    let mut options = SynthesisOptions::default();

    if let Some(gate) = flag_or_config::<GateKind>(matches, "gate", config.gate.as_ref())? {
        options.gate = gate;
    }
    if let Some(v) = flag_or_value(matches, "complemented_edges", config.complemented_edges)? {
        options.complemented_edges = Some(v);
    }
    if let Some(v) = flag_or_value(matches, "min_gates", config.min_gates)? {
        options.min_gates = v;
    }
    if let Some(v) = flag_or_value(matches, "max_gates", config.max_gates)? {
        options.max_gates = v;
    }
    if let Some(v) = flag_or_value(matches, "max_levels", config.max_levels)? {
        options.max_levels = Some(v);
    }
    if let Some(rule) =
        flag_or_config::<LevelRule>(matches, "level_rule", config.level_rule.as_ref())?
    {
        options.level_rule = rule;
    }
    if let Some(v) = flag_or_value(matches, "symmetry_breaking", config.symmetry_breaking)? {
        options.symmetry_breaking = v;
    }
    if let Some(v) = flag_or_value(
        matches,
        "require_support_inputs",
        config.require_support_inputs,
    )? {
        options.require_support_inputs = v;
    }
    if let Some(v) = flag_or_value(matches, "operand_window", config.operand_window)? {
        options.operand_window = Some(v);
    }
    if let Some(p) =
        flag_or_config::<Parallelism>(matches, "parallelism", config.parallelism.as_ref())?
    {
        options.parallelism = p;
    }
    if let Some(v) = flag_or_value(matches, "time_budget_ms", config.time_budget_ms)? {
        options.time_budget_ms = Some(v);
    }
    if let Some(v) = flag_or_value(matches, "max_solver_calls", config.max_solver_calls)? {
        options.max_solver_calls = Some(v);
    }

    let solver_exe = matches
        .get_one::<String>("solver_exe")
        .or(config.solver_exe.as_ref());
    if let Some(executable) = solver_exe {
        let flag_args: Vec<String> = matches
            .get_many::<String>("solver_arg")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let args = if flag_args.is_empty() {
            config.solver_args.clone().unwrap_or_default()
        } else {
            flag_args
        };
        options.solver = SolverChoice::Dimacs {
            executable: PathBuf::from(executable),
            args,
        };
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction};
    use pretty_assertions::assert_eq;

    fn command() -> clap::Command {
        let mut command = clap::Command::new("test");
        for id in [
            "gate",
            "complemented_edges",
            "min_gates",
            "max_gates",
            "max_levels",
            "level_rule",
            "symmetry_breaking",
            "require_support_inputs",
            "operand_window",
            "parallelism",
            "time_budget_ms",
            "max_solver_calls",
            "solver_exe",
        ] {
            command = command.arg(Arg::new(id).long(id).action(ArgAction::Set));
        }
        command.arg(
            Arg::new("solver_arg")
                .long("solver_arg")
                .action(ArgAction::Append)
                .allow_hyphen_values(true),
        )
    }

    #[test]
    fn test_defaults_without_flags_or_config() {
        let matches = command().get_matches_from(["test"]);
        let options = resolve_options(&matches, &None).unwrap();
        assert_eq!(options, SynthesisOptions::default());
    }

    #[test]
    fn test_flag_overrides_config() {
        let config: ExsynConfigFile = toml::from_str(
            r#"
[synthesis]
gate = "maj"
max_gates = 5
parallelism = "parallel"
solver_exe = "/usr/bin/kissat"
solver_args = ["-q"]
"#,
        )
        .unwrap();
        let matches = command().get_matches_from(["test", "--max_gates", "3"]);
        let options = resolve_options(&matches, &Some(config.synthesis)).unwrap();
        assert_eq!(options.gate, GateKind::majority3());
        assert_eq!(options.max_gates, 3);
        assert_eq!(options.parallelism, Parallelism::Threads(0));
        assert_eq!(
            options.solver,
            SolverChoice::Dimacs {
                executable: PathBuf::from("/usr/bin/kissat"),
                args: vec!["-q".to_string()],
            }
        );
    }

    #[test]
    fn test_bad_flag_value_is_reported() {
        let matches = command().get_matches_from(["test", "--level_rule", "sideways"]);
        let err = resolve_options(&matches, &None).unwrap_err();
        assert!(err.contains("level_rule"), "{}", err);
    }

    #[test]
    fn test_unknown_config_key_is_rejected() {
        let result: Result<ExsynConfigFile, _> = toml::from_str("[synthesis]\nmax_nodes = 3\n");
        assert!(result.is_err());
    }
}
