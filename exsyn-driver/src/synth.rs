// SPDX-License-Identifier: Apache-2.0

use clap::ArgMatches;
use exsyn::solver::CancelToken;
use exsyn::specification::Specification;
use exsyn::synth::{synthesize_with, Synthesized};
use exsyn::truth_table::TruthTable;
use exsyn::ExsynError;
use serde_json::json;

use crate::report_cli_error::{report_cli_error_and_exit, report_synthesis_error_and_exit};
use crate::synth_config::{resolve_options, SynthesisConfig};

/// Parses the positional truth tables; all of them must agree on the number
/// of variables.
fn parse_functions(texts: &[String], num_vars: Option<usize>) -> Result<Specification, ExsynError> {
    let functions = texts
        .iter()
        .map(|text| match num_vars {
            Some(n) => TruthTable::from_hex_with_vars(n, text),
            None => TruthTable::from_hex(text),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Specification::new(functions)
}

pub fn result_to_json(result: &Synthesized) -> serde_json::Value {
    json!({
        "spec": result.spec.functions().iter().map(|t| format!("0x{}", t.to_hex())).collect::<Vec<_>>(),
        "expression": result.expression,
        "gates": result.network.num_gates(),
        "fence": result.fence.as_ref().map(|f| f.levels().to_vec()),
        "fences_tried": result.fences_tried,
        "solver_calls": result.solver_calls,
        "network": result.network.to_string(),
    })
}

/// Forwards Ctrl-C to the search so it stops between solver calls.
pub fn install_interrupt_handler(cancel: &CancelToken) {
    let token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        log::warn!("could not install Ctrl-C handler: {}", e);
    }
}

pub fn handle_synth(matches: &ArgMatches, config: &Option<SynthesisConfig>) {
    let texts: Vec<String> = matches
        .get_many::<String>("FUNCTIONS")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let num_vars = match matches.get_one::<String>("num_vars") {
        Some(s) => match s.parse::<usize>() {
            Ok(n) => Some(n),
            Err(e) => report_cli_error_and_exit(
                "invalid --num_vars",
                Some("synth"),
                vec![("value", s), ("error", &e.to_string())],
            ),
        },
        None => None,
    };
    let options = match resolve_options(matches, config) {
        Ok(options) => options,
        Err(e) => report_cli_error_and_exit(&e, Some("synth"), vec![]),
    };
    let spec = match parse_functions(&texts, num_vars) {
        Ok(spec) => spec,
        Err(e) => report_synthesis_error_and_exit(&e, "synth", vec![("input", &texts.join(" "))]),
    };
    log::info!("synthesizing {} with {:?}", spec, options);

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);
    let result = match synthesize_with(&spec, &options, options.solver.backend(), cancel) {
        Ok(result) => result,
        Err(e) => report_synthesis_error_and_exit(&e, "synth", vec![("spec", &spec.to_string())]),
    };

    if matches.get_flag("json") {
        println!("{}", result_to_json(&result));
    } else {
        println!("{}", result.expression);
        log::info!(
            "{} gate(s); tried {} fence(s) with {} solver call(s)",
            result.network.num_gates(),
            result.fences_tried,
            result.solver_calls
        );
    }
}
