// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use anyhow::Context;
use clap::ArgMatches;
use exsyn::batch::run_batch;

use crate::report_cli_error::report_cli_error_and_exit;
use crate::synth_config::{resolve_options, SynthesisConfig};

fn run(matches: &ArgMatches, config: &Option<SynthesisConfig>) -> anyhow::Result<(usize, usize)> {
    let input_path = matches
        .get_one::<String>("INPUT")
        .context("missing input file")?;
    let options = resolve_options(matches, config).map_err(anyhow::Error::msg)?;

    let input = File::open(input_path)
        .with_context(|| format!("could not open input file {}", input_path))?;
    let reader = BufReader::new(input);
    let writer: Box<dyn Write> = match matches.get_one::<String>("output") {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("could not create output file {}", path))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    let records = run_batch(reader, writer, &options).context("batch synthesis failed")?;
    let succeeded = records.iter().filter(|r| r.result.is_ok()).count();
    Ok((succeeded, records.len()))
}

pub fn handle_batch(matches: &ArgMatches, config: &Option<SynthesisConfig>) {
    match run(matches, config) {
        Ok((succeeded, total)) => {
            log::info!("synthesized {} of {} record(s)", succeeded, total);
            eprintln!("{} of {} record(s) synthesized", succeeded, total);
        }
        Err(e) => report_cli_error_and_exit(&format!("{:#}", e), Some("batch"), vec![]),
    }
}
