// SPDX-License-Identifier: Apache-2.0

//! Record-oriented synthesis over many functions.
//!
//! Input: one hex truth table per line (optional `0x`); blank lines and lines
//! starting with `#` are skipped. Output: `0x<hex> <expression>` per record
//! that synthesized; records that failed are left out of the output but kept,
//! with their error, in the returned list.

use std::io::{BufRead, Read, Write};

use crate::specification::Specification;
use crate::synth::{synthesize, SynthesisOptions, SynthesisResult};

pub struct BatchRecord {
    /// 1-based line number in the input.
    pub line: usize,
    /// Hex digits as written, without any `0x` prefix.
    pub hex: String,
    pub result: SynthesisResult,
}

impl BatchRecord {
    /// The output line for a successful record.
    pub fn output_line(&self) -> Option<String> {
        self.result
            .as_ref()
            .ok()
            .map(|s| format!("0x{} {}", self.hex, s.expression))
    }
}

/// Extracts `(line number, hex digits)` for every record in `text`.
pub fn parse_records(text: &str) -> Vec<(usize, String)> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let hex = line
                .strip_prefix("0x")
                .or_else(|| line.strip_prefix("0X"))
                .unwrap_or(line);
            Some((i + 1, hex.to_string()))
        })
        .collect()
}

pub fn synthesize_records(text: &str, options: &SynthesisOptions) -> Vec<BatchRecord> {
    parse_records(text)
        .into_iter()
        .map(|(line, hex)| {
            let result = Specification::from_hex(&hex).and_then(|spec| synthesize(&spec, options));
            match &result {
                Ok(s) => log::info!("line {}: 0x{} -> {}", line, hex, s.expression),
                Err(e) => log::warn!("line {}: 0x{}: {}", line, hex, e),
            }
            BatchRecord { line, hex, result }
        })
        .collect()
}

/// Reads all records from `reader`, writes successful ones to `writer`, and
/// returns every record with its result.
pub fn run_batch<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
    options: &SynthesisOptions,
) -> std::io::Result<Vec<BatchRecord>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let records = synthesize_records(&text, options);
    for record in &records {
        if let Some(line) = record.output_line() {
            writeln!(writer, "{}", line)?;
        }
    }
    writer.flush()?;
    Ok(records)
}
