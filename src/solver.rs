// SPDX-License-Identifier: Apache-2.0

//! Boundary to the SAT solver.
//!
//! Every backend takes a `Cnf` over variables `1..=V` and answers UNSAT or SAT
//! with a total model. The in-process backend uses varisat; the process
//! backend hands a DIMACS file to any solver binary that prints the usual
//! `s SATISFIABLE` / `v ...` lines.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use varisat::ExtendFormula;

use crate::encoder::Cnf;
use crate::exsyn_error::ExsynError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatOutcome {
    Unsat,
    /// `model[i]` is the value of variable `i + 1`.
    Sat(Vec<bool>),
    /// The cancellation token fired while the call was in flight.
    Interrupted,
}

/// Shared cancellation flag; clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub trait SatBackend: Send + Sync {
    fn name(&self) -> String;

    /// Decides `cnf`. Backends that can stop mid-call check `cancel` and
    /// return `SatOutcome::Interrupted`; others run to completion.
    fn solve(&self, cnf: &Cnf, cancel: &CancelToken) -> Result<SatOutcome, ExsynError>;
}

/// In-process varisat solver; a fresh instance per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarisatBackend;

impl SatBackend for VarisatBackend {
    fn name(&self) -> String {
        "varisat".to_string()
    }

    fn solve(&self, cnf: &Cnf, cancel: &CancelToken) -> Result<SatOutcome, ExsynError> {
        if cancel.is_cancelled() {
            return Ok(SatOutcome::Interrupted);
        }
        let mut solver = varisat::Solver::new();
        for clause in cnf.clauses() {
            solver.add_clause(clause);
        }
        match solver.solve() {
            Ok(true) => {
                let model = solver.model().ok_or_else(|| {
                    ExsynError::SolverUnavailable("varisat reported SAT without a model".to_string())
                })?;
                // Variables that occur in no clause are absent; they default to false.
                let mut values = vec![false; cnf.num_vars()];
                for lit in model {
                    if lit.index() < values.len() {
                        values[lit.index()] = lit.is_positive();
                    }
                }
                Ok(SatOutcome::Sat(values))
            }
            Ok(false) => Ok(SatOutcome::Unsat),
            Err(e) => Err(ExsynError::SolverUnavailable(format!("varisat: {:?}", e))),
        }
    }
}

/// External solver process fed a temporary DIMACS file.
#[derive(Debug, Clone)]
pub struct DimacsProcessBackend {
    pub executable: PathBuf,
    /// Passed before the DIMACS path.
    pub args: Vec<String>,
    pub poll_interval: Duration,
}

impl DimacsProcessBackend {
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            poll_interval: Duration::from_millis(10),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl SatBackend for DimacsProcessBackend {
    fn name(&self) -> String {
        self.executable.display().to_string()
    }

    fn solve(&self, cnf: &Cnf, cancel: &CancelToken) -> Result<SatOutcome, ExsynError> {
        let unavailable =
            |what: String| ExsynError::SolverUnavailable(format!("{}: {}", self.name(), what));
        let mut dimacs = tempfile::Builder::new()
            .prefix("exsyn-")
            .suffix(".cnf")
            .tempfile()
            .map_err(|e| unavailable(format!("failed to create temp file: {}", e)))?;
        dimacs
            .write_all(cnf.to_dimacs().as_bytes())
            .and_then(|_| dimacs.flush())
            .map_err(|e| unavailable(format!("failed to write temp file: {}", e)))?;

        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .arg(dimacs.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| unavailable(format!("spawn failed: {}", e)))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| unavailable("no stdout pipe".to_string()))?;
        // Drain stdout concurrently so a chatty solver cannot block on a full
        // pipe while we poll.
        let reader = std::thread::spawn(move || {
            let mut text = String::new();
            stdout.read_to_string(&mut text).map(|_| text)
        });

        loop {
            match child.try_wait() {
                Ok(Some(_status)) => break,
                Ok(None) => {}
                Err(e) => return Err(unavailable(format!("wait failed: {}", e))),
            }
            if cancel.is_cancelled() {
                log::debug!("killing {} after cancellation", self.name());
                let _ = child.kill();
                let _ = child.wait();
                // Descendants of the solver may still hold the pipe open; the
                // reader is left to finish on its own.
                drop(reader);
                return Ok(SatOutcome::Interrupted);
            }
            std::thread::sleep(self.poll_interval);
        }
        let text = reader
            .join()
            .map_err(|_| unavailable("stdout reader panicked".to_string()))?
            .map_err(|e| unavailable(format!("failed to read output: {}", e)))?;
        parse_solver_output(&text, cnf.num_vars()).map_err(unavailable)
    }
}

/// Which backend a synthesis run uses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverChoice {
    #[default]
    Varisat,
    /// External DIMACS solver; `args` go before the instance path.
    Dimacs {
        executable: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl SolverChoice {
    pub fn backend(&self) -> Arc<dyn SatBackend> {
        match self {
            SolverChoice::Varisat => Arc::new(VarisatBackend),
            SolverChoice::Dimacs { executable, args } => {
                Arc::new(DimacsProcessBackend::new(executable.clone()).with_args(args.clone()))
            }
        }
    }
}

/// Parses SAT-competition output: an `s` status line plus `v` value lines
/// terminated by `0`. Variables the solver does not mention are false.
pub fn parse_solver_output(text: &str, num_vars: usize) -> Result<SatOutcome, String> {
    let mut status: Option<bool> = None;
    let mut values = vec![false; num_vars];
    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("s ") {
            status = match rest.trim() {
                "SATISFIABLE" => Some(true),
                "UNSATISFIABLE" => Some(false),
                other => return Err(format!("unexpected status {:?}", other)),
            };
        } else if let Some(rest) = line.strip_prefix("v ") {
            for token in rest.split_whitespace() {
                let lit: i64 = token
                    .parse()
                    .map_err(|_| format!("bad literal {:?} in value line", token))?;
                if lit == 0 {
                    continue;
                }
                let index = (lit.unsigned_abs() as usize) - 1;
                if index >= num_vars {
                    return Err(format!(
                        "literal {} outside the {} instance variables",
                        lit, num_vars
                    ));
                }
                values[index] = lit > 0;
            }
        }
    }
    match status {
        Some(true) => Ok(SatOutcome::Sat(values)),
        Some(false) => Ok(SatOutcome::Unsat),
        None => Err("no status line in solver output".to_string()),
    }
}
