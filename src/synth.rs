// SPDX-License-Identifier: Apache-2.0

//! Exact synthesis: enumerate fences, encode, solve, decode.
//!
//! `SynthesisDriver` is an explicit state machine so callers (and tests) can
//! observe each transition; `synthesize` runs one to completion with the
//! configured backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::decoder::{decode, Decoded};
use crate::encoder::{encode, EncoderOptions, Encoding, MAX_ENCODED_VARS};
use crate::exsyn_error::{ExhaustReason, ExsynError};
use crate::expression::to_expression;
use crate::fence::{fences_with_gates, Fence, FenceEnumerator, FenceOptions, LevelRule};
use crate::gate::{GateKind, Signal};
use crate::node_store::NodeStore;
use crate::solver::{CancelToken, SatBackend, SatOutcome, SolverChoice};
use crate::specification::Specification;
use crate::truth_table::TruthTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelism {
    #[default]
    Sequential,
    /// Worker count; 0 means one per CPU.
    Threads(usize),
}

impl std::str::FromStr for Parallelism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Parallelism::Sequential),
            "parallel" => Ok(Parallelism::Threads(0)),
            _ => s
                .parse::<usize>()
                .map(Parallelism::Threads)
                .map_err(|_| {
                    format!(
                        "invalid parallelism {:?}; expected sequential, parallel or a thread count",
                        s
                    )
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisOptions {
    pub gate: GateKind,
    /// Defaults to off for implication and on for majority.
    pub complemented_edges: Option<bool>,
    pub min_gates: usize,
    pub max_gates: usize,
    pub max_levels: Option<usize>,
    pub level_rule: LevelRule,
    pub symmetry_breaking: bool,
    pub require_support_inputs: bool,
    pub operand_window: Option<usize>,
    pub parallelism: Parallelism,
    pub solver: SolverChoice,
    pub time_budget_ms: Option<u64>,
    pub max_solver_calls: Option<usize>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            gate: GateKind::Imply,
            complemented_edges: None,
            min_gates: 1,
            max_gates: 8,
            max_levels: None,
            level_rule: LevelRule::Any,
            symmetry_breaking: true,
            require_support_inputs: true,
            operand_window: None,
            parallelism: Parallelism::Sequential,
            solver: SolverChoice::Varisat,
            time_budget_ms: None,
            max_solver_calls: None,
        }
    }
}

impl SynthesisOptions {
    pub fn complemented_edges(&self) -> bool {
        self.complemented_edges
            .unwrap_or(matches!(self.gate, GateKind::Majority { .. }))
    }

    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            gate: self.gate,
            complemented_edges: self.complemented_edges(),
            symmetry_breaking: self.symmetry_breaking,
            require_support_inputs: self.require_support_inputs,
            operand_window: self.operand_window,
        }
    }

    pub fn fence_options(&self, num_outputs: usize) -> FenceOptions {
        FenceOptions {
            min_gates: self.min_gates,
            max_gates: self.max_gates,
            max_levels: self.max_levels,
            num_outputs,
            arity: self.gate.arity(),
            rule: self.level_rule,
        }
    }
}

/// A successful run. `fence` is `None` for networks without gates.
#[derive(Debug, Clone)]
pub struct Synthesized {
    pub network: NodeStore,
    pub expression: String,
    pub fence: Option<Fence>,
    /// The (possibly extended) specification the network realizes.
    pub spec: Specification,
    pub fences_tried: usize,
    pub solver_calls: usize,
}

pub type SynthesisResult = Result<Synthesized, ExsynError>;

/// Observable phase of a `SynthesisDriver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enumerating,
    Encoding,
    Solving,
    Decoding,
    Succeeded,
    ExhaustedFailed,
}

enum State {
    Enumerating,
    Encoding(Fence),
    Solving(Box<Encoding>),
    Decoding(Box<Encoding>, Vec<bool>),
    Succeeded(Box<Synthesized>),
    ExhaustedFailed(ExhaustReason),
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Enumerating => Phase::Enumerating,
            State::Encoding(_) => Phase::Encoding,
            State::Solving(_) => Phase::Solving,
            State::Decoding(..) => Phase::Decoding,
            State::Succeeded(_) => Phase::Succeeded,
            State::ExhaustedFailed(_) => Phase::ExhaustedFailed,
        }
    }
}

pub struct SynthesisDriver {
    spec: Specification,
    options: SynthesisOptions,
    encoder_options: EncoderOptions,
    backend: Arc<dyn SatBackend>,
    cancel: CancelToken,
    fences: FenceEnumerator,
    state: State,
    started: Instant,
    fences_tried: usize,
    solver_calls: usize,
}

impl SynthesisDriver {
    /// Validates the request, extends the specification to the gate's
    /// minimum arity, and settles gate-free targets immediately.
    pub fn new(
        spec: &Specification,
        options: &SynthesisOptions,
        backend: Arc<dyn SatBackend>,
        cancel: CancelToken,
    ) -> Result<Self, ExsynError> {
        options.gate.validate().map_err(ExsynError::InvalidSpec)?;
        if spec.num_vars() > MAX_ENCODED_VARS {
            return Err(ExsynError::InvalidSpec(format!(
                "{} variables exceeds the supported maximum of {}",
                spec.num_vars(),
                MAX_ENCODED_VARS
            )));
        }
        let spec = spec.extend_to_min(options.gate.min_spec_vars());
        let fences = FenceEnumerator::new(options.fence_options(spec.num_outputs()));
        let mut driver = Self {
            encoder_options: options.encoder_options(),
            options: options.clone(),
            backend,
            cancel,
            fences,
            state: State::Enumerating,
            started: Instant::now(),
            fences_tried: 0,
            solver_calls: 0,
            spec,
        };
        if let Some(network) = gate_free_network(&driver.spec, &driver.options) {
            log::info!("{} needs no gates", driver.spec);
            driver.state = State::Succeeded(Box::new(Synthesized {
                expression: to_expression(&network),
                network,
                fence: None,
                spec: driver.spec.clone(),
                fences_tried: 0,
                solver_calls: 0,
            }));
        }
        Ok(driver)
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase(), Phase::Succeeded | Phase::ExhaustedFailed)
    }

    pub fn spec(&self) -> &Specification {
        &self.spec
    }

    pub fn fences_tried(&self) -> usize {
        self.fences_tried
    }

    pub fn solver_calls(&self) -> usize {
        self.solver_calls
    }

    fn budget_exhausted(&self) -> bool {
        if let Some(ms) = self.options.time_budget_ms {
            if self.started.elapsed() >= Duration::from_millis(ms) {
                return true;
            }
        }
        matches!(self.options.max_solver_calls, Some(max) if self.solver_calls >= max)
    }

    /// Advances one transition. Terminal states are left unchanged.
    pub fn step(&mut self) -> Result<Phase, ExsynError> {
        let state = std::mem::replace(&mut self.state, State::Enumerating);
        let before = state.phase();
        self.state = match state {
            State::Enumerating => {
                if self.cancel.is_cancelled() {
                    State::ExhaustedFailed(ExhaustReason::Cancelled)
                } else if self.budget_exhausted() {
                    State::ExhaustedFailed(ExhaustReason::Budget)
                } else {
                    match self.fences.next() {
                        Some(fence) => State::Encoding(fence),
                        None => State::ExhaustedFailed(ExhaustReason::FenceBound),
                    }
                }
            }
            State::Encoding(fence) => {
                self.fences_tried += 1;
                log::info!("trying fence {} ({} gates)", fence, fence.num_gates());
                State::Solving(Box::new(encode(&fence, &self.spec, &self.encoder_options)?))
            }
            State::Solving(encoding) => {
                self.solver_calls += 1;
                match self.backend.solve(&encoding.cnf, &self.cancel)? {
                    SatOutcome::Sat(model) => State::Decoding(encoding, model),
                    SatOutcome::Unsat => {
                        log::info!("fence {} is UNSAT", encoding.fence);
                        State::Enumerating
                    }
                    SatOutcome::Interrupted => State::ExhaustedFailed(ExhaustReason::Cancelled),
                }
            }
            State::Decoding(encoding, model) => {
                let Decoded {
                    network,
                    expression,
                } = decode(&encoding, &model, &self.spec)?;
                log::info!(
                    "fence {} is SAT: {} ({} gates)",
                    encoding.fence,
                    expression,
                    network.num_gates()
                );
                State::Succeeded(Box::new(Synthesized {
                    network,
                    expression,
                    fence: Some(encoding.fence.clone()),
                    spec: self.spec.clone(),
                    fences_tried: self.fences_tried,
                    solver_calls: self.solver_calls,
                }))
            }
            terminal @ (State::Succeeded(_) | State::ExhaustedFailed(_)) => terminal,
        };
        let after = self.state.phase();
        if before != after {
            log::debug!("{:?} -> {:?}", before, after);
        }
        Ok(after)
    }

    /// Steps to a terminal state.
    pub fn run(mut self) -> SynthesisResult {
        while !self.is_terminal() {
            self.step()?;
        }
        self.into_result()
    }

    fn into_result(self) -> SynthesisResult {
        match self.state {
            State::Succeeded(result) => Ok(*result),
            State::ExhaustedFailed(reason) => {
                log::info!(
                    "{}: no network after {} fence(s) ({})",
                    self.spec,
                    self.fences_tried,
                    reason
                );
                Err(ExsynError::SynthesisExhausted {
                    fences_tried: self.fences_tried,
                    reason,
                })
            }
            _ => Err(ExsynError::InternalInvariantViolation(
                "synthesis stopped in a non-terminal state".to_string(),
            )),
        }
    }

    /// Runs the fences of each size class on a pool of scoped threads. Size
    /// classes go in increasing order, so the first class with a SAT fence
    /// yields a minimum network.
    pub fn run_parallel(mut self, threads: usize) -> SynthesisResult {
        if self.is_terminal() {
            return self.into_result();
        }
        let thread_cnt = if threads == 0 { num_cpus::get() } else { threads };
        let fence_options = self.options.fence_options(self.spec.num_outputs());
        let first = fence_options.min_gates.max(fence_options.num_outputs).max(1);
        for num_gates in first..=fence_options.max_gates {
            if self.cancel.is_cancelled() {
                self.state = State::ExhaustedFailed(ExhaustReason::Cancelled);
                return self.into_result();
            }
            if self.budget_exhausted() {
                self.state = State::ExhaustedFailed(ExhaustReason::Budget);
                return self.into_result();
            }
            let wave = fences_with_gates(num_gates, &fence_options);
            if wave.is_empty() {
                continue;
            }
            log::info!(
                "size class {}: {} fence(s) on {} thread(s)",
                num_gates,
                wave.len(),
                thread_cnt.min(wave.len())
            );
            match self.run_wave(&wave, thread_cnt)? {
                WaveOutcome::Found(result) => {
                    self.state = State::Succeeded(result);
                    return self.into_result();
                }
                WaveOutcome::AllUnsat => {}
                WaveOutcome::Stopped(reason) => {
                    self.state = State::ExhaustedFailed(reason);
                    return self.into_result();
                }
            }
        }
        self.state = State::ExhaustedFailed(ExhaustReason::FenceBound);
        self.into_result()
    }

    fn run_wave(&mut self, wave: &[Fence], thread_cnt: usize) -> Result<WaveOutcome, ExsynError> {
        let found = CancelToken::new();
        let winner: Mutex<Option<Box<Synthesized>>> = Mutex::new(None);
        let failure: Mutex<Option<ExsynError>> = Mutex::new(None);
        let stopped: Mutex<Option<ExhaustReason>> = Mutex::new(None);
        let next_fence = AtomicUsize::new(0);
        let tried = AtomicUsize::new(self.fences_tried);
        let calls = AtomicUsize::new(self.solver_calls);
        let workers = thread_cnt.min(wave.len()).max(1);

        let this = &*self;
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                handles.push(scope.spawn(|| {
                    loop {
                        if found.is_cancelled() {
                            break;
                        }
                        if this.cancel.is_cancelled() {
                            record_first(&stopped, ExhaustReason::Cancelled);
                            found.cancel();
                            break;
                        }
                        let over_time = this
                            .options
                            .time_budget_ms
                            .map_or(false, |ms| this.started.elapsed() >= Duration::from_millis(ms));
                        let over_calls = this
                            .options
                            .max_solver_calls
                            .map_or(false, |max| calls.load(Ordering::SeqCst) >= max);
                        if over_time || over_calls {
                            record_first(&stopped, ExhaustReason::Budget);
                            found.cancel();
                            break;
                        }
                        let idx = next_fence.fetch_add(1, Ordering::SeqCst);
                        if idx >= wave.len() {
                            break;
                        }
                        let fence = &wave[idx];
                        let attempt = tried.fetch_add(1, Ordering::SeqCst) + 1;
                        log::info!("trying fence {} ({} gates)", fence, fence.num_gates());
                        let outcome = encode(fence, &this.spec, &this.encoder_options).and_then(
                            |encoding| {
                                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                                let outcome = this.backend.solve(&encoding.cnf, &found)?;
                                Ok((encoding, outcome, call))
                            },
                        );
                        match outcome {
                            Ok((encoding, SatOutcome::Sat(model), call)) => {
                                match decode(&encoding, &model, &this.spec) {
                                    Ok(Decoded {
                                        network,
                                        expression,
                                    }) => {
                                        let mut slot =
                                            winner.lock().unwrap_or_else(PoisonError::into_inner);
                                        if slot.is_none() {
                                            log::info!(
                                                "fence {} is SAT: {}",
                                                encoding.fence,
                                                expression
                                            );
                                            *slot = Some(Box::new(Synthesized {
                                                network,
                                                expression,
                                                fence: Some(encoding.fence.clone()),
                                                spec: this.spec.clone(),
                                                fences_tried: attempt,
                                                solver_calls: call,
                                            }));
                                        }
                                        found.cancel();
                                    }
                                    Err(e) => {
                                        record_first(&failure, e);
                                        found.cancel();
                                    }
                                }
                                break;
                            }
                            Ok((encoding, SatOutcome::Unsat, _)) => {
                                log::info!("fence {} is UNSAT", encoding.fence);
                            }
                            // Another worker won or the caller cancelled.
                            Ok((_, SatOutcome::Interrupted, _)) => {}
                            Err(e) => {
                                record_first(&failure, e);
                                found.cancel();
                                break;
                            }
                        }
                    }
                }));
            }
            // Forward caller cancellation into in-flight solver calls.
            while handles.iter().any(|h| !h.is_finished()) {
                if this.cancel.is_cancelled() {
                    found.cancel();
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        self.fences_tried = tried.load(Ordering::SeqCst);
        self.solver_calls = calls.load(Ordering::SeqCst);
        if let Some(result) = winner.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Ok(WaveOutcome::Found(result));
        }
        if let Some(e) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(e);
        }
        if self.cancel.is_cancelled() {
            return Ok(WaveOutcome::Stopped(ExhaustReason::Cancelled));
        }
        if let Some(reason) = stopped.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Ok(WaveOutcome::Stopped(reason));
        }
        Ok(WaveOutcome::AllUnsat)
    }
}

enum WaveOutcome {
    Found(Box<Synthesized>),
    AllUnsat,
    Stopped(ExhaustReason),
}

fn record_first<T>(slot: &Mutex<Option<T>>, value: T) {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_none() {
        *guard = Some(value);
    }
}

/// Builds the network directly when every output is a constant or a
/// (possibly complemented) primary input.
fn gate_free_network(spec: &Specification, options: &SynthesisOptions) -> Option<NodeStore> {
    let n = spec.num_vars();
    let complemented = options.complemented_edges();
    let mut store = NodeStore::new(options.gate);
    let inputs: Vec<Signal> = (0..n).map(|_| store.create_primary_input()).collect();
    let mut outputs: Vec<Signal> = Vec::with_capacity(spec.num_outputs());
    for function in spec.functions() {
        let signal = if function.is_const0() {
            store.get_constant(false)
        } else if function.is_const1() {
            store.get_constant(true)
        } else {
            let support = function.support();
            if support.len() != 1 {
                return None;
            }
            let i = support[0];
            let var = TruthTable::var(n, i);
            if *function == var {
                inputs[i]
            } else if complemented && *function == var.not() {
                !inputs[i]
            } else {
                return None;
            }
        };
        outputs.push(signal);
    }
    for signal in outputs {
        store.create_output(signal);
    }
    Some(store)
}

/// Synthesizes `spec` with the backend named in `options`.
pub fn synthesize(spec: &Specification, options: &SynthesisOptions) -> SynthesisResult {
    synthesize_with(spec, options, options.solver.backend(), CancelToken::new())
}

pub fn synthesize_with(
    spec: &Specification,
    options: &SynthesisOptions,
    backend: Arc<dyn SatBackend>,
    cancel: CancelToken,
) -> SynthesisResult {
    let driver = SynthesisDriver::new(spec, options, backend, cancel)?;
    match options.parallelism {
        Parallelism::Sequential => driver.run(),
        Parallelism::Threads(threads) => driver.run_parallel(threads),
    }
}
