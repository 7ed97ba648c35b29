// SPDX-License-Identifier: Apache-2.0

//! Encodes "does this fence realize the specification" as CNF.
//!
//! Signals are numbered `0` (the constant), `1..=n` (primary inputs), then
//! `n + 1 + g` for gate `g` in fence order. Each gate child picks exactly one
//! earlier signal through selector variables; per truth-table row the gate has
//! one output variable and one operand variable per child, and selection
//! forces the operand to the picked signal's value (XOR the edge polarity
//! when complemented edges are enabled).
//!
//! Variables are allocated in a fixed order: all selectors (gate, child,
//! choice), then edge polarities (gate, child), then output polarities, then
//! the function block (gate, row: output variable followed by operands).
//! Clauses are emitted in a fixed order as well, so encoding the same inputs
//! twice yields byte-identical DIMACS.

use std::fmt::Write;

use varisat::Lit;

use crate::exsyn_error::ExsynError;
use crate::fence::Fence;
use crate::gate::GateKind;
use crate::specification::Specification;

/// Largest variable count the encoder accepts; each gate carries one output
/// variable per truth-table row.
pub const MAX_ENCODED_VARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    pub gate: GateKind,
    /// Adds a polarity variable per gate child and per output.
    pub complemented_edges: bool,
    pub symmetry_breaking: bool,
    /// Every primary input the target depends on must be read by some gate.
    pub require_support_inputs: bool,
    /// Gates may only read signals from the last `w` levels below them
    /// (primary inputs and the constant sit on level 0).
    pub operand_window: Option<usize>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            gate: GateKind::Imply,
            complemented_edges: false,
            symmetry_breaking: true,
            require_support_inputs: true,
            operand_window: None,
        }
    }
}

/// A clausal instance over variables `1..=num_vars`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cnf {
    num_vars: usize,
    clauses: Vec<Vec<Lit>>,
}

impl Cnf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next variable and returns its positive literal.
    pub fn new_lit(&mut self) -> Lit {
        self.num_vars += 1;
        Lit::from_dimacs(self.num_vars as isize)
    }

    pub fn add_clause(&mut self, lits: &[Lit]) {
        debug_assert!(
            lits.iter().all(|l| l.index() < self.num_vars),
            "clause {:?} references an unallocated variable",
            lits
        );
        self.clauses.push(lits.to_vec());
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> &[Vec<Lit>] {
        &self.clauses
    }

    pub fn to_dimacs(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "p cnf {} {}", self.num_vars, self.clauses.len());
        for clause in &self.clauses {
            for lit in clause {
                let _ = write!(s, "{} ", lit.to_dimacs());
            }
            s.push_str("0\n");
        }
        s
    }
}

/// Value of `lit` under a model indexed by variable (`model[i]` is variable
/// `i + 1`).
pub fn lit_value(model: &[bool], lit: Lit) -> bool {
    model[lit.index()] == lit.is_positive()
}

/// Variables of one fence gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateVars {
    pub level: usize,
    /// Signal indices this gate's children may select, ascending.
    pub choices: Vec<usize>,
    /// `select[child][k]` selects `choices[k]` for `child`.
    pub select: Vec<Vec<Lit>>,
    /// Edge polarity per child, when complemented edges are enabled.
    pub polarity: Vec<Option<Lit>>,
    /// Gate output per row.
    pub output: Vec<Lit>,
    /// `operands[row][child]`.
    pub operands: Vec<Vec<Lit>>,
}

/// The CNF together with the variable map the decoder needs.
#[derive(Debug, Clone)]
pub struct Encoding {
    pub cnf: Cnf,
    pub fence: Fence,
    pub gate: GateKind,
    pub num_inputs: usize,
    pub gates: Vec<GateVars>,
    /// Polarity of each output (top-level gate), when complemented edges are
    /// enabled.
    pub output_polarity: Vec<Option<Lit>>,
}

impl Encoding {
    /// Signal index of gate `g`.
    pub fn gate_signal(&self, g: usize) -> usize {
        self.num_inputs + 1 + g
    }

    /// Gate indices of the top level, in output order.
    pub fn output_gates(&self) -> std::ops::Range<usize> {
        self.fence.level_range(self.fence.num_levels() - 1)
    }
}

/// Value of constant/PI signal `signal` on `row`.
fn leaf_value(signal: usize, row: usize) -> bool {
    signal != 0 && (row >> (signal - 1)) & 1 == 1
}

/// All `k`-element subsets of `0..n`, lexicographic.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    fn rec(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            current.push(i);
            rec(i + 1, n, k, current, out);
            current.pop();
        }
    }
    let mut out = Vec::new();
    rec(0, n, k, &mut Vec::with_capacity(k), &mut out);
    out
}

/// Encodes whether `fence` realizes `spec`.
///
/// Output `i` is always driven by top-level gate `i`, so the fence's top width
/// must equal the number of outputs. An output that is just a primary input
/// or a constant still occupies a top-level gate in the fence; the decoder
/// may fold that gate away afterwards, but the search pays for it.
pub fn encode(
    fence: &Fence,
    spec: &Specification,
    options: &EncoderOptions,
) -> Result<Encoding, ExsynError> {
    let n = spec.num_vars();
    if n > MAX_ENCODED_VARS {
        return Err(ExsynError::InvalidSpec(format!(
            "{} variables exceeds the encoder maximum of {}",
            n, MAX_ENCODED_VARS
        )));
    }
    let arity = options.gate.arity();
    if fence.arity() != arity {
        return Err(ExsynError::InternalInvariantViolation(format!(
            "fence {} has arity {} but {} gates have arity {}",
            fence,
            fence.arity(),
            options.gate,
            arity
        )));
    }
    if fence.top_width() != spec.num_outputs() {
        return Err(ExsynError::InvalidSpec(format!(
            "fence {} has {} top-level gate(s) for {} output(s)",
            fence,
            fence.top_width(),
            spec.num_outputs()
        )));
    }
    if options.operand_window == Some(0) {
        return Err(ExsynError::InvalidSpec(
            "operand window must be at least 1".to_string(),
        ));
    }

    let rows = 1usize << n;
    let gate_levels = fence.gate_levels();
    let num_gates = gate_levels.len();
    let mut cnf = Cnf::new();

    // Selection block.
    let mut gates: Vec<GateVars> = Vec::with_capacity(num_gates);
    for (g, level) in gate_levels.iter().enumerate() {
        let tier = level + 1;
        let lowest_tier = match options.operand_window {
            Some(w) => tier.saturating_sub(w),
            None => 0,
        };
        let mut choices: Vec<usize> = Vec::new();
        if lowest_tier == 0 {
            choices.extend(0..=n);
        }
        for (h, h_level) in gate_levels.iter().enumerate().take(g) {
            if h_level + 1 >= lowest_tier && h_level + 1 < tier {
                choices.push(n + 1 + h);
            }
        }
        let select: Vec<Vec<Lit>> = (0..arity)
            .map(|_| choices.iter().map(|_| cnf.new_lit()).collect())
            .collect();
        gates.push(GateVars {
            level: *level,
            choices,
            select,
            polarity: vec![None; arity],
            output: Vec::new(),
            operands: Vec::new(),
        });
    }
    // Polarity block.
    if options.complemented_edges {
        for gate in gates.iter_mut() {
            for c in 0..arity {
                gate.polarity[c] = Some(cnf.new_lit());
            }
        }
    }
    let output_polarity: Vec<Option<Lit>> = (0..spec.num_outputs())
        .map(|_| {
            if options.complemented_edges {
                Some(cnf.new_lit())
            } else {
                None
            }
        })
        .collect();
    // Function block.
    for gate in gates.iter_mut() {
        for _ in 0..rows {
            gate.output.push(cnf.new_lit());
            let operands = (0..arity).map(|_| cnf.new_lit()).collect();
            gate.operands.push(operands);
        }
    }

    let encoding_gate_offset = n + 1;
    let majority_subsets = combinations(arity, (arity + 1) / 2);

    for (g, gate) in gates.iter().enumerate() {
        // Exactly one choice per child.
        for c in 0..arity {
            cnf.add_clause(&gate.select[c]);
            for i in 0..gate.select[c].len() {
                for j in i + 1..gate.select[c].len() {
                    cnf.add_clause(&[!gate.select[c][i], !gate.select[c][j]]);
                }
            }
        }

        // Operand links and gate function, per row.
        for row in 0..rows {
            let x = gate.output[row];
            let v = &gate.operands[row];
            for c in 0..arity {
                for (k, signal) in gate.choices.iter().enumerate() {
                    let s = gate.select[c][k];
                    if *signal < encoding_gate_offset {
                        let value = leaf_value(*signal, row);
                        match (gate.polarity[c], value) {
                            (None, true) => cnf.add_clause(&[!s, v[c]]),
                            (None, false) => cnf.add_clause(&[!s, !v[c]]),
                            (Some(p), false) => {
                                cnf.add_clause(&[!s, !v[c], p]);
                                cnf.add_clause(&[!s, v[c], !p]);
                            }
                            (Some(p), true) => {
                                cnf.add_clause(&[!s, v[c], p]);
                                cnf.add_clause(&[!s, !v[c], !p]);
                            }
                        }
                    } else {
                        let y = gates[signal - encoding_gate_offset].output[row];
                        match gate.polarity[c] {
                            None => {
                                cnf.add_clause(&[!s, !v[c], y]);
                                cnf.add_clause(&[!s, v[c], !y]);
                            }
                            Some(p) => {
                                cnf.add_clause(&[!s, !v[c], y, p]);
                                cnf.add_clause(&[!s, !v[c], !y, !p]);
                                cnf.add_clause(&[!s, v[c], !y, p]);
                                cnf.add_clause(&[!s, v[c], y, !p]);
                            }
                        }
                    }
                }
            }
            match options.gate {
                GateKind::Imply => {
                    cnf.add_clause(&[!x, !v[0], v[1]]);
                    cnf.add_clause(&[x, v[0]]);
                    cnf.add_clause(&[x, !v[1]]);
                }
                GateKind::Majority { .. } => {
                    for subset in &majority_subsets {
                        let mut up: Vec<Lit> = vec![!x];
                        up.extend(subset.iter().map(|c| v[*c]));
                        cnf.add_clause(&up);
                        let mut down: Vec<Lit> = vec![x];
                        down.extend(subset.iter().map(|c| !v[*c]));
                        cnf.add_clause(&down);
                    }
                }
            }
        }

        // A gate above level 0 reads at least one gate of the level below.
        if gate.level > 0 {
            let below = fence.level_range(gate.level - 1);
            let mut clause: Vec<Lit> = Vec::new();
            for c in 0..arity {
                for (k, signal) in gate.choices.iter().enumerate() {
                    if *signal >= encoding_gate_offset
                        && below.contains(&(signal - encoding_gate_offset))
                    {
                        clause.push(gate.select[c][k]);
                    }
                }
            }
            cnf.add_clause(&clause);
        }

        if options.symmetry_breaking {
            add_symmetry_breaking(&mut cnf, options.gate, gate);
        }

        // Every gate below the top level feeds some later gate.
        if gate.level + 1 < fence.num_levels() {
            let signal = encoding_gate_offset + g;
            let mut users: Vec<Lit> = Vec::new();
            for later in gates.iter().skip(g + 1) {
                if let Some(k) = later.choices.iter().position(|s| *s == signal) {
                    for c in 0..arity {
                        users.push(later.select[c][k]);
                    }
                }
            }
            cnf.add_clause(&users);
        }
    }

    // Gates within one non-top level are interchangeable; order them by
    // first-child selection.
    if options.symmetry_breaking {
        for level in 0..fence.num_levels().saturating_sub(1) {
            let range = fence.level_range(level);
            for g in range.start..range.end.saturating_sub(1) {
                let (a, b) = (&gates[g], &gates[g + 1]);
                for (ka, sa) in a.choices.iter().enumerate() {
                    for (kb, sb) in b.choices.iter().enumerate() {
                        if sb < sa {
                            cnf.add_clause(&[!a.select[0][ka], !b.select[0][kb]]);
                        }
                    }
                }
            }
        }
    }

    // Output matching.
    let top = fence.level_range(fence.num_levels() - 1);
    for (output, g) in top.enumerate() {
        let function = spec.function(output);
        for row in 0..rows {
            let x = gates[g].output[row];
            match (output_polarity[output], function.get_bit(row)) {
                (None, true) => cnf.add_clause(&[x]),
                (None, false) => cnf.add_clause(&[!x]),
                (Some(q), true) => {
                    cnf.add_clause(&[x, q]);
                    cnf.add_clause(&[!x, !q]);
                }
                (Some(q), false) => {
                    cnf.add_clause(&[!x, q]);
                    cnf.add_clause(&[x, !q]);
                }
            }
        }
    }

    if options.require_support_inputs {
        for input in spec.support() {
            let signal = input + 1;
            let mut users: Vec<Lit> = Vec::new();
            for gate in &gates {
                if let Some(k) = gate.choices.iter().position(|s| *s == signal) {
                    for c in 0..arity {
                        users.push(gate.select[c][k]);
                    }
                }
            }
            cnf.add_clause(&users);
        }
    }

    log::debug!(
        "encoded fence {} for {}: {} variables, {} clauses",
        fence,
        spec,
        cnf.num_vars(),
        cnf.num_clauses()
    );
    Ok(Encoding {
        cnf,
        fence: fence.clone(),
        gate: options.gate,
        num_inputs: n,
        gates,
        output_polarity,
    })
}

fn add_symmetry_breaking(cnf: &mut Cnf, kind: GateKind, gate: &GateVars) {
    match kind {
        // Reading one node twice makes the gate constant or a wire.
        GateKind::Imply => {
            for k in 0..gate.choices.len() {
                cnf.add_clause(&[!gate.select[0][k], !gate.select[1][k]]);
            }
        }
        // Commutative: children in non-decreasing signal order.
        GateKind::Majority { arity } => {
            for c in 0..arity - 1 {
                for (ka, sa) in gate.choices.iter().enumerate() {
                    for (kb, sb) in gate.choices.iter().enumerate() {
                        if sb < sa {
                            cnf.add_clause(&[!gate.select[c][ka], !gate.select[c + 1][kb]]);
                        }
                    }
                }
            }
        }
    }
}
