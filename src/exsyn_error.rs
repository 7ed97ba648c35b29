// SPDX-License-Identifier: Apache-2.0

/// Why a search ended without producing a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    /// Every fence within the configured node/level bound was UNSAT.
    FenceBound,
    /// The wall-clock or solver-call budget ran out between fence attempts.
    Budget,
    /// The caller's cancellation token fired.
    Cancelled,
}

impl std::fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExhaustReason::FenceBound => "fence bound reached",
            ExhaustReason::Budget => "budget exceeded",
            ExhaustReason::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExsynError {
    /// Malformed or truncated truth table, or a variable count beyond what we
    /// support.
    InvalidSpec(String),
    /// The constraint solver could not be invoked or gave an unusable answer.
    SolverUnavailable(String),
    /// No fence within the configured bound realizes the specification.
    SynthesisExhausted {
        fences_tried: usize,
        reason: ExhaustReason,
    },
    /// A node store precondition was breached (cycle, index out of range,
    /// fan-out bookkeeping mismatch, decoded network disagreeing with the
    /// specification).
    InternalInvariantViolation(String),
}

impl std::fmt::Display for ExsynError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExsynError::InvalidSpec(msg) => write!(f, "invalid specification: {}", msg),
            ExsynError::SolverUnavailable(msg) => write!(f, "solver unavailable: {}", msg),
            ExsynError::SynthesisExhausted {
                fences_tried,
                reason,
            } => write!(
                f,
                "synthesis exhausted after {} fence(s): {}",
                fences_tried, reason
            ),
            ExsynError::InternalInvariantViolation(msg) => {
                write!(f, "internal invariant violation: {}", msg)
            }
        }
    }
}

impl std::error::Error for ExsynError {}

impl ExsynError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ExsynError::SynthesisExhausted { .. })
    }
}
