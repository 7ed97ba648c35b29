// SPDX-License-Identifier: Apache-2.0

use crate::exsyn_error::ExsynError;
use crate::truth_table::TruthTable;

/// Target functions for one synthesis attempt. All functions share the same
/// variable count; output `i` of a synthesized network realizes
/// `functions[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specification {
    num_vars: usize,
    functions: Vec<TruthTable>,
}

impl Specification {
    pub fn new(functions: Vec<TruthTable>) -> Result<Self, ExsynError> {
        let first = functions
            .first()
            .ok_or_else(|| ExsynError::InvalidSpec("specification has no functions".to_string()))?;
        let num_vars = first.num_vars();
        if let Some(other) = functions.iter().find(|f| f.num_vars() != num_vars) {
            return Err(ExsynError::InvalidSpec(format!(
                "all functions must have {} variables; found one with {}",
                num_vars,
                other.num_vars()
            )));
        }
        Ok(Self {
            num_vars,
            functions,
        })
    }

    pub fn single(function: TruthTable) -> Self {
        Self {
            num_vars: function.num_vars(),
            functions: vec![function],
        }
    }

    /// Single-output specification from a hex record; see
    /// `TruthTable::from_hex` for the accepted forms.
    pub fn from_hex(text: &str) -> Result<Self, ExsynError> {
        Ok(Self::single(TruthTable::from_hex(text)?))
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn num_outputs(&self) -> usize {
        self.functions.len()
    }

    pub fn functions(&self) -> &[TruthTable] {
        &self.functions
    }

    pub fn function(&self, output: usize) -> &TruthTable {
        &self.functions[output]
    }

    /// Extends every function to `min_vars` variables by input replication
    /// (the new variables are don't-cares the function does not depend on).
    /// Specifications that already have enough variables are returned as is.
    pub fn extend_to_min(&self, min_vars: usize) -> Self {
        if self.num_vars >= min_vars {
            return self.clone();
        }
        log::debug!(
            "extending specification from {} to {} variables",
            self.num_vars,
            min_vars
        );
        Self {
            num_vars: min_vars,
            functions: self.functions.iter().map(|f| f.extend_to(min_vars)).collect(),
        }
    }

    /// Restricts every function back to its low `num_vars` variables.
    pub fn restrict_to(&self, num_vars: usize) -> Self {
        Self {
            num_vars,
            functions: self.functions.iter().map(|f| f.shrink_to(num_vars)).collect(),
        }
    }

    /// Union of the functional supports of all outputs, ascending.
    pub fn support(&self) -> Vec<usize> {
        (0..self.num_vars)
            .filter(|i| self.functions.iter().any(|f| f.depends_on(*i)))
            .collect()
    }
}

impl std::fmt::Display for Specification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.functions.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", parts.join(" "))
    }
}
