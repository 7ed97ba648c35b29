// SPDX-License-Identifier: Apache-2.0

//! Fences: level/width shapes used as templates for one synthesis attempt.
//!
//! A fence with widths `[3, 2, 1]` describes six gates on three levels; gates
//! on level 0 read only the constant and primary inputs, and the single gate
//! on the last level drives the output. Fences are produced in a fixed order:
//! total gate count, then level count, then lexicographically by width
//! sequence (input side first).

use std::collections::VecDeque;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Restriction on how level widths may vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelRule {
    /// Every width sequence that passes the admissibility check.
    #[default]
    Any,
    /// Widths never grow moving toward the output. Prunes the search and may
    /// miss a minimum network.
    NonIncreasingTowardOutput,
}

impl std::str::FromStr for LevelRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(LevelRule::Any),
            "non-increasing" | "non_increasing_toward_output" => {
                Ok(LevelRule::NonIncreasingTowardOutput)
            }
            _ => Err(format!(
                "invalid level rule {:?}; expected any or non-increasing",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fence {
    levels: Vec<usize>,
    arity: usize,
}

impl Fence {
    pub fn new(levels: Vec<usize>, arity: usize) -> Self {
        assert!(
            !levels.is_empty() && levels.iter().all(|w| *w > 0),
            "fence levels must be non-empty with positive widths; got {:?}",
            levels
        );
        Self { levels, arity }
    }

    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn num_gates(&self) -> usize {
        self.levels.iter().sum()
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn top_width(&self) -> usize {
        self.levels[self.levels.len() - 1]
    }

    /// Gate indices (in fence order) that belong to `level`.
    pub fn level_range(&self, level: usize) -> Range<usize> {
        let start: usize = self.levels[..level].iter().sum();
        start..start + self.levels[level]
    }

    /// Level of each gate, in fence order.
    pub fn gate_levels(&self) -> Vec<usize> {
        self.levels
            .iter()
            .enumerate()
            .flat_map(|(level, width)| std::iter::repeat(level).take(*width))
            .collect()
    }
}

impl std::fmt::Display for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let widths: Vec<String> = self.levels.iter().map(|w| w.to_string()).collect();
        write!(f, "[{}]", widths.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceOptions {
    pub min_gates: usize,
    pub max_gates: usize,
    pub max_levels: Option<usize>,
    pub num_outputs: usize,
    pub arity: usize,
    pub rule: LevelRule,
}

impl Default for FenceOptions {
    fn default() -> Self {
        Self {
            min_gates: 1,
            max_gates: 8,
            max_levels: None,
            num_outputs: 1,
            arity: 2,
            rule: LevelRule::Any,
        }
    }
}

/// Whether `levels` can be the shape of a network in which every non-top gate
/// feeds some later gate.
pub fn is_admissible(levels: &[usize], arity: usize, num_outputs: usize, rule: LevelRule) -> bool {
    if levels.is_empty() || levels.iter().any(|w| *w == 0) {
        return false;
    }
    if levels[levels.len() - 1] != num_outputs {
        return false;
    }
    let mut above = 0;
    for width in levels.iter().rev() {
        if above > 0 && *width > arity * above {
            return false;
        }
        above += width;
    }
    match rule {
        LevelRule::Any => true,
        LevelRule::NonIncreasingTowardOutput => levels.windows(2).all(|w| w[0] >= w[1]),
    }
}

/// All admissible fences with exactly `num_gates` gates on `num_levels`
/// levels, in lexicographic width order.
pub fn fences_with_shape(num_gates: usize, num_levels: usize, options: &FenceOptions) -> Vec<Fence> {
    let mut result = Vec::new();
    if num_levels == 0 || num_gates < options.num_outputs + (num_levels - 1) {
        return result;
    }
    let mut prefix = Vec::with_capacity(num_levels);
    let below_top = num_gates - options.num_outputs;
    compositions(below_top, num_levels - 1, &mut prefix, &mut |widths| {
        let mut levels = widths.to_vec();
        levels.push(options.num_outputs);
        if is_admissible(&levels, options.arity, options.num_outputs, options.rule) {
            result.push(Fence::new(levels, options.arity));
        }
    });
    result
}

/// All admissible fences with exactly `num_gates` gates, ordered by level
/// count then lexicographically.
pub fn fences_with_gates(num_gates: usize, options: &FenceOptions) -> Vec<Fence> {
    let max_levels = options.max_levels.unwrap_or(num_gates).min(num_gates);
    (1..=max_levels)
        .flat_map(|levels| fences_with_shape(num_gates, levels, options))
        .collect()
}

/// Calls `emit` with every sequence of `parts` positive integers summing to
/// `total`, in lexicographic order.
fn compositions(total: usize, parts: usize, prefix: &mut Vec<usize>, emit: &mut dyn FnMut(&[usize])) {
    if parts == 0 {
        if total == 0 {
            emit(prefix);
        }
        return;
    }
    if total < parts {
        return;
    }
    for first in 1..=total - (parts - 1) {
        prefix.push(first);
        compositions(total - first, parts - 1, prefix, emit);
        prefix.pop();
    }
}

/// Lazy, restartable fence sequence bounded by `FenceOptions::max_gates`.
#[derive(Debug, Clone)]
pub struct FenceEnumerator {
    options: FenceOptions,
    num_gates: usize,
    num_levels: usize,
    pending: VecDeque<Fence>,
}

impl FenceEnumerator {
    pub fn new(options: FenceOptions) -> Self {
        let start = options.min_gates.max(options.num_outputs).max(1);
        Self {
            options,
            num_gates: start,
            num_levels: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn options(&self) -> &FenceOptions {
        &self.options
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.options.clone());
    }

    fn max_levels_for(&self, num_gates: usize) -> usize {
        self.options.max_levels.unwrap_or(num_gates).min(num_gates)
    }
}

impl Iterator for FenceEnumerator {
    type Item = Fence;

    fn next(&mut self) -> Option<Fence> {
        loop {
            if let Some(fence) = self.pending.pop_front() {
                return Some(fence);
            }
            if self.num_gates > self.options.max_gates {
                return None;
            }
            if self.num_levels < self.max_levels_for(self.num_gates) {
                self.num_levels += 1;
            } else {
                self.num_gates += 1;
                self.num_levels = 1;
                if self.num_gates > self.options.max_gates {
                    return None;
                }
            }
            self.pending = fences_with_shape(self.num_gates, self.num_levels, &self.options).into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn widths(fences: impl Iterator<Item = Fence>) -> Vec<Vec<usize>> {
        fences.map(|f| f.levels().to_vec()).collect()
    }

    #[test]
    fn test_order_for_implication() {
        let options = FenceOptions {
            max_gates: 4,
            arity: 2,
            ..FenceOptions::default()
        };
        let got = widths(FenceEnumerator::new(options));
        let want: Vec<Vec<usize>> = vec![
            vec![1],
            vec![1, 1],
            vec![2, 1],
            vec![1, 1, 1],
            vec![1, 2, 1],
            vec![2, 1, 1],
            vec![1, 1, 1, 1],
        ];
        assert_eq!(got, want);
    }

    #[test]
    fn test_majority_allows_wider_levels() {
        let options = FenceOptions {
            min_gates: 4,
            max_gates: 4,
            arity: 3,
            ..FenceOptions::default()
        };
        let got = widths(FenceEnumerator::new(options));
        let want: Vec<Vec<usize>> = vec![
            vec![3, 1],
            vec![1, 2, 1],
            vec![2, 1, 1],
            vec![1, 1, 1, 1],
        ];
        assert_eq!(got, want);
    }

    #[test]
    fn test_non_increasing_rule() {
        let options = FenceOptions {
            min_gates: 4,
            max_gates: 4,
            arity: 3,
            rule: LevelRule::NonIncreasingTowardOutput,
            ..FenceOptions::default()
        };
        let got = widths(FenceEnumerator::new(options));
        assert_eq!(got, vec![vec![3, 1], vec![2, 1, 1], vec![1, 1, 1, 1]]);
    }

    #[test]
    fn test_multi_output_top_width() {
        let options = FenceOptions {
            max_gates: 3,
            num_outputs: 2,
            ..FenceOptions::default()
        };
        let got = widths(FenceEnumerator::new(options));
        assert_eq!(got, vec![vec![2], vec![1, 2]]);
    }

    #[test]
    fn test_max_levels_and_reset() {
        let options = FenceOptions {
            max_gates: 3,
            max_levels: Some(1),
            ..FenceOptions::default()
        };
        let mut e = FenceEnumerator::new(options);
        assert_eq!(e.next().map(|f| f.levels().to_vec()), Some(vec![1]));
        assert_eq!(e.next(), None);
        e.reset();
        assert_eq!(widths(e.clone()), vec![vec![1]]);
        assert_eq!(e.count(), 1);
    }

    #[test]
    fn test_enumeration_is_deterministic() {
        let options = FenceOptions {
            max_gates: 7,
            arity: 3,
            ..FenceOptions::default()
        };
        let a = widths(FenceEnumerator::new(options.clone()));
        let b = widths(FenceEnumerator::new(options));
        assert_eq!(a, b);
        let sizes: Vec<usize> = a.iter().map(|w| w.iter().sum()).collect();
        let mut sorted = sizes.clone();
        sorted.sort();
        assert_eq!(sizes, sorted);
    }

    #[test_case(&[1], 2, true; "single gate")]
    #[test_case(&[3, 1], 2, false; "too wide for two parents")]
    #[test_case(&[3, 1], 3, true; "majority parent reads three")]
    #[test_case(&[2, 2], 2, false; "top must be one")]
    #[test_case(&[7, 2, 1], 2, false; "seven feeding three gates above")]
    #[test_case(&[4, 2, 1], 2, true; "full binary tree")]
    fn test_admissibility(levels: &[usize], arity: usize, expected: bool) {
        assert_eq!(is_admissible(levels, arity, 1, LevelRule::Any), expected);
    }

    #[test]
    fn test_fence_geometry() {
        let fence = Fence::new(vec![2, 3, 1], 3);
        assert_eq!(fence.num_gates(), 6);
        assert_eq!(fence.level_range(1), 2..5);
        assert_eq!(fence.gate_levels(), vec![0, 0, 1, 1, 1, 2]);
        assert_eq!(fence.to_string(), "[2, 3, 1]");
    }
}
