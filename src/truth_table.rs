// SPDX-License-Identifier: Apache-2.0

//! Dynamic-width single-output Boolean function truth tables.
//!
//! We represent a Boolean function of `n` variables as `2^n` bits packed into
//! `u64` words, where bit `r` holds the output value on the input assignment
//! encoded by `r`:
//! - `x0 = (r >> 0) & 1`
//! - `x1 = (r >> 1) & 1`
//! - ...
//!
//! That is, variable 0 is the least-significant selector bit and toggles
//! fastest. Under this convention the 3-input majority is `0xe8` and the
//! 3-input parity is `0x96`.
//!
//! Hex strings are written most-significant digit first, the same way the
//! function would be printed as a single big integer.

use crate::exsyn_error::ExsynError;

/// Largest variable count we accept when parsing or building tables.
pub const MAX_TRUTH_TABLE_VARS: usize = 16;

const WORD_BITS: usize = 64;

const VAR_MASKS: [u64; 6] = [
    0xAAAA_AAAA_AAAA_AAAA,
    0xCCCC_CCCC_CCCC_CCCC,
    0xF0F0_F0F0_F0F0_F0F0,
    0xFF00_FF00_FF00_FF00,
    0xFFFF_0000_FFFF_0000,
    0xFFFF_FFFF_0000_0000,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TruthTable {
    num_vars: usize,
    words: Vec<u64>,
}

fn word_count(num_vars: usize) -> usize {
    std::cmp::max(1, (1usize << num_vars) / WORD_BITS)
}

fn last_word_mask(num_vars: usize) -> u64 {
    let bits = 1usize << num_vars;
    if bits >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

impl TruthTable {
    /// Returns the constant-false function of `num_vars` variables.
    pub fn new(num_vars: usize) -> Self {
        assert!(
            num_vars <= MAX_TRUTH_TABLE_VARS,
            "TruthTable::new: {} variables exceeds the supported maximum of {}",
            num_vars,
            MAX_TRUTH_TABLE_VARS
        );
        Self {
            num_vars,
            words: vec![0; word_count(num_vars)],
        }
    }

    pub fn const0(num_vars: usize) -> Self {
        Self::new(num_vars)
    }

    pub fn const1(num_vars: usize) -> Self {
        Self::new(num_vars).not()
    }

    /// Returns the projection onto variable `index`.
    pub fn var(num_vars: usize, index: usize) -> Self {
        assert!(
            index < num_vars,
            "TruthTable::var index {} out of range for {} variables",
            index,
            num_vars
        );
        let mut tt = Self::new(num_vars);
        for (w, word) in tt.words.iter_mut().enumerate() {
            *word = if index < 6 {
                VAR_MASKS[index]
            } else if (w >> (index - 6)) & 1 == 1 {
                u64::MAX
            } else {
                0
            };
        }
        tt.mask_tail();
        tt
    }

    /// Parses a hex string, inferring the variable count from its length.
    ///
    /// The digit count must be a power of two; a single digit is read as a
    /// 2-variable function.
    pub fn from_hex(text: &str) -> Result<Self, ExsynError> {
        let digits = strip_hex_prefix(text.trim());
        if digits.is_empty() {
            return Err(ExsynError::InvalidSpec(format!(
                "empty truth table string {:?}",
                text
            )));
        }
        let bit_count = digits.len() * 4;
        if !bit_count.is_power_of_two() {
            return Err(ExsynError::InvalidSpec(format!(
                "truth table {:?} has {} hex digits; expected a power of two",
                text,
                digits.len()
            )));
        }
        let num_vars = bit_count.trailing_zeros() as usize;
        Self::from_hex_with_vars(num_vars, text)
    }

    /// Parses a hex string for a function of exactly `num_vars` variables.
    pub fn from_hex_with_vars(num_vars: usize, text: &str) -> Result<Self, ExsynError> {
        if num_vars > MAX_TRUTH_TABLE_VARS {
            return Err(ExsynError::InvalidSpec(format!(
                "{} variables exceeds the supported maximum of {}",
                num_vars, MAX_TRUTH_TABLE_VARS
            )));
        }
        let digits = strip_hex_prefix(text.trim());
        let expected_digits = std::cmp::max(1, (1usize << num_vars) / 4);
        if digits.len() != expected_digits {
            return Err(ExsynError::InvalidSpec(format!(
                "truth table {:?} has {} hex digits; {} variables need {}",
                text,
                digits.len(),
                num_vars,
                expected_digits
            )));
        }
        let mut tt = Self::new(num_vars);
        for (k, c) in digits.chars().rev().enumerate() {
            let nibble = c.to_digit(16).ok_or_else(|| {
                ExsynError::InvalidSpec(format!(
                    "truth table {:?} contains non-hex character {:?}",
                    text, c
                ))
            })? as u64;
            let bit = 4 * k;
            tt.words[bit / WORD_BITS] |= nibble << (bit % WORD_BITS);
        }
        if tt.words[tt.words.len() - 1] & !last_word_mask(num_vars) != 0 {
            return Err(ExsynError::InvalidSpec(format!(
                "truth table {:?} sets bits beyond the {} rows of a {}-variable function",
                text,
                1usize << num_vars,
                num_vars
            )));
        }
        Ok(tt)
    }

    /// Formats the table as lowercase hex without a prefix.
    pub fn to_hex(&self) -> String {
        let digit_count = std::cmp::max(1, self.num_bits() / 4);
        let mut s = String::with_capacity(digit_count);
        for k in (0..digit_count).rev() {
            let bit = 4 * k;
            let nibble = (self.words[bit / WORD_BITS] >> (bit % WORD_BITS)) & 0xf;
            s.push(std::char::from_digit(nibble as u32, 16).unwrap_or('0'));
        }
        s
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn num_bits(&self) -> usize {
        1usize << self.num_vars
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    #[inline]
    pub fn get_bit(&self, row: usize) -> bool {
        debug_assert!(row < self.num_bits());
        (self.words[row / WORD_BITS] >> (row % WORD_BITS)) & 1 != 0
    }

    #[inline]
    pub fn set_bit(&mut self, row: usize, value: bool) {
        debug_assert!(row < self.num_bits());
        let mask = 1u64 << (row % WORD_BITS);
        if value {
            self.words[row / WORD_BITS] |= mask;
        } else {
            self.words[row / WORD_BITS] &= !mask;
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_const0(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn is_const1(&self) -> bool {
        self.count_ones() == self.num_bits()
    }

    #[must_use]
    pub fn not(&self) -> Self {
        let mut result = self.clone();
        for w in result.words.iter_mut() {
            *w = !*w;
        }
        result.mask_tail();
        result
    }

    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        self.zip_words(other, |a, b| a & b)
    }

    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        self.zip_words(other, |a, b| a | b)
    }

    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        self.zip_words(other, |a, b| a ^ b)
    }

    /// `!self | other`
    #[must_use]
    pub fn imply(&self, other: &Self) -> Self {
        let mut result = self.zip_words(other, |a, b| !a | b);
        result.mask_tail();
        result
    }

    /// Bitwise majority over an odd number of tables.
    pub fn majority(operands: &[Self]) -> Self {
        assert!(
            operands.len() % 2 == 1,
            "TruthTable::majority requires an odd operand count; got {}",
            operands.len()
        );
        let num_vars = operands[0].num_vars;
        let threshold = operands.len() / 2 + 1;
        let mut result = Self::new(num_vars);
        for row in 0..result.num_bits() {
            let ones = operands.iter().filter(|tt| tt.get_bit(row)).count();
            if ones >= threshold {
                result.set_bit(row, true);
            }
        }
        result
    }

    /// Extends the function to `num_vars` variables by replicating the table;
    /// the result does not depend on the added variables.
    pub fn extend_to(&self, num_vars: usize) -> Self {
        assert!(
            num_vars >= self.num_vars,
            "extend_to: cannot shrink a {}-variable table to {} variables",
            self.num_vars,
            num_vars
        );
        let mut result = Self::new(num_vars);
        let row_mask = self.num_bits() - 1;
        for row in 0..result.num_bits() {
            if self.get_bit(row & row_mask) {
                result.set_bit(row, true);
            }
        }
        result
    }

    /// Keeps the low `2^num_vars` rows, i.e. the restriction where the dropped
    /// variables are all zero.
    pub fn shrink_to(&self, num_vars: usize) -> Self {
        assert!(
            num_vars <= self.num_vars,
            "shrink_to: cannot grow a {}-variable table to {} variables",
            self.num_vars,
            num_vars
        );
        let mut result = Self::new(num_vars);
        for row in 0..result.num_bits() {
            if self.get_bit(row) {
                result.set_bit(row, true);
            }
        }
        result
    }

    /// Whether flipping variable `index` can change the output.
    pub fn depends_on(&self, index: usize) -> bool {
        assert!(index < self.num_vars);
        let stride = 1usize << index;
        (0..self.num_bits())
            .filter(|row| row & stride == 0)
            .any(|row| self.get_bit(row) != self.get_bit(row | stride))
    }

    /// Indices of the variables the function depends on, ascending.
    pub fn support(&self) -> Vec<usize> {
        (0..self.num_vars).filter(|i| self.depends_on(*i)).collect()
    }

    fn zip_words(&self, other: &Self, f: impl Fn(u64, u64) -> u64) -> Self {
        assert_eq!(
            self.num_vars, other.num_vars,
            "truth table variable counts differ"
        );
        let words = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| f(*a, *b))
            .collect();
        Self {
            num_vars: self.num_vars,
            words,
        }
    }

    fn mask_tail(&mut self) {
        let mask = last_word_mask(self.num_vars);
        if let Some(last) = self.words.last_mut() {
            *last &= mask;
        }
    }
}

impl std::fmt::Display for TruthTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

fn strip_hex_prefix(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}
