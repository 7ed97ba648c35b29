// SPDX-License-Identifier: Apache-2.0

//! Core value types of the logic network: node references, signals (node plus
//! polarity), the gate primitive, and the node record itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NodeRef {
    pub id: usize,
}

/// A node reference carrying a polarity bit. Pure value type; copying a signal
/// never changes any fan-out count.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Signal {
    pub node: NodeRef,
    pub negated: bool,
}

impl Signal {
    pub fn new(id: usize, negated: bool) -> Self {
        Self {
            node: NodeRef { id },
            negated,
        }
    }

    #[must_use]
    pub fn negate(&self) -> Self {
        Self {
            node: self.node,
            negated: !self.negated,
        }
    }

    /// Composes polarity by XOR.
    #[must_use]
    pub fn xor_polarity(&self, negated: bool) -> Self {
        Self {
            node: self.node,
            negated: self.negated ^ negated,
        }
    }

    pub fn non_negated(&self) -> Option<NodeRef> {
        if self.negated {
            None
        } else {
            Some(self.node)
        }
    }
}

impl From<NodeRef> for Signal {
    fn from(node: NodeRef) -> Self {
        Signal {
            node,
            negated: false,
        }
    }
}

impl From<&NodeRef> for Signal {
    fn from(node: &NodeRef) -> Self {
        Signal {
            node: *node,
            negated: false,
        }
    }
}

impl std::ops::Not for Signal {
    type Output = Signal;

    fn not(self) -> Signal {
        self.negate()
    }
}

/// The gate primitive a network is built from. Every gate in one store has the
/// same kind. Written `imply`, `majority3`, `majority5`, ... in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GateKind {
    /// Two-input implication `!a | b`. Order sensitive.
    Imply,
    /// Majority over an odd number (>= 3) of inputs. Commutative.
    Majority { arity: usize },
}

impl GateKind {
    pub fn majority3() -> Self {
        GateKind::Majority { arity: 3 }
    }

    pub fn majority5() -> Self {
        GateKind::Majority { arity: 5 }
    }

    pub fn arity(&self) -> usize {
        match self {
            GateKind::Imply => 2,
            GateKind::Majority { arity } => *arity,
        }
    }

    /// Smallest number of specification variables the search accepts for this
    /// primitive; smaller specifications are extended by replication.
    pub fn min_spec_vars(&self) -> usize {
        self.arity()
    }

    pub fn is_commutative(&self) -> bool {
        matches!(self, GateKind::Majority { .. })
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            GateKind::Imply => "imp",
            GateKind::Majority { .. } => "maj",
        }
    }

    /// Checks the primitive is well formed (majority arity odd and >= 3).
    pub fn validate(&self) -> Result<(), String> {
        match self {
            GateKind::Imply => Ok(()),
            GateKind::Majority { arity } if *arity >= 3 && arity % 2 == 1 => Ok(()),
            GateKind::Majority { arity } => Err(format!(
                "majority arity must be odd and at least 3; got {}",
                arity
            )),
        }
    }
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateKind::Imply => write!(f, "imply"),
            GateKind::Majority { arity } => write!(f, "majority{}", arity),
        }
    }
}

impl std::str::FromStr for GateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "imply" | "imp" => GateKind::Imply,
            "maj" | "mig" => GateKind::majority3(),
            _ => {
                let digits = s
                    .strip_prefix("majority")
                    .or_else(|| s.strip_prefix("maj"))
                    .ok_or_else(|| {
                        format!(
                            "invalid gate kind {:?}; expected imply or majority<k>",
                            s
                        )
                    })?;
                let arity: usize = digits
                    .parse()
                    .map_err(|_| format!("invalid majority arity in {:?}", s))?;
                GateKind::Majority { arity }
            }
        };
        kind.validate()?;
        Ok(kind)
    }
}

impl TryFrom<String> for GateKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<GateKind> for String {
    fn from(kind: GateKind) -> String {
        kind.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Node 0; constant false.
    Constant,
    /// Primary input; `index` is its position among the store's inputs.
    Input { index: usize },
    Gate { children: Vec<Signal> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub fanout: u32,
    /// Application-specific scratch value.
    pub value: u32,
    /// Traversal scratch flag.
    pub visited: u32,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            fanout: 0,
            value: 0,
            visited: 0,
        }
    }

    pub fn children(&self) -> &[Signal] {
        match &self.kind {
            NodeKind::Gate { children } => children.as_slice(),
            NodeKind::Constant | NodeKind::Input { .. } => &[],
        }
    }

    pub fn is_gate(&self) -> bool {
        matches!(self.kind, NodeKind::Gate { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_polarity_composition() {
        let s = Signal::new(4, false);
        assert_eq!(!s, Signal::new(4, true));
        assert_eq!(s.xor_polarity(true).xor_polarity(true), s);
        assert_eq!((!s).non_negated(), None);
        assert_eq!(s.non_negated(), Some(NodeRef { id: 4 }));
    }

    #[test]
    fn test_gate_kind_validation() {
        assert!(GateKind::Imply.validate().is_ok());
        assert!(GateKind::majority5().validate().is_ok());
        assert!(GateKind::Majority { arity: 4 }.validate().is_err());
        assert!(GateKind::Majority { arity: 1 }.validate().is_err());
        assert_eq!(GateKind::majority3().arity(), 3);
        assert_eq!(GateKind::Imply.to_string(), "imply");
    }

    #[test]
    fn test_gate_kind_parse_round_trips_display() {
        for kind in [GateKind::Imply, GateKind::majority3(), GateKind::majority5()] {
            assert_eq!(kind.to_string().parse::<GateKind>(), Ok(kind));
        }
        assert_eq!("maj".parse::<GateKind>(), Ok(GateKind::majority3()));
        assert_eq!("maj5".parse::<GateKind>(), Ok(GateKind::majority5()));
        assert!("majority4".parse::<GateKind>().is_err());
        assert!("nand".parse::<GateKind>().is_err());
    }
}
