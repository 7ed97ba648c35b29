// SPDX-License-Identifier: Apache-2.0

//! Exact synthesis of minimum-size implication and majority networks.
//!
//! ```
//! use exsyn::gate::GateKind;
//! use exsyn::specification::Specification;
//! use exsyn::synth::{synthesize, SynthesisOptions};
//!
//! let spec = Specification::from_hex("0xe8").unwrap();
//! let options = SynthesisOptions {
//!     gate: GateKind::majority3(),
//!     ..SynthesisOptions::default()
//! };
//! let result = synthesize(&spec, &options).unwrap();
//! assert_eq!(result.network.num_gates(), 1);
//! ```

pub mod batch;
pub mod decoder;
pub mod encoder;
pub mod expression;
pub mod exsyn_error;
pub mod fanout;
pub mod fence;
pub mod gate;
pub mod gate_sim;
pub mod node_store;
pub mod solver;
pub mod specification;
pub mod synth;
pub mod test_utils;
pub mod topo;
pub mod truth_table;

pub use exsyn_error::ExsynError;
pub use synth::{synthesize, SynthesisOptions, SynthesisResult, Synthesized};
