//! Finite-state transducer tables and traversal for the morfo toolkit.
//!
//! This crate provides loading and traversal of compiled transducer
//! containers: the symbol alphabet, the per-section transition tables,
//! and the nondeterministic state-set simulation with weights that the
//! stream drivers run against.
//!
//! # Architecture
//!
//! - [`compression`] -- varint/zigzag/f64 primitives of the binary format
//! - [`alphabet`] -- symbol table (multichar string <-> id, pair labels)
//! - [`transducer`] -- per-section transition arena and finals
//! - [`container`] -- the on-disk container tying the above together
//! - [`state`] -- state-set simulation (`step`, `filter_finals`, compounds)

pub mod alphabet;
pub mod compression;
pub mod container;
pub mod state;
pub mod transducer;

/// Error type for container and table parsing.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("unexpected end of data at byte {offset}")]
    UnexpectedEof { offset: usize },
    #[error("varint does not fit in 32 bits at byte {offset}")]
    VarintOverflow { offset: usize },
    #[error("container has feature bits unknown to this version ({features:#x}) - upgrade!")]
    UnknownFeatures { features: u64 },
    #[error("invalid code point {value:#x} at byte {offset}")]
    BadCodePoint { value: u32, offset: usize },
    #[error("pair label {label} out of range")]
    BadPairLabel { label: u32 },
    #[error("state index {index} out of range")]
    BadState { index: u32 },
}

/// The epsilon symbol id: matches no input and renders as nothing.
pub const EPSILON: i32 = 0;

/// Weight assigned to transitions synthesized at runtime (root epsilon
/// edges, compound restarts).
pub const DEFAULT_WEIGHT: f64 = 0.0;
