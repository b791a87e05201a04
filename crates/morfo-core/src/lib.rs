//! Shared character-level utilities for the morfo FST toolkit.
//!
//! This crate holds the small pieces every layer needs: single-character
//! case tests and folding, and the whitespace/punctuation classification
//! used by the stream drivers.

pub mod character;
