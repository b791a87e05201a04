//! Streaming drivers over compiled transducer containers.
//!
//! The [`processor::FstProcessor`] reads an annotated text stream, runs
//! the state-set simulation from `morfo-fst` over it, and writes the
//! per-mode output: morphological analysis, generation, post-generation,
//! inter-generation, transliteration, bilingual transfer,
//! translation-memory analysis and compound decomposition.
//!
//! # Modules
//!
//! - [`text`] -- incremental UTF-8 character reader with pushback
//! - [`buffer`] -- symbol ring buffer for longest-match backtracking
//! - [`blanks`] -- wordbound blank combining
//! - [`settings`] -- the runtime configuration record
//! - [`processor`] -- loading, per-mode initialization, shared emission
//! - [`reader`] -- mode-specific stream readers
//! - the driver modules: [`analysis`], [`tm`], [`generation`],
//!   [`postgen`], [`bilingual`], [`compound`]

pub mod analysis;
pub mod bilingual;
pub mod blanks;
pub mod buffer;
pub mod compound;
pub mod generation;
pub mod postgen;
pub mod processor;
pub mod reader;
pub mod settings;
pub mod text;
pub mod tm;

use std::io;

/// Error type for stream processing.
#[derive(Debug, thiserror::Error)]
pub enum ProcError {
    /// Bad escape, unterminated block, or a stray delimiter: the stream
    /// cannot be resynchronized without data loss.
    #[error("Malformed input stream.")]
    StreamMalformed,
    #[error("Unsupported transducer type for '{0}'.")]
    UnsupportedSection(String),
    #[error(transparent)]
    Format(#[from] morfo_fst::FormatError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
