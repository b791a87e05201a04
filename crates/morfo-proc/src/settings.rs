// Runtime configuration record for the stream drivers.

/// Every toggle the drivers consult, fixed once per run.
///
/// Collecting these in one record keeps the per-mode `init_*` methods
/// order-independent: nothing here is derived from another field.
#[derive(Debug, Clone)]
pub struct ProcSettings {
    /// Never case-fold while stepping.
    pub case_sensitive: bool,
    /// Emit the dictionary's own casing, discarding surface case.
    pub dictionary_case: bool,
    /// Treat NUL as a segment boundary and flush after each segment.
    pub null_flush: bool,
    /// Honor the injected ignored-character set.
    pub use_ignored_chars: bool,
    /// Seed the ignored set with soft hyphen (U+00AD).
    pub use_default_ignored_chars: bool,
    /// Attempt diacritic restoration through the injected substitute map.
    pub use_restore_chars: bool,
    /// Append `<W:...>` weights to every lexical form.
    pub display_weights: bool,
    /// Render compound control symbols instead of blanking them.
    pub show_control_symbols: bool,
    /// Bilingual mode: keep the pre-`/` surface form.
    pub biltrans_surface_forms: bool,
    /// Emit at most this many analyses per token.
    pub max_analyses: usize,
    /// Emit at most this many distinct weight values per token.
    pub max_weight_classes: usize,
    /// Maximum number of compound boundaries accepted in decomposition.
    pub compound_max_elements: usize,
}

impl Default for ProcSettings {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            dictionary_case: false,
            null_flush: false,
            use_ignored_chars: false,
            use_default_ignored_chars: true,
            use_restore_chars: false,
            display_weights: false,
            show_control_symbols: false,
            biltrans_surface_forms: false,
            max_analyses: usize::MAX,
            max_weight_classes: usize::MAX,
            compound_max_elements: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ProcSettings::default();
        assert!(!s.case_sensitive);
        assert!(s.use_default_ignored_chars);
        assert_eq!(s.compound_max_elements, 4);
        assert_eq!(s.max_analyses, usize::MAX);
    }
}
