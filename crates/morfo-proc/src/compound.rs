// Compound analyzer: recognize word+word+... chains by restarting final
// states into the initial state.

use crate::processor::FstProcessor;

/// State-set size bound during compound analysis. Beyond this the word is
/// treated as undecomposable rather than spending unbounded memory.
const MAX_COMBINATIONS: usize = 32767;

impl FstProcessor {
    /// Try to analyze `input_word` as a compound. Returns the filtered
    /// lexical forms (`/L1/L2...`), or an empty string when the word does
    /// not decompose.
    pub fn compound_analysis(
        &self,
        input_word: &str,
        uppercase: bool,
        firstupper: bool,
    ) -> String {
        let chars: Vec<char> = input_word.chars().collect();
        let mut current_state = self.initial_state.clone();

        for (i, &c) in chars.iter().enumerate() {
            current_state.step_case(&self.nodes, c, self.settings.case_sensitive);

            if current_state.size() > MAX_COMBINATIONS {
                eprintln!(
                    "Warning: compound analysis exceeded {MAX_COMBINATIONS} combinations for '{input_word}'"
                );
                eprintln!("         gave up at character {i} '{c}'.");
                return String::new();
            }

            if i < chars.len() - 1 {
                current_state.restart_finals(
                    &self.all_finals,
                    self.compound_only_l_symbol,
                    &self.initial_state,
                    '+' as i32,
                );
            }

            if current_state.is_empty() {
                return String::new();
            }
        }

        current_state.prune_compounds(
            self.compound_r_symbol,
            '+' as i32,
            self.settings.compound_max_elements,
        );
        current_state.filter_finals(
            &self.all_finals,
            &self.alphabet,
            &self.escaped_chars,
            &self.finals_format(uppercase, firstupper),
        )
    }
}
