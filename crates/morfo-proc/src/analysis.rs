// Longest-match analysis driver.

use std::io::{BufRead, Write};

use crate::processor::{
    char_len, char_prefix, is_space_sym, is_upper_sym, lower_sym, sym_char, write_char,
    FstProcessor,
};
use crate::text::TextReader;
use crate::ProcError;

impl FstProcessor {
    /// Morphological analysis: segment the stream into surface tokens,
    /// pick the longest match per priority class, and emit
    /// `^surface/lexical$` records with blanks preserved.
    pub fn analysis<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        if self.settings.null_flush {
            return self.analysis_null_flush(input, output);
        }
        self.analysis_main(input, output)
    }

    fn analysis_null_flush<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        self.settings.null_flush = false;
        let result = (|| {
            while !input.at_eof()? {
                self.analysis_main(input, output)?;
                write_char(output, '\0')?;
                output.flush()?;
                self.reset_segment_state();
            }
            Ok(())
        })();
        self.settings.null_flush = true;
        result
    }

    fn analysis_main<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        let mut last_incond = false;
        let mut last_postblank = false;
        let mut last_preblank = false;
        let mut current_state = self.initial_state.clone();
        let mut lf = String::new(); // lexical form
        let mut sf = String::new(); // surface form
        let mut last = 0usize;
        let mut firstupper = false;
        let mut uppercase = false;

        loop {
            let mut val = self.read_analysis(input)?;

            // test for final states
            if current_state.is_final(&self.all_finals) {
                if current_state.is_final(&self.inconditional) {
                    if !self.settings.dictionary_case {
                        (firstupper, uppercase) = self.case_flags(&sf);
                    }
                    if self.do_decomposition && self.compound_only_l_symbol != 0 {
                        current_state
                            .prune_states_with_forbidden_symbol(self.compound_only_l_symbol);
                    }
                    lf = current_state.filter_finals(
                        &self.all_finals,
                        &self.alphabet,
                        &self.escaped_chars,
                        &self.finals_format(uppercase, firstupper),
                    );
                    last_incond = true;
                    last = self.input_buffer.get_pos();
                } else if current_state.is_final(&self.postblank) {
                    if !self.settings.dictionary_case {
                        (firstupper, uppercase) = self.case_flags(&sf);
                    }
                    if self.do_decomposition && self.compound_only_l_symbol != 0 {
                        current_state
                            .prune_states_with_forbidden_symbol(self.compound_only_l_symbol);
                    }
                    lf = current_state.filter_finals(
                        &self.all_finals,
                        &self.alphabet,
                        &self.escaped_chars,
                        &self.finals_format(uppercase, firstupper),
                    );
                    last_postblank = true;
                    last = self.input_buffer.get_pos();
                } else if current_state.is_final(&self.preblank) {
                    if !self.settings.dictionary_case {
                        (firstupper, uppercase) = self.case_flags(&sf);
                    }
                    if self.do_decomposition && self.compound_only_l_symbol != 0 {
                        current_state
                            .prune_states_with_forbidden_symbol(self.compound_only_l_symbol);
                    }
                    lf = current_state.filter_finals(
                        &self.all_finals,
                        &self.alphabet,
                        &self.escaped_chars,
                        &self.finals_format(uppercase, firstupper),
                    );
                    last_preblank = true;
                    last = self.input_buffer.get_pos();
                } else if !self.is_alphabetic_sym(val) {
                    // standard sections commit only on a word boundary
                    if !self.settings.dictionary_case {
                        (firstupper, uppercase) = self.case_flags(&sf);
                    }
                    if self.do_decomposition && self.compound_only_l_symbol != 0 {
                        current_state
                            .prune_states_with_forbidden_symbol(self.compound_only_l_symbol);
                    }
                    lf = current_state.filter_finals(
                        &self.all_finals,
                        &self.alphabet,
                        &self.escaped_chars,
                        &self.finals_format(uppercase, firstupper),
                    );
                    last_postblank = false;
                    last_preblank = false;
                    last_incond = false;
                    last = self.input_buffer.get_pos();
                }
            } else if sf.is_empty() && is_space_sym(val) {
                lf = "/*".to_string();
                last_postblank = false;
                last_preblank = false;
                last_incond = false;
                last = self.input_buffer.get_pos();
            }

            self.analysis_step(&mut current_state, val);

            if current_state.size() != 0 {
                if val != 0 {
                    self.alphabet.get_symbol(&mut sf, val, false);
                }
            } else {
                if !self.is_alphabetic_sym(val) && sf.is_empty() {
                    if is_space_sym(val) {
                        match self.blankqueue.pop_front() {
                            Some(blank) => output.write_all(blank.as_bytes())?,
                            None => write_char(output, sym_char(val).unwrap_or(' '))?,
                        }
                    } else {
                        if self.is_escaped_sym(val) {
                            write_char(output, '\\')?;
                        }
                        if let Some(c) = sym_char(val) {
                            write_char(output, c)?;
                        }
                    }
                } else if last_postblank {
                    let committed =
                        char_len(&sf).saturating_sub(self.input_buffer.diff_prev_pos(last));
                    let sf_committed = char_prefix(&sf, committed);
                    let lf_out = std::mem::take(&mut lf);
                    self.print_word_pop_blank(&sf_committed, &lf_out, output)?;
                    write_char(output, ' ')?;
                    self.input_buffer.set_pos(last);
                    self.input_buffer.back(1);
                } else if last_preblank {
                    let committed =
                        char_len(&sf).saturating_sub(self.input_buffer.diff_prev_pos(last));
                    let sf_committed = char_prefix(&sf, committed);
                    let lf_out = std::mem::take(&mut lf);
                    write_char(output, ' ')?;
                    self.print_word_pop_blank(&sf_committed, &lf_out, output)?;
                    self.input_buffer.set_pos(last);
                    self.input_buffer.back(1);
                } else if last_incond {
                    let committed =
                        char_len(&sf).saturating_sub(self.input_buffer.diff_prev_pos(last));
                    let sf_committed = char_prefix(&sf, committed);
                    let lf_out = std::mem::take(&mut lf);
                    self.print_word_pop_blank(&sf_committed, &lf_out, output)?;
                    self.input_buffer.set_pos(last);
                    self.input_buffer.back(1);
                } else if self.is_alphabetic_sym(val)
                    && (char_len(&sf).saturating_sub(self.input_buffer.diff_prev_pos(last))
                        > self.last_blank(&sf)
                        || lf.is_empty())
                {
                    // unknown word: keep consuming alphabetic symbols
                    loop {
                        self.alphabet.get_symbol(&mut sf, val, false);
                        val = self.read_analysis(input)?;
                        if val == 0 || !self.is_alphabetic_sym(val) {
                            break;
                        }
                    }
                    self.flush_unmatched(&sf, output)?;
                } else if lf.is_empty() {
                    self.flush_unmatched(&sf, output)?;
                } else {
                    let committed =
                        char_len(&sf).saturating_sub(self.input_buffer.diff_prev_pos(last));
                    let sf_committed = char_prefix(&sf, committed);
                    let lf_out = std::mem::take(&mut lf);
                    self.print_word_pop_blank(&sf_committed, &lf_out, output)?;
                    self.input_buffer.set_pos(last);
                    self.input_buffer.back(1);
                }

                if val == 0 && !self.input_buffer.is_empty() {
                    self.input_buffer.set_pos(last + 1);
                }

                current_state = self.initial_state.clone();
                lf.clear();
                sf.clear();
                last_incond = false;
                last_postblank = false;
                last_preblank = false;
            }

            if val == 0 {
                break;
            }
        }

        self.flush_blanks(output)
    }

    /// One stepping move, with diacritic restoration and case folding.
    pub(crate) fn analysis_step(&mut self, current_state: &mut morfo_fst::state::State, val: i32) {
        let restore = if self.settings.use_restore_chars {
            sym_char(val).and_then(|c| self.rcx_map.get(&c).cloned().map(|set| (c, set)))
        } else {
            None
        };

        match restore {
            Some((c, mut substitutes)) => {
                if !is_upper_sym(val) || self.settings.case_sensitive {
                    current_state.step_set(&self.nodes, val, &substitutes);
                } else {
                    let lower = morfo_core::character::to_lower(c);
                    substitutes.insert(lower as i32);
                    if let Some(lower_set) = self.rcx_map.get(&lower) {
                        substitutes.extend(lower_set.iter().copied());
                    }
                    current_state.step_set(&self.nodes, val, &substitutes);
                }
            }
            None => {
                if !is_upper_sym(val) || self.settings.case_sensitive {
                    current_state.step(&self.nodes, val);
                } else {
                    current_state.step_pair(&self.nodes, val, lower_sym(val));
                }
            }
        }
    }

    /// A token the dictionary does not cover: split it at the first
    /// non-alphabetic character, rewind the rest, and emit the unknown
    /// word (or its compound decomposition when enabled).
    fn flush_unmatched<W: Write>(&mut self, sf: &str, output: &mut W) -> Result<(), ProcError> {
        let size = char_len(sf);
        let limit = self.first_not_alpha(sf).unwrap_or(size);
        if limit == 0 {
            self.input_buffer.back(size);
            let head = char_prefix(sf, 1);
            self.write_escaped(&head, output)
        } else {
            self.input_buffer.back(1 + (size - limit));
            let unknown_word = char_prefix(sf, limit);
            if self.do_decomposition {
                let (firstupper, uppercase) = self.case_flags(sf);
                let compound = self.compound_analysis(&unknown_word, uppercase, firstupper);
                if !compound.is_empty() {
                    return self.print_word(&unknown_word, &compound, output);
                }
            }
            self.print_unknown_word(&unknown_word, output)
        }
    }
}
