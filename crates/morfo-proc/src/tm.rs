// Translation-memory analysis driver: longest fuzzy units committed at
// punctuation, with digit runs and blanks reinjected into the output.

use std::io::{BufRead, Write};

use crate::processor::{
    char_len, is_punct_sym, is_space_sym, is_upper_sym, lower_sym, sym_char, write_char,
    FstProcessor,
};
use crate::reader::TmToken;
use crate::text::TextReader;
use crate::ProcError;

impl FstProcessor {
    /// Translation-memory analysis: match units against the TM
    /// transducer, emitting `[target]` blocks for matches and the source
    /// text verbatim otherwise.
    pub fn tm_analysis<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        let mut current_state = self.initial_state.clone();
        let mut lf = String::new();
        let mut sf = String::new();
        let mut last = 0usize;

        loop {
            let mut tok = self.read_tm_analysis(input)?;
            let mut val = match tok {
                TmToken::End => break,
                TmToken::Sym(v) | TmToken::DigitRun(v) => v,
            };

            // test for final states
            if current_state.is_final(&self.all_finals) {
                if is_punct_sym(val) {
                    let filtered = current_state.filter_finals_tm(
                        &self.all_finals,
                        &self.alphabet,
                        &mut self.blankqueue,
                        &self.numbers,
                    );
                    lf = skip_first_char(&filtered).to_string();
                    last = self.input_buffer.get_pos();
                    self.numbers.clear();
                }
            } else if sf.is_empty() && is_space_sym(val) {
                last = self.input_buffer.get_pos();
            }

            if !is_upper_sym(val) {
                current_state.step(&self.nodes, val);
            } else {
                current_state.step_pair(&self.nodes, val, lower_sym(val));
            }

            if current_state.size() != 0 {
                self.append_tm_symbol(&mut sf, tok, val);
            } else {
                if (is_space_sym(val) || is_punct_sym(val)) && sf.is_empty() {
                    if is_space_sym(val) {
                        self.print_space(sym_char(val).unwrap_or(' '), output)?;
                    } else {
                        if self.is_escaped_sym(val) {
                            write_char(output, '\\')?;
                        }
                        if let Some(c) = sym_char(val) {
                            write_char(output, c)?;
                        }
                    }
                } else if !is_space_sym(val)
                    && !is_punct_sym(val)
                    && (char_len(&sf).saturating_sub(self.input_buffer.diff_prev_pos(last))
                        > self.last_blank(&sf)
                        || lf.is_empty())
                {
                    // unmatched unit: consume up to the next break
                    loop {
                        self.append_tm_symbol(&mut sf, tok, val);
                        tok = self.read_tm_analysis(input)?;
                        val = match tok {
                            TmToken::End => 0,
                            TmToken::Sym(v) | TmToken::DigitRun(v) => v,
                        };
                        if val == 0 || is_space_sym(val) || is_punct_sym(val) {
                            break;
                        }
                    }

                    if val == 0 {
                        output.write_all(sf.as_bytes())?;
                        return Ok(());
                    }

                    self.input_buffer.back(1);
                    output.write_all(sf.as_bytes())?;
                    self.drop_processed_blanks();
                } else if lf.is_empty() {
                    self.input_buffer.back(1);
                    output.write_all(sf.as_bytes())?;
                    self.drop_processed_blanks();
                } else {
                    write_char(output, '[')?;
                    output.write_all(lf.as_bytes())?;
                    write_char(output, ']')?;
                    self.input_buffer.set_pos(last);
                    self.input_buffer.back(1);
                }

                current_state = self.initial_state.clone();
                lf.clear();
                sf.clear();
            }
        }

        self.flush_blanks(output)
    }

    /// Append one TM token to the surface accumulator: digit runs add
    /// their literal text, a blank-space adds the captured blank, and
    /// everything else renders through the alphabet.
    fn append_tm_symbol(&mut self, sf: &mut String, tok: TmToken, val: i32) {
        match tok {
            TmToken::DigitRun(_) => {
                if let Some(n) = self.numbers.last() {
                    sf.push_str(n);
                }
            }
            TmToken::Sym(_) if self.is_last_blank_tm && val == ' ' as i32 => {
                if let Some(b) = self.blankqueue.back() {
                    sf.push_str(b);
                }
            }
            _ => self.alphabet.get_symbol(sf, val, false),
        }
    }

    /// Drop the blanks already folded into the flushed surface text,
    /// keeping the one a just-read bracket blank still owns.
    fn drop_processed_blanks(&mut self) {
        while !self.blankqueue.is_empty() {
            if self.blankqueue.len() == 1 && self.is_last_blank_tm {
                break;
            }
            self.blankqueue.pop_front();
        }
    }
}

fn skip_first_char(s: &str) -> &str {
    match s.char_indices().nth(1) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}
