// Post-generation, inter-generation and transliteration drivers: raw
// text with `~`-activated replacement regions.

use std::io::{BufRead, Write};

use hashbrown::HashSet;
use morfo_core::character::{is_upper, to_lower, to_upper};

use crate::blanks::combine_wblanks;
use crate::processor::{is_punct_sym, is_space_sym, sym_char, write_char, FstProcessor};
use crate::text::TextReader;
use crate::ProcError;

impl FstProcessor {
    /// Post-generation: apply sandhi-style rules at `~` markers. The rule
    /// match may consume the following word's first letters, whose casing
    /// is transferred onto the replacement.
    pub fn postgeneration<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        if self.settings.null_flush {
            return self.wrapped_null_flush(input, output, Self::postgeneration_main);
        }
        self.postgeneration_main(input, output)
    }

    /// Shared null-flush wrapper for the raw-text drivers: process one
    /// segment at a time, emitting NUL and flushing in between.
    pub(crate) fn wrapped_null_flush<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
        driver: fn(&mut Self, &mut TextReader<R>, &mut W) -> Result<(), ProcError>,
    ) -> Result<(), ProcError> {
        self.settings.null_flush = false;
        let result = (|| {
            while !input.at_eof()? {
                driver(self, input, output)?;
                write_char(output, '\0')?;
                output.flush()?;
                self.reset_segment_state();
            }
            Ok(())
        })();
        self.settings.null_flush = true;
        result
    }

    fn postgeneration_main<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        let mut skip_mode = true;
        self.collect_wblanks = false;
        self.need_end_wblank = false;
        let mut current_state = self.initial_state.clone();
        let mut lf = String::new();
        let mut sf = String::new();
        let mut last = 0usize;
        let empty_escaped: HashSet<char> = HashSet::new();

        loop {
            let val = self.read_postgeneration(input, output)?;
            if val == 0 {
                break;
            }

            if val == '~' as i32 {
                skip_mode = false;
                self.collect_wblanks = true;
            }

            if self.is_wblank && skip_mode {
                // a wordbound blank with no ~ inside: already echoed
            } else if skip_mode {
                if is_space_sym(val) {
                    if self.need_end_wblank {
                        output.write_all(b"[[/]]")?;
                        self.need_end_wblank = false;
                    }
                    self.print_space(sym_char(val).unwrap_or(' '), output)?;
                } else {
                    if !self.need_end_wblank {
                        self.flush_wblanks(output)?;
                    }
                    if self.is_escaped_sym(val) {
                        write_char(output, '\\')?;
                    }
                    if let Some(c) = sym_char(val) {
                        write_char(output, c)?;
                    }
                    if self.need_end_wblank {
                        output.write_all(b"[[/]]")?;
                        self.need_end_wblank = false;
                    }
                }
            } else {
                if self.is_wblank {
                    continue;
                }

                // test for final states
                if current_state.is_final(&self.all_finals) {
                    let sfc: Vec<char> = sf.chars().collect();
                    let firstupper = sfc.get(1).copied().is_some_and(is_upper);
                    let uppercase =
                        sfc.len() > 1 && firstupper && sfc.get(2).copied().is_some_and(is_upper);
                    lf = current_state.filter_finals(
                        &self.all_finals,
                        &self.alphabet,
                        &empty_escaped,
                        &self.finals_format(uppercase, firstupper),
                    );
                    lf = recase_replacement_tail(&lf, &sf);
                    last = self.input_buffer.get_pos();
                }

                self.analysis_step(&mut current_state, val);

                if current_state.size() != 0 {
                    self.alphabet.get_symbol(&mut sf, val, false);
                } else {
                    let (final_wblank, need_end) = combine_wblanks(&mut self.wblankqueue);
                    if need_end {
                        self.need_end_wblank = true;
                    }
                    output.write_all(final_wblank.as_bytes())?;

                    if lf.is_empty() {
                        // no rule matched: emit the source up to the next ~
                        let sfc: Vec<char> = sf.chars().collect();
                        let mut mark = sfc.len();
                        let mut space_index = sfc.len();
                        for (i, &c) in sfc.iter().enumerate().skip(1) {
                            if c == '~' {
                                mark = i;
                                break;
                            } else if c == ' ' {
                                space_index = i;
                            }
                        }

                        if space_index != sfc.len() {
                            write_chars(output, &sfc[1..space_index])?;
                            if self.need_end_wblank {
                                output.write_all(b"[[/]]")?;
                                self.need_end_wblank = false;
                                write_char(output, sfc[space_index])?;
                                self.flush_wblanks(output)?;
                            } else {
                                write_char(output, sfc[space_index])?;
                            }
                            write_chars(output, &sfc[space_index + 1..mark])?;
                        } else {
                            self.flush_wblanks(output)?;
                            write_chars(output, &sfc[1..mark])?;
                        }

                        if mark == sfc.len() {
                            self.input_buffer.back(1);
                        } else {
                            self.input_buffer.back(sfc.len() - mark);
                        }
                    } else {
                        // rule matched: the last two symbols of the match
                        // belong to the next word and get reprocessed
                        let lfc: Vec<char> = lf.chars().collect();
                        if lfc.len() >= 3 {
                            write_chars(output, &lfc[1..lfc.len() - 2])?;
                        }
                        self.input_buffer.set_pos(last);
                        self.input_buffer.back(2);
                        if lfc.len() >= 2 {
                            let v = lfc[lfc.len() - 2];
                            if morfo_core::character::is_space(v) {
                                self.print_space(v, output)?;
                            } else {
                                if self.is_escaped(v) {
                                    write_char(output, '\\')?;
                                }
                                write_char(output, v)?;
                            }
                        }
                    }

                    current_state = self.initial_state.clone();
                    lf.clear();
                    sf.clear();
                    skip_mode = true;
                    self.collect_wblanks = false;
                }
            }
        }

        self.flush_blanks(output)
    }

    /// Inter-generation: like post-generation but the fallback emits the
    /// source verbatim and no wordbound blank handling applies.
    pub fn intergeneration<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        if self.settings.null_flush {
            return self.wrapped_null_flush(input, output, Self::intergeneration_main);
        }
        self.intergeneration_main(input, output)
    }

    fn intergeneration_main<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        let mut skip_mode = true;
        let mut current_state = self.initial_state.clone();
        let mut target = String::new();
        let mut source = String::new();
        let mut last = 0usize;
        let empty_escaped: HashSet<char> = HashSet::new();

        loop {
            let val = self.read_postgeneration(input, output)?;

            if val == '~' as i32 {
                skip_mode = false;
            }

            if skip_mode {
                if is_space_sym(val) {
                    self.print_space(sym_char(val).unwrap_or(' '), output)?;
                } else if val != 0 {
                    if self.is_escaped_sym(val) {
                        write_char(output, '\\')?;
                    }
                    if let Some(c) = sym_char(val) {
                        write_char(output, c)?;
                    }
                }
            } else {
                // test for final states
                if current_state.is_final(&self.all_finals) {
                    let srcc: Vec<char> = source.chars().collect();
                    let firstupper = srcc.get(1).copied().is_some_and(is_upper);
                    let uppercase =
                        srcc.len() > 1 && firstupper && srcc.get(2).copied().is_some_and(is_upper);
                    target = current_state.filter_finals(
                        &self.all_finals,
                        &self.alphabet,
                        &empty_escaped,
                        &self.finals_format(uppercase, firstupper),
                    );
                    last = self.input_buffer.get_pos();
                }

                if val != 0 {
                    self.analysis_step(&mut current_state, val);
                }

                if val != 0 && current_state.size() != 0 {
                    self.alphabet.get_symbol(&mut source, val, false);
                } else {
                    if target.is_empty() {
                        // no match
                        if val == 0 {
                            output.write_all(source.as_bytes())?;
                        } else {
                            let srcc: Vec<char> = source.chars().collect();
                            if let Some(&first) = srcc.first() {
                                write_char(output, first)?;
                            }
                            let mut mark = 1;
                            while mark < srcc.len() && srcc[mark] != '~' {
                                write_char(output, srcc[mark])?;
                                mark += 1;
                            }
                            if mark != srcc.len() {
                                self.input_buffer.back(srcc.len() - mark);
                            }
                            if val == '~' as i32 {
                                self.input_buffer.back(1);
                            } else if let Some(c) = sym_char(val) {
                                write_char(output, c)?;
                            }
                        }
                    } else {
                        for c in target.chars().skip(1) {
                            if morfo_core::character::is_space(c) {
                                self.print_space(c, output)?;
                            } else {
                                if self.is_escaped(c) {
                                    write_char(output, '\\')?;
                                }
                                write_char(output, c)?;
                            }
                        }
                        if val != 0 {
                            self.input_buffer.set_pos(last);
                            self.input_buffer.back(1);
                        }
                    }

                    current_state = self.initial_state.clone();
                    target.clear();
                    source.clear();
                    skip_mode = true;
                }
            }

            if val == 0 {
                break;
            }
        }

        self.flush_blanks(output)
    }

    /// Transliteration: longest-match rewriting of raw text, committing
    /// at punctuation and whitespace.
    pub fn transliteration<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        if self.settings.null_flush {
            return self.wrapped_null_flush(input, output, Self::transliteration_main);
        }
        self.transliteration_main(input, output)
    }

    fn transliteration_main<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(), ProcError> {
        let mut current_state = self.initial_state.clone();
        let mut lf = String::new();
        let mut sf = String::new();
        let mut last = 0usize;

        loop {
            let val = self.read_postgeneration(input, output)?;
            if val == 0 {
                break;
            }

            if is_punct_sym(val) || is_space_sym(val) {
                let sfc: Vec<char> = sf.chars().collect();
                let firstupper = sfc.get(1).copied().is_some_and(is_upper);
                let uppercase =
                    sfc.len() > 1 && firstupper && sfc.get(2).copied().is_some_and(is_upper);
                lf = current_state.filter_finals(
                    &self.all_finals,
                    &self.alphabet,
                    &self.escaped_chars,
                    &self.finals_format(uppercase, firstupper),
                );
                if !lf.is_empty() {
                    output.write_all(skip_first_char(&lf).as_bytes())?;
                    current_state = self.initial_state.clone();
                    lf.clear();
                    sf.clear();
                }
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
            } else {
                if current_state.is_final(&self.all_finals) {
                    let sfc: Vec<char> = sf.chars().collect();
                    let firstupper = sfc.get(1).copied().is_some_and(is_upper);
                    let uppercase =
                        sfc.len() > 1 && firstupper && sfc.get(2).copied().is_some_and(is_upper);
                    lf = current_state.filter_finals(
                        &self.all_finals,
                        &self.alphabet,
                        &self.escaped_chars,
                        &self.finals_format(uppercase, firstupper),
                    );
                    last = self.input_buffer.get_pos();
                }

                current_state.step(&self.nodes, val);
                if current_state.size() != 0 {
                    self.alphabet.get_symbol(&mut sf, val, false);
                } else {
                    if !lf.is_empty() {
                        output.write_all(skip_first_char(&lf).as_bytes())?;
                        self.input_buffer.set_pos(last);
                        self.input_buffer.back(1);
                    } else {
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
                    }
                    current_state = self.initial_state.clone();
                    lf.clear();
                    sf.clear();
                }
            }
        }

        self.flush_blanks(output)
    }
}

/// Transfer the casing of the next word's beginning (the trailing
/// alphabetic run of `sf`, consumed by the rule match) onto the tail of
/// the replacement `lf`.
fn recase_replacement_tail(lf: &str, sf: &str) -> String {
    let sfc: Vec<char> = sf.chars().collect();
    let mut next_word = String::new();
    for &c in sfc.iter().rev() {
        if !c.is_alphabetic() {
            break;
        }
        next_word.insert(0, c);
    }
    if next_word.is_empty() {
        return lf.to_string();
    }

    let nwc: Vec<char> = next_word.chars().collect();
    let myfirstupper = is_upper(nwc[0]);
    let myuppercase = nwc.len() > 1 && is_upper(nwc[1]);

    let mut lfc: Vec<char> = lf.chars().collect();
    let len = lfc.len();
    for i in (1..=len).rev() {
        if !lfc[i - 1].is_alphabetic() {
            if i < len {
                if myfirstupper {
                    lfc[i] = to_upper(lfc[i]);
                } else {
                    lfc[i] = to_lower(lfc[i]);
                }
            }
            break;
        } else if myuppercase {
            lfc[i - 1] = to_upper(lfc[i - 1]);
        } else {
            lfc[i - 1] = to_lower(lfc[i - 1]);
        }
    }
    lfc.into_iter().collect()
}

fn write_chars<W: Write>(output: &mut W, chars: &[char]) -> std::io::Result<()> {
    let s: String = chars.iter().collect();
    output.write_all(s.as_bytes())
}

/// Drop the leading `/` of a filtered-finals string.
fn skip_first_char(s: &str) -> &str {
    match s.char_indices().nth(1) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recase_transfers_next_word_capital() {
        // rule consumed "...~ocean" and replaced with "an ocean"; the
        // source's trailing run "Ocean" recases the replacement tail
        let out = recase_replacement_tail("/an ocean", "~un Ocean");
        assert_eq!(out, "/an Ocean");
    }

    #[test]
    fn recase_lowercases_by_default() {
        let out = recase_replacement_tail("/an OCEAN", "~un ocean");
        assert_eq!(out, "/an ocean");
    }

    #[test]
    fn recase_without_alphabetic_tail_is_identity() {
        let out = recase_replacement_tail("/an ocean ", "~un ocean ");
        assert_eq!(out, "/an ocean ");
    }
}
