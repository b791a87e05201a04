// Generation driver: `^lemma<tags>$` frames in, surface forms out.

use std::io::{BufRead, Write};

use morfo_fst::state::State;

use crate::processor::{
    char_len, is_space_sym, is_upper_sym, lower_sym, remove_tags, write_char, FstProcessor,
};
use crate::text::TextReader;
use crate::ProcError;

/// What the generator does with each token class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Strip every marker and every unmatched tag.
    Clean,
    /// Keep `*`-marked unknown words verbatim; `#`-mark generation gaps.
    Unknown,
    /// Keep everything verbatim, markers included.
    All,
    /// Emit `^surface/lexical$` pairs for matched words.
    Tagged,
    /// Like `Tagged`, with non-matched words framed too.
    TaggedNm,
    /// Prefer exact-case matches before falling back to lowercase.
    CarefulCase,
}

impl FstProcessor {
    /// Surface generation over a `^...$`-framed stream. Out-of-word text
    /// passes through verbatim.
    pub fn generation<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
        mode: GenerationMode,
    ) -> Result<(), ProcError> {
        if self.settings.null_flush {
            self.null_flush_generation = true;
        }

        let mut current_state = self.initial_state.clone();
        let mut sf = String::new();

        self.out_of_word = false;
        self.skip_until(input, output, '^')?;

        while let Some(read) = self.read_generation(input, output)? {
            let mut val = read;
            if sf.is_empty() && val == '=' as i32 {
                write_char(output, '=')?;
                match self.read_generation(input, output)? {
                    Some(v) => val = v,
                    None => break,
                }
            }

            if val == '$' as i32 && self.out_of_word {
                self.emit_generated(&current_state, &sf, mode, output)?;
                current_state = self.initial_state.clone();
                sf.clear();
            } else if is_space_sym(val) && sf.is_empty() {
                // leading whitespace inside a frame is dropped
            } else if sf.starts_with('*') || sf.starts_with('%') {
                self.alphabet.get_symbol(&mut sf, val, false);
            } else {
                self.alphabet.get_symbol(&mut sf, val, false);
                if current_state.size() > 0 {
                    if !self.alphabet.is_tag(val)
                        && is_upper_sym(val)
                        && !self.settings.case_sensitive
                    {
                        if mode == GenerationMode::CarefulCase {
                            current_state.step_careful(&self.nodes, val, lower_sym(val));
                        } else {
                            current_state.step_pair(&self.nodes, val, lower_sym(val));
                        }
                    } else {
                        current_state.step(&self.nodes, val);
                    }
                }
            }
        }
        output.flush()?;
        Ok(())
    }

    /// Emit one completed frame according to the mode table: the token's
    /// first character (`*`/`%`/`@`) and match status select the
    /// strategy.
    fn emit_generated<W: Write>(
        &mut self,
        current_state: &State,
        sf: &str,
        mode: GenerationMode,
        output: &mut W,
    ) -> Result<(), ProcError> {
        use GenerationMode::*;

        if sf.starts_with('*') || sf.starts_with('%') {
            // unknown word, never analyzed
            match mode {
                Clean => self.write_escaped(skip_first(sf), output)?,
                TaggedNm => {
                    write_char(output, '^')?;
                    self.write_escaped(&remove_tags(skip_first(sf)), output)?;
                    write_char(output, '/')?;
                    self.write_escaped_with_tags(sf, output)?;
                    write_char(output, '$')?;
                }
                _ => self.write_escaped(sf, output)?,
            }
        } else if sf.starts_with('@') {
            // analyzed but missing from the bilingual dictionary
            match mode {
                All => self.write_escaped(sf, output)?,
                Clean => self.write_escaped(&remove_tags(skip_first(sf)), output)?,
                Unknown | Tagged => self.write_escaped(&remove_tags(sf), output)?,
                TaggedNm => {
                    write_char(output, '^')?;
                    self.write_escaped(&remove_tags(skip_first(sf)), output)?;
                    write_char(output, '/')?;
                    self.write_escaped_with_tags(sf, output)?;
                    write_char(output, '$')?;
                }
                CarefulCase => {}
            }
        } else if current_state.is_final(&self.all_finals) {
            let (firstupper, uppercase) = if self.settings.dictionary_case {
                (false, false)
            } else {
                let mut chars = sf.chars();
                let first = chars.next();
                let second = chars.next();
                (
                    first.is_some_and(morfo_core::character::is_upper),
                    char_len(sf) > 1 && second.is_some_and(morfo_core::character::is_upper),
                )
            };

            if mode == Tagged || mode == TaggedNm {
                write_char(output, '^')?;
            }
            let lf = current_state.filter_finals(
                &self.all_finals,
                &self.alphabet,
                &self.escaped_chars,
                &self.finals_format(uppercase, firstupper),
            );
            output.write_all(skip_first(&lf).as_bytes())?;
            if mode == Tagged || mode == TaggedNm {
                write_char(output, '/')?;
                self.write_escaped_with_tags(sf, output)?;
                write_char(output, '$')?;
            }
        } else {
            // analyzed, present in the dictionary chain, but the
            // generator has no path for it
            match mode {
                All => {
                    write_char(output, '#')?;
                    self.write_escaped(sf, output)?;
                }
                Clean => self.write_escaped(&remove_tags(sf), output)?,
                Unknown => {
                    if !sf.is_empty() {
                        write_char(output, '#')?;
                        self.write_escaped(&remove_tags(sf), output)?;
                    }
                }
                Tagged => {
                    write_char(output, '#')?;
                    self.write_escaped(&remove_tags(sf), output)?;
                }
                TaggedNm => {
                    write_char(output, '^')?;
                    self.write_escaped(&remove_tags(sf), output)?;
                    write_char(output, '/')?;
                    write_char(output, '#')?;
                    self.write_escaped_with_tags(sf, output)?;
                    write_char(output, '$')?;
                }
                CarefulCase => {}
            }
        }
        Ok(())
    }
}

/// Skip the first character of a string (the marker byte).
fn skip_first(s: &str) -> &str {
    match s.char_indices().nth(1) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}
