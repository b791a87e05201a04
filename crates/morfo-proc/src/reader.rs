// Mode-specific stream readers: each turns raw characters into the
// symbol ids the drivers step on, with escape handling, bracket-block
// capture and pushback buffering.

use std::io::{BufRead, Write};

use crate::processor::{write_char, FstProcessor};
use crate::text::TextReader;
use crate::ProcError;

/// One token of the translation-memory reader. A digit run is collapsed
/// into the `<n>` symbol and its literal text queued on `numbers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TmToken {
    End,
    Sym(i32),
    DigitRun(i32),
}

impl FstProcessor {
    /// Read the character after a backslash. End of stream here is a
    /// malformed escape.
    pub(crate) fn read_escaped<R: BufRead>(
        &mut self,
        input: &mut TextReader<R>,
    ) -> Result<char, ProcError> {
        input.get()?.ok_or(ProcError::StreamMalformed)
    }

    /// Read a `delim1 ... delim2` block verbatim, honoring backslash
    /// escapes, delimiters included. `delim1` has already been consumed.
    pub(crate) fn read_full_block<R: BufRead>(
        &mut self,
        input: &mut TextReader<R>,
        delim1: char,
        delim2: char,
    ) -> Result<String, ProcError> {
        let mut result = String::new();
        result.push(delim1);
        let mut c = delim1;

        while c != delim2 {
            match input.get()? {
                None => return Err(ProcError::StreamMalformed),
                Some(ch) => {
                    c = ch;
                    result.push(c);
                    if c == '\\' {
                        let escaped = self.read_escaped(input)?;
                        result.push(escaped);
                    }
                }
            }
        }
        Ok(result)
    }

    /// Read a wordbound blank `[[ ... ]]`; the opening `[[` has already
    /// been consumed.
    pub(crate) fn read_wblank<R: BufRead>(
        &mut self,
        input: &mut TextReader<R>,
    ) -> Result<String, ProcError> {
        let mut result = String::from("[[");
        loop {
            let c = input.get()?.ok_or(ProcError::StreamMalformed)?;
            result.push(c);
            if c == '\\' {
                let escaped = self.read_escaped(input)?;
                result.push(escaped);
            } else if c == ']' {
                let c2 = input.get()?.ok_or(ProcError::StreamMalformed)?;
                result.push(c2);
                if c2 == ']' {
                    return Ok(result);
                }
            }
        }
    }

    /// Post-generation wordbound-blank scan: read forward from an opening
    /// `[[`. A closing `[[/]]` means the whole block carries no `~` and is
    /// echoed through (returns `false`); a `~` right after a closing `]]`
    /// queues the opening blank for the active region (returns `true`).
    pub(crate) fn wblank_postgen<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<bool, ProcError> {
        let mut result = String::from("[[");
        loop {
            let c = input.get()?.ok_or(ProcError::StreamMalformed)?;
            result.push(c);
            if c == '\\' {
                let escaped = self.read_escaped(input)?;
                result.push(escaped);
            } else if c == ']' {
                let c2 = input.get()?.ok_or(ProcError::StreamMalformed)?;
                result.push(c2);
                if c2 == ']' {
                    if result.ends_with("[[/]]") {
                        output.write_all(result.as_bytes())?;
                        return Ok(false);
                    }
                    let c3 = input.get()?.ok_or(ProcError::StreamMalformed)?;
                    if c3 == '~' {
                        self.wblankqueue.push_back(result);
                        return Ok(true);
                    }
                    result.push(c3);
                }
            }
        }
    }

    /// Analysis reader: returns the next symbol id, `0` at end of stream
    /// or NUL. Blanks land on the blank queue; a space id is returned in
    /// their place.
    pub(crate) fn read_analysis<R: BufRead>(
        &mut self,
        input: &mut TextReader<R>,
    ) -> Result<i32, ProcError> {
        if !self.input_buffer.is_empty() {
            return Ok(self.input_buffer.next());
        }

        let Some(mut val) = input.get()? else {
            self.input_buffer.add(0); // treated like the NUL byte
            return Ok(0);
        };

        if (self.settings.use_ignored_chars || self.settings.use_default_ignored_chars)
            && self.ignored_chars.contains(&val)
        {
            // keep the ignored char in the buffer so backtracking
            // replays it, then look at the next one
            self.input_buffer.add(val as i32);
            match input.get()? {
                Some(c) => val = c,
                None => {
                    self.input_buffer.add(0);
                    return Ok(0);
                }
            }
        }

        if self.escaped_chars.contains(&val) {
            match val {
                '<' => {
                    let block = self.read_full_block(input, '<', '>')?;
                    let altval = self.alphabet.symbol_id(&block);
                    self.input_buffer.add(altval);
                    Ok(altval)
                }
                '[' => {
                    match input.get()? {
                        Some('[') => {
                            let wblank = self.read_wblank(input)?;
                            self.blankqueue.push_back(wblank);
                        }
                        Some(c) => {
                            input.unget(c);
                            let blank = self.read_full_block(input, '[', ']')?;
                            self.blankqueue.push_back(blank);
                        }
                        None => return Err(ProcError::StreamMalformed),
                    }
                    self.input_buffer.add(' ' as i32);
                    Ok(' ' as i32)
                }
                '\\' => {
                    let c = self.read_escaped(input)?;
                    self.input_buffer.add(c as i32);
                    Ok(c as i32)
                }
                _ => Err(ProcError::StreamMalformed),
            }
        } else {
            if val == ' ' {
                self.blankqueue.push_back(" ".to_string());
            }
            self.input_buffer.add(val as i32);
            Ok(val as i32)
        }
    }

    /// Translation-memory reader: like [`read_analysis`], plus digit runs
    /// collapse into the `<n>` symbol with the literal text queued.
    pub(crate) fn read_tm_analysis<R: BufRead>(
        &mut self,
        input: &mut TextReader<R>,
    ) -> Result<TmToken, ProcError> {
        self.is_last_blank_tm = false;
        if !self.input_buffer.is_empty() {
            let val = self.input_buffer.next();
            let num_sym = self.alphabet.symbol_id("<n>");
            return Ok(if num_sym != 0 && val == num_sym {
                TmToken::DigitRun(val)
            } else {
                TmToken::Sym(val)
            });
        }

        let Some(val) = input.get()? else {
            return Ok(TmToken::End);
        };

        if self.escaped_chars.contains(&val) || val.is_ascii_digit() {
            match val {
                '<' => {
                    let block = self.read_full_block(input, '<', '>')?;
                    let altval = self.alphabet.symbol_id(&block);
                    self.input_buffer.add(altval);
                    Ok(TmToken::Sym(altval))
                }
                '[' => {
                    match input.get()? {
                        Some('[') => {
                            let wblank = self.read_wblank(input)?;
                            self.blankqueue.push_back(wblank);
                        }
                        Some(c) => {
                            input.unget(c);
                            let blank = self.read_full_block(input, '[', ']')?;
                            self.blankqueue.push_back(blank);
                        }
                        None => return Err(ProcError::StreamMalformed),
                    }
                    self.input_buffer.add(' ' as i32);
                    self.is_last_blank_tm = true;
                    Ok(TmToken::Sym(' ' as i32))
                }
                '\\' => {
                    let c = self.read_escaped(input)?;
                    self.input_buffer.add(c as i32);
                    Ok(TmToken::Sym(c as i32))
                }
                d if d.is_ascii_digit() => {
                    let mut run = String::new();
                    run.push(d);
                    loop {
                        match input.get()? {
                            Some(c) if c.is_ascii_digit() => run.push(c),
                            Some(c) => {
                                input.unget(c);
                                break;
                            }
                            None => break,
                        }
                    }
                    let num_sym = self.alphabet.intern("<n>");
                    self.input_buffer.add(num_sym);
                    self.numbers.push(run);
                    Ok(TmToken::DigitRun(num_sym))
                }
                _ => Err(ProcError::StreamMalformed),
            }
        } else {
            self.input_buffer.add(val as i32);
            Ok(TmToken::Sym(val as i32))
        }
    }

    /// Post-generation reader (also used by inter-generation and
    /// transliteration): raw text with bracket blocks captured; returns
    /// `0` at end of stream or NUL.
    pub(crate) fn read_postgeneration<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<i32, ProcError> {
        if !self.input_buffer.is_empty() {
            return Ok(self.input_buffer.next());
        }

        self.is_wblank = false;
        let Some(val) = input.get()? else {
            return Ok(0);
        };

        match val {
            '<' => {
                let block = self.read_full_block(input, '<', '>')?;
                let altval = self.alphabet.symbol_id(&block);
                self.input_buffer.add(altval);
                Ok(altval)
            }
            '[' => match input.get()? {
                Some('[') => {
                    if self.collect_wblanks {
                        let wblank = self.read_wblank(input)?;
                        self.wblankqueue.push_back(wblank);
                        self.is_wblank = true;
                        Ok(' ' as i32)
                    } else if self.wblank_postgen(input, output)? {
                        Ok('~' as i32)
                    } else {
                        self.is_wblank = true;
                        Ok(' ' as i32)
                    }
                }
                Some(c) => {
                    input.unget(c);
                    let blank = self.read_full_block(input, '[', ']')?;
                    self.blankqueue.push_back(blank);
                    self.input_buffer.add(' ' as i32);
                    Ok(' ' as i32)
                }
                None => Err(ProcError::StreamMalformed),
            },
            '\\' => {
                let c = self.read_escaped(input)?;
                self.input_buffer.add(c as i32);
                Ok(c as i32)
            }
            _ => {
                self.input_buffer.add(val as i32);
                Ok(val as i32)
            }
        }
    }

    /// Copy the stream through verbatim until `target` (exclusive),
    /// keeping escapes paired and flushing at NUL under null-flush.
    pub(crate) fn skip_until<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
        target: char,
    ) -> Result<(), ProcError> {
        loop {
            let Some(val) = input.get()? else {
                return Ok(());
            };
            match val {
                '\\' => {
                    let Some(c) = input.get()? else {
                        return Ok(());
                    };
                    write_char(output, '\\')?;
                    write_char(output, c)?;
                }
                '\0' => {
                    write_char(output, '\0')?;
                    if self.null_flush_generation {
                        output.flush()?;
                    }
                }
                c if c == target => return Ok(()),
                c => write_char(output, c)?,
            }
        }
    }

    /// Generation reader: `^...$` framing with out-of-word passthrough.
    /// `None` at end of stream.
    pub(crate) fn read_generation<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<Option<i32>, ProcError> {
        let Some(mut val) = input.get()? else {
            return Ok(None);
        };

        if self.out_of_word {
            if val == '^' {
                match input.get()? {
                    Some(c) => val = c,
                    None => return Ok(None),
                }
            } else if val == '\\' {
                write_char(output, val)?;
                let Some(c) = input.get()? else {
                    return Ok(None);
                };
                write_char(output, c)?;
                self.skip_until(input, output, '^')?;
                match input.get()? {
                    Some(c) => val = c,
                    None => return Ok(None),
                }
            } else {
                write_char(output, val)?;
                self.skip_until(input, output, '^')?;
                match input.get()? {
                    Some(c) => val = c,
                    None => return Ok(None),
                }
            }
            self.out_of_word = false;
        }

        match val {
            '\\' => {
                let c = self.read_escaped(input)?;
                Ok(Some(c as i32))
            }
            '$' => {
                self.out_of_word = true;
                Ok(Some('$' as i32))
            }
            '<' => {
                let mut block = String::from("<");
                loop {
                    let c = input.get()?.ok_or(ProcError::StreamMalformed)?;
                    block.push(c);
                    if c == '>' {
                        break;
                    }
                }
                Ok(Some(self.alphabet.symbol_id(&block)))
            }
            '[' => {
                match input.get()? {
                    Some('[') => {
                        let wblank = self.read_wblank(input)?;
                        output.write_all(wblank.as_bytes())?;
                    }
                    Some(c) => {
                        input.unget(c);
                        let blank = self.read_full_block(input, '[', ']')?;
                        output.write_all(blank.as_bytes())?;
                    }
                    None => return Err(ProcError::StreamMalformed),
                }
                self.read_generation(input, output)
            }
            c => Ok(Some(c as i32)),
        }
    }

    /// Bilingual reader: like the generation reader, but an unknown tag
    /// comes back as its literal spelling together with symbol id 0.
    pub(crate) fn read_bilingual<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
    ) -> Result<(String, Option<i32>), ProcError> {
        loop {
            let Some(mut val) = input.get()? else {
                return Ok((String::new(), None));
            };

            if self.out_of_word {
                if val == '^' {
                    match input.get()? {
                        Some(c) => val = c,
                        None => return Ok((String::new(), None)),
                    }
                } else if val == '\\' {
                    write_char(output, val)?;
                    let Some(c) = input.get()? else {
                        return Ok((String::new(), None));
                    };
                    write_char(output, c)?;
                    self.skip_until(input, output, '^')?;
                    match input.get()? {
                        Some(c) => val = c,
                        None => return Ok((String::new(), None)),
                    }
                } else {
                    write_char(output, val)?;
                    self.skip_until(input, output, '^')?;
                    match input.get()? {
                        Some(c) => val = c,
                        None => return Ok((String::new(), None)),
                    }
                }
                self.out_of_word = false;
            }

            match val {
                '\\' => {
                    let c = self.read_escaped(input)?;
                    return Ok((String::new(), Some(c as i32)));
                }
                '$' => {
                    self.out_of_word = true;
                    return Ok((String::new(), Some('$' as i32)));
                }
                '<' => {
                    let mut block = String::from("<");
                    loop {
                        let c = input.get()?.ok_or(ProcError::StreamMalformed)?;
                        block.push(c);
                        if c == '>' {
                            break;
                        }
                    }
                    let res = self.alphabet.symbol_id(&block);
                    let symbol = if res == 0 { block } else { String::new() };
                    return Ok((symbol, Some(res)));
                }
                '[' => {
                    match input.get()? {
                        Some('[') => {
                            let wblank = self.read_wblank(input)?;
                            output.write_all(wblank.as_bytes())?;
                        }
                        Some(c) => {
                            input.unget(c);
                            let blank = self.read_full_block(input, '[', ']')?;
                            output.write_all(blank.as_bytes())?;
                        }
                        None => return Err(ProcError::StreamMalformed),
                    }
                    // bracket blocks are passthrough; read the next symbol
                    continue;
                }
                c => return Ok((String::new(), Some(c as i32))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc_with_tags(tags: &[&str]) -> FstProcessor {
        let mut p = FstProcessor::new();
        for t in tags {
            p.alphabet.intern(t);
        }
        p
    }

    fn reader(s: &str) -> TextReader<&[u8]> {
        TextReader::new(s.as_bytes())
    }

    #[test]
    fn analysis_plain_chars() {
        let mut p = FstProcessor::new();
        let mut input = reader("ab");
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'a' as i32);
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'b' as i32);
        assert_eq!(p.read_analysis(&mut input).unwrap(), 0);
    }

    #[test]
    fn analysis_space_queues_marker() {
        let mut p = FstProcessor::new();
        let mut input = reader("a b");
        p.read_analysis(&mut input).unwrap();
        assert_eq!(p.read_analysis(&mut input).unwrap(), ' ' as i32);
        assert_eq!(p.blankqueue.front().map(String::as_str), Some(" "));
    }

    #[test]
    fn analysis_bracket_blank() {
        let mut p = FstProcessor::new();
        let mut input = reader("[<b>]x");
        assert_eq!(p.read_analysis(&mut input).unwrap(), ' ' as i32);
        assert_eq!(p.blankqueue.front().map(String::as_str), Some("[<b>]"));
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'x' as i32);
    }

    #[test]
    fn analysis_wordbound_blank() {
        let mut p = FstProcessor::new();
        let mut input = reader("[[t:i]]x");
        assert_eq!(p.read_analysis(&mut input).unwrap(), ' ' as i32);
        assert_eq!(p.blankqueue.front().map(String::as_str), Some("[[t:i]]"));
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'x' as i32);
    }

    #[test]
    fn analysis_tag_symbol() {
        let mut p = proc_with_tags(&["<n>"]);
        let mut input = reader("<n>");
        let id = p.read_analysis(&mut input).unwrap();
        assert_eq!(id, p.alphabet.symbol_id("<n>"));
        assert!(id < 0);
    }

    #[test]
    fn analysis_escape() {
        let mut p = FstProcessor::new();
        let mut input = reader("\\^a");
        assert_eq!(p.read_analysis(&mut input).unwrap(), '^' as i32);
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'a' as i32);
    }

    #[test]
    fn analysis_trailing_backslash_is_malformed() {
        let mut p = FstProcessor::new();
        let mut input = reader("\\");
        let err = p.read_analysis(&mut input).unwrap_err();
        assert!(matches!(err, ProcError::StreamMalformed));
        assert_eq!(err.to_string(), "Malformed input stream.");
    }

    #[test]
    fn analysis_unterminated_bracket_is_malformed() {
        let mut p = FstProcessor::new();
        let mut input = reader("[abc");
        assert!(matches!(
            p.read_analysis(&mut input),
            Err(ProcError::StreamMalformed)
        ));
    }

    #[test]
    fn analysis_ignored_char_is_buffered() {
        let mut p = FstProcessor::new();
        let mut input = reader("a\u{00AD}b");
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'a' as i32);
        // the soft hyphen is skipped but recorded for backtracking
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'b' as i32);
        p.input_buffer.back(2);
        assert_eq!(p.read_analysis(&mut input).unwrap(), 0xAD);
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'b' as i32);
    }

    #[test]
    fn analysis_replays_from_buffer() {
        let mut p = FstProcessor::new();
        let mut input = reader("xy");
        p.read_analysis(&mut input).unwrap();
        p.read_analysis(&mut input).unwrap();
        p.input_buffer.back(2);
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'x' as i32);
        assert_eq!(p.read_analysis(&mut input).unwrap(), 'y' as i32);
    }

    #[test]
    fn tm_digit_run() {
        let mut p = FstProcessor::new();
        let mut input = reader("12 ");
        let tok = p.read_tm_analysis(&mut input).unwrap();
        let n = p.alphabet.symbol_id("<n>");
        assert_eq!(tok, TmToken::DigitRun(n));
        assert_eq!(p.numbers, vec!["12".to_string()]);
        // the run was collapsed; next read is the space
        assert_eq!(p.read_tm_analysis(&mut input).unwrap(), TmToken::Sym(' ' as i32));
    }

    #[test]
    fn tm_digit_run_replay_keeps_kind() {
        let mut p = FstProcessor::new();
        let mut input = reader("7x");
        let n = match p.read_tm_analysis(&mut input).unwrap() {
            TmToken::DigitRun(n) => n,
            other => panic!("expected digit run, got {other:?}"),
        };
        p.read_tm_analysis(&mut input).unwrap(); // x
        p.input_buffer.back(2);
        assert_eq!(p.read_tm_analysis(&mut input).unwrap(), TmToken::DigitRun(n));
    }

    #[test]
    fn postgeneration_passthrough_and_blanks() {
        let mut p = FstProcessor::new();
        let mut input = reader("a[b]c");
        let mut out = Vec::new();
        assert_eq!(p.read_postgeneration(&mut input, &mut out).unwrap(), 'a' as i32);
        assert_eq!(p.read_postgeneration(&mut input, &mut out).unwrap(), ' ' as i32);
        assert_eq!(p.blankqueue.front().map(String::as_str), Some("[b]"));
        assert_eq!(p.read_postgeneration(&mut input, &mut out).unwrap(), 'c' as i32);
    }

    #[test]
    fn postgeneration_wblank_without_tilde_echoes() {
        let mut p = FstProcessor::new();
        let mut input = reader("[[t:i]]word[[/]] ");
        let mut out = Vec::new();
        let val = p.read_postgeneration(&mut input, &mut out).unwrap();
        // no '~' after the block: echoed through, space symbol returned
        assert_eq!(val, ' ' as i32);
        assert!(p.is_wblank);
        assert_eq!(String::from_utf8(out).unwrap(), "[[t:i]]word[[/]]");
    }

    #[test]
    fn postgeneration_wblank_with_tilde_activates() {
        let mut p = FstProcessor::new();
        let mut input = reader("[[t:i]]~word[[/]] ");
        let mut out = Vec::new();
        let val = p.read_postgeneration(&mut input, &mut out).unwrap();
        assert_eq!(val, '~' as i32);
        assert_eq!(p.wblankqueue.front().map(String::as_str), Some("[[t:i]]"));
    }

    #[test]
    fn generation_frames_words() {
        let mut p = proc_with_tags(&["<n>"]);
        p.out_of_word = true;
        let mut input = reader("pre^ab<n>$post");
        let mut out = Vec::new();
        let mut symbols = Vec::new();
        while let Some(v) = p.read_generation(&mut input, &mut out).unwrap() {
            symbols.push(v);
            if v == '$' as i32 && p.out_of_word {
                break;
            }
        }
        assert_eq!(
            symbols,
            vec![
                'a' as i32,
                'b' as i32,
                p.alphabet.symbol_id("<n>"),
                '$' as i32
            ]
        );
        assert_eq!(String::from_utf8(out).unwrap(), "pre");
    }

    #[test]
    fn generation_blank_passthrough() {
        let mut p = FstProcessor::new();
        let mut input = reader("^a[b]c$");
        let mut out = Vec::new();
        let mut seen = Vec::new();
        // not out_of_word: first char is '^' handled as plain symbol
        while let Some(v) = p.read_generation(&mut input, &mut out).unwrap() {
            seen.push(v);
            if v == '$' as i32 {
                break;
            }
        }
        assert_eq!(String::from_utf8(out).unwrap(), "[b]");
        assert!(seen.contains(&('a' as i32)));
        assert!(seen.contains(&('c' as i32)));
    }

    #[test]
    fn bilingual_unknown_tag_keeps_spelling() {
        let mut p = proc_with_tags(&["<n>"]);
        let mut input = reader("<xyz>");
        let mut out = Vec::new();
        let (symbol, val) = p.read_bilingual(&mut input, &mut out).unwrap();
        assert_eq!(val, Some(0));
        assert_eq!(symbol, "<xyz>");

        let mut input = reader("<n>");
        let (symbol, val) = p.read_bilingual(&mut input, &mut out).unwrap();
        assert_eq!(val, Some(p.alphabet.symbol_id("<n>")));
        assert_eq!(symbol, "");
    }

    #[test]
    fn skip_until_writes_through() {
        let mut p = FstProcessor::new();
        let mut input = reader("abc\\^def^rest");
        let mut out = Vec::new();
        p.skip_until(&mut input, &mut out, '^').unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "abc\\^def");
        assert_eq!(input.get().unwrap(), Some('r'));
    }
}
