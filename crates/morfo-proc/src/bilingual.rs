// Bilingual transfer driver: look up source-language analyses in a
// bilingual dictionary, re-attaching trailing unmatched tags to every
// target form.

use std::io::{BufRead, Write};

use morfo_core::character::is_upper;

use crate::generation::GenerationMode;
use crate::processor::{char_len, is_space_sym, is_upper_sym, lower_sym, FstProcessor};
use crate::text::TextReader;
use crate::ProcError;

impl FstProcessor {
    /// Stream bilingual lookup over `^...$` frames.
    pub fn bilingual<R: BufRead, W: Write>(
        &mut self,
        input: &mut TextReader<R>,
        output: &mut W,
        mode: GenerationMode,
    ) -> Result<(), ProcError> {
        if self.settings.null_flush {
            self.null_flush_generation = true;
        }

        let mut current_state = self.initial_state.clone();
        let mut sf = String::new(); // source analysis as read
        let mut queue = String::new(); // trailing tags to re-attach
        let mut result = String::new(); // latest bidix lookup
        let mut seentags = false;
        let mut seensurface = false;
        let mut surface = String::new();

        self.out_of_word = false;
        self.skip_until(input, output, '^')?;

        loop {
            let (mut symbol, mut val_opt) = self.read_bilingual(input, output)?;

            if self.settings.biltrans_surface_forms && !seensurface && !self.out_of_word {
                // consume the surface part up to the first '/'
                while let Some(v) = val_opt {
                    if v == '/' as i32 {
                        break;
                    }
                    surface.push_str(&symbol);
                    self.alphabet.get_symbol(&mut surface, v, false);
                    (symbol, val_opt) = self.read_bilingual(input, output)?;
                }
                seensurface = true;
                (symbol, val_opt) = self.read_bilingual(input, output)?;
            }

            let Some(val) = val_opt else { break };

            if val == '$' as i32 && self.out_of_word {
                if !seentags {
                    // no tags at all: only a complete match counts
                    let mut chars = sf.chars();
                    let firstupper = chars.next().is_some_and(is_upper);
                    let uppercase = char_len(&sf) > 1 && chars.next().is_some_and(is_upper);
                    result = current_state.filter_finals(
                        &self.all_finals,
                        &self.alphabet,
                        &self.escaped_chars,
                        &self.finals_format(uppercase, firstupper),
                    );
                }

                if sf.starts_with('*') {
                    if mode == GenerationMode::Clean {
                        let clean = format!("/{}", skip_first(&sf));
                        self.print_word_bilingual(&sf, &clean, output)?;
                    } else {
                        let marked = format!("/{sf}");
                        self.print_word_bilingual(&sf, &marked, output)?;
                    }
                } else if !result.is_empty() {
                    let composed = compose(&result, &queue);
                    self.print_word_bilingual(&sf, &composed, output)?;
                } else if self.settings.biltrans_surface_forms {
                    let missing = format!("/@{surface}");
                    self.print_word_bilingual(&surface, &missing, output)?;
                } else {
                    let missing = format!("/@{sf}");
                    self.print_word_bilingual(&sf, &missing, output)?;
                }

                seensurface = false;
                surface.clear();
                queue.clear();
                result.clear();
                current_state = self.initial_state.clone();
                sf.clear();
                seentags = false;
            } else if is_space_sym(val) && sf.is_empty() {
                // do nothing
            } else if sf.starts_with('*') {
                if self.is_escaped_sym(val) {
                    sf.push('\\');
                }
                self.alphabet.get_symbol(&mut sf, val, false);
                if val == 0 {
                    sf.push_str(&symbol); // unknown tag, kept verbatim
                }
            } else {
                if self.is_escaped_sym(val) {
                    sf.push('\\');
                }
                self.alphabet.get_symbol(&mut sf, val, false);
                if val == 0 {
                    sf.push_str(&symbol);
                }
                if self.alphabet.is_tag(val) || val == 0 {
                    seentags = true;
                }
                if current_state.size() != 0 {
                    if !self.alphabet.is_tag(val)
                        && is_upper_sym(val)
                        && !self.settings.case_sensitive
                    {
                        current_state.step_pair(&self.nodes, val, lower_sym(val));
                    } else {
                        current_state.step(&self.nodes, val);
                    }
                }
                if current_state.is_final(&self.all_finals) {
                    let mut chars = sf.chars();
                    let firstupper = chars.next().is_some_and(is_upper);
                    let uppercase = char_len(&sf) > 1 && chars.next().is_some_and(is_upper);
                    // the tags seen so far were matched, not leftovers
                    queue.clear();
                    result = current_state.filter_finals(
                        &self.all_finals,
                        &self.alphabet,
                        &self.escaped_chars,
                        &self.finals_format(uppercase, firstupper),
                    );
                } else if !result.is_empty() {
                    // a result exists but the analysis continues: trailing
                    // tags accumulate on the queue, re-attached on '$';
                    // a non-tag symbol past this point kills the match
                    if self.alphabet.is_tag(val) {
                        self.alphabet.get_symbol(&mut queue, val, false);
                    } else if val == 0 {
                        queue.push_str(&symbol);
                    } else if current_state.size() == 0 {
                        result.clear();
                    }
                }
            }
        }
        output.flush()?;
        Ok(())
    }

    /// Single-word bilingual lookup. `with_delim` marks an input framed
    /// with `^...$`.
    pub fn biltrans(&self, input_word: &str, with_delim: bool) -> String {
        self.biltrans_with_queue(input_word, with_delim).0
    }

    /// [`biltrans`](Self::biltrans) variant whose historical length guard
    /// lets a match through only for a narrow band of word lengths: long
    /// words are discarded, and so are very short ones (the guard's
    /// unsigned subtraction wraps around for them). Kept for
    /// call-compatibility; prefer [`biltrans`](Self::biltrans).
    pub fn biltransfull(&self, input_word: &str, with_delim: bool) -> String {
        let word: Vec<char> = input_word.chars().collect();
        let (start_point, end_point) = delim_range(&word, with_delim);
        let lookup = match self.biltrans_lookup(&word, with_delim) {
            BiltransOutcome::Passthrough => return input_word.to_string(),
            BiltransOutcome::Missing(result) => return result,
            BiltransOutcome::Found { result, queue, .. } => (result, queue),
        };

        let start_point = if word.get(start_point) == Some(&'=') {
            start_point + 1
        } else {
            start_point
        };
        // `end_point - 3` wraps for short words, making the comparison
        // unconditionally true for them
        if end_point < 3 || start_point < end_point - 3 {
            return "^$".to_string();
        }

        let (result, queue) = lookup;
        finish_with_queue(result, &queue, with_delim)
    }

    /// Single-word lookup returning the composed result and the length in
    /// characters of the re-attached tag queue.
    pub fn biltrans_with_queue(&self, input_word: &str, with_delim: bool) -> (String, usize) {
        let word: Vec<char> = input_word.chars().collect();
        match self.biltrans_lookup(&word, with_delim) {
            BiltransOutcome::Passthrough => (input_word.to_string(), 0),
            BiltransOutcome::Missing(result) => (result, 0),
            BiltransOutcome::Found {
                result,
                queue,
                seentags,
                complete,
            } => {
                if !seentags && !complete {
                    // no tags and no final state: the word is not present
                    return (missing_result(&word, with_delim), 0);
                }
                let queue_len = char_len(&queue);
                (finish_with_queue(result, &queue, with_delim), queue_len)
            }
        }
    }

    /// Single-word lookup that drops the tag queue instead of attaching
    /// it.
    pub fn biltrans_without_queue(&self, input_word: &str, with_delim: bool) -> String {
        let word: Vec<char> = input_word.chars().collect();
        match self.biltrans_lookup(&word, with_delim) {
            BiltransOutcome::Passthrough => input_word.to_string(),
            BiltransOutcome::Missing(result) => result,
            BiltransOutcome::Found { result, .. } => {
                let mut result = result;
                if with_delim {
                    result.push('$');
                }
                result
            }
        }
    }

    /// The shared core of the single-word variants.
    fn biltrans_lookup(&self, word: &[char], with_delim: bool) -> BiltransOutcome {
        let (mut start_point, end_point) = delim_range(word, with_delim);
        if word.is_empty() || start_point > end_point {
            return BiltransOutcome::Passthrough;
        }

        if word[start_point] == '*' {
            return BiltransOutcome::Passthrough;
        }
        let mut mark = false;
        if word[start_point] == '=' {
            start_point += 1;
            mark = true;
        }

        let firstupper = word.get(start_point).copied().is_some_and(is_upper);
        let uppercase = firstupper && word.get(start_point + 1).copied().is_some_and(is_upper);

        let mut current_state = self.initial_state.clone();
        let mut result = String::new();
        let mut queue = String::new();
        let mut seentags = false;

        let mut i = start_point;
        while i <= end_point {
            let mut symbol = String::new();
            let val: i32;

            if word[i] == '\\' {
                i += 1;
                if i > end_point {
                    break;
                }
                val = word[i] as i32;
            } else if word[i] == '<' {
                symbol.push('<');
                let mut j = i + 1;
                while j <= end_point {
                    symbol.push(word[j]);
                    if word[j] == '>' {
                        i = j;
                        break;
                    }
                    j += 1;
                }
                seentags = true;
                val = self.alphabet.symbol_id(&symbol);
            } else {
                val = word[i] as i32;
            }

            if current_state.size() != 0 {
                if !self.alphabet.is_tag(val) && is_upper_sym(val) && !self.settings.case_sensitive
                {
                    current_state.step_pair(&self.nodes, val, lower_sym(val));
                } else {
                    current_state.step(&self.nodes, val);
                }
            }
            if current_state.is_final(&self.all_finals) {
                result = current_state.filter_finals(
                    &self.all_finals,
                    &self.alphabet,
                    &self.escaped_chars,
                    &self.finals_format(uppercase, firstupper),
                );
                result = redelimit(result, mark, with_delim);
            }

            if current_state.size() == 0 {
                if !symbol.is_empty() && !result.is_empty() {
                    queue.push_str(&symbol);
                } else {
                    return BiltransOutcome::Missing(missing_result(word, with_delim));
                }
            }
            i += 1;
        }

        // "complete" means the whole word sits on a final state; partial
        // matches only survive when trailing tags explain the remainder
        let complete = current_state.is_final(&self.all_finals);

        BiltransOutcome::Found {
            result,
            queue,
            seentags,
            complete,
        }
    }
}

enum BiltransOutcome {
    /// `*`-marked unknown word: returned verbatim.
    Passthrough,
    /// Not present in the dictionary: `@`-marked result.
    Missing(String),
    Found {
        result: String,
        queue: String,
        seentags: bool,
        complete: bool,
    },
}

fn delim_range(word: &[char], with_delim: bool) -> (usize, usize) {
    if with_delim {
        (1, word.len().saturating_sub(2))
    } else {
        (0, word.len().saturating_sub(1))
    }
}

/// Turn a `/...` filtered-finals string into the delimited result form.
fn redelimit(result: String, mark: bool, with_delim: bool) -> String {
    let body = match result.char_indices().nth(1) {
        Some((idx, _)) => &result[idx..],
        None => "",
    };
    match (with_delim, mark) {
        (true, true) => format!("^={body}"),
        (true, false) => format!("^{body}"),
        (false, true) => format!("={body}"),
        (false, false) => body.to_string(),
    }
}

fn missing_result(word: &[char], with_delim: bool) -> String {
    let rest: String = word.iter().skip(1).collect();
    let whole: String = word.iter().collect();
    if with_delim {
        format!("^@{rest}")
    } else {
        format!("@{whole}")
    }
}

/// Splice the queue into the result before every `/` and at the tail.
fn finish_with_queue(result: String, queue: &str, with_delim: bool) -> String {
    if queue.is_empty() {
        let mut result = result;
        if with_delim {
            result.push('$');
        }
        return result;
    }

    let chars: Vec<char> = result.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                out.push('\\');
                i += 1;
                if i < chars.len() {
                    out.push(chars[i]);
                }
            }
            '/' => {
                out.push_str(queue);
                out.push('/');
            }
            c => out.push(c),
        }
        i += 1;
    }
    out.push_str(queue);
    if with_delim {
        out.push('$');
    }
    out
}

/// Splice the queue into a stream-driver lexforms string: before every
/// `/`, and at the tail.
pub(crate) fn compose(lexforms: &str, queue: &str) -> String {
    let chars: Vec<char> = lexforms.chars().collect();
    let mut out = String::new();
    let mut i = 1;
    while i < chars.len() {
        if chars[i] == '\\' {
            out.push('\\');
            i += 1;
            if i < chars.len() {
                out.push(chars[i]);
            }
        } else if chars[i] == '/' {
            out.push_str(queue);
            out.push('/');
        } else {
            out.push(chars[i]);
        }
        i += 1;
    }
    format!("/{out}{queue}")
}

fn skip_first(s: &str) -> &str {
    match s.char_indices().nth(1) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_attaches_queue_everywhere() {
        assert_eq!(compose("/gato<n>", "<pl>"), "/gato<n><pl>");
        assert_eq!(
            compose("/gato<n>/perro<n>", "<pl>"),
            "/gato<n><pl>/perro<n><pl>"
        );
    }

    #[test]
    fn compose_keeps_escapes() {
        assert_eq!(compose("/a\\/b", "<x>"), "/a\\/b<x>");
    }

    #[test]
    fn finish_with_queue_delimited() {
        assert_eq!(
            finish_with_queue("^gato<n>".to_string(), "<pl>", true),
            "^gato<n><pl>$"
        );
        assert_eq!(
            finish_with_queue("^a/b".to_string(), "<q>", true),
            "^a<q>/b<q>$"
        );
        assert_eq!(finish_with_queue("^x".to_string(), "", true), "^x$");
    }
}
