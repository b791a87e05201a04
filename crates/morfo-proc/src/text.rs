// Incremental UTF-8 character reader with a small pushback ring.

use std::io::{self, BufRead};

/// Character-at-a-time reader over any [`BufRead`].
///
/// Decodes UTF-8 incrementally (a code point split across buffer refills
/// is handled) and supports ungetting up to two characters, which is all
/// the stream readers need: one peek-then-retract for `[[` versus `[`,
/// and one after ordinary lookahead.
pub struct TextReader<R> {
    inner: R,
    pushback: Vec<char>,
}

impl<R: BufRead> TextReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pushback: Vec::with_capacity(2),
        }
    }

    /// Read the next character. `None` at end of stream.
    pub fn get(&mut self) -> io::Result<Option<char>> {
        if let Some(c) = self.pushback.pop() {
            return Ok(Some(c));
        }

        let first = {
            let buf = self.inner.fill_buf()?;
            match buf.first() {
                Some(&b) => b,
                None => return Ok(None),
            }
        };
        self.inner.consume(1);

        let width = match first {
            0x00..=0x7F => return Ok(Some(first as char)),
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(bad_utf8()),
        };

        let mut bytes = [first, 0, 0, 0];
        self.inner.read_exact(&mut bytes[1..width])?;
        match std::str::from_utf8(&bytes[..width]) {
            Ok(s) => Ok(s.chars().next()),
            Err(_) => Err(bad_utf8()),
        }
    }

    /// Push a character back; it is returned by the next `get`.
    pub fn unget(&mut self, c: char) {
        debug_assert!(self.pushback.len() < 2, "pushback ring overflow");
        self.pushback.push(c);
    }

    /// Look at the next character without consuming it.
    pub fn peek(&mut self) -> io::Result<Option<char>> {
        if let Some(&c) = self.pushback.last() {
            return Ok(Some(c));
        }
        match self.get()? {
            Some(c) => {
                self.pushback.push(c);
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    /// True once the stream (and the pushback ring) is exhausted.
    pub fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.peek()?.is_none())
    }
}

fn bad_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8 in input stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(s: &str) -> TextReader<&[u8]> {
        TextReader::new(s.as_bytes())
    }

    #[test]
    fn reads_ascii() {
        let mut r = reader("ab");
        assert_eq!(r.get().unwrap(), Some('a'));
        assert_eq!(r.get().unwrap(), Some('b'));
        assert_eq!(r.get().unwrap(), None);
        assert_eq!(r.get().unwrap(), None); // stable at EOF
    }

    #[test]
    fn reads_multibyte() {
        let mut r = reader("\u{00E4}\u{4E2D}\u{1F600}");
        assert_eq!(r.get().unwrap(), Some('\u{00E4}'));
        assert_eq!(r.get().unwrap(), Some('\u{4E2D}'));
        assert_eq!(r.get().unwrap(), Some('\u{1F600}'));
        assert_eq!(r.get().unwrap(), None);
    }

    #[test]
    fn unget_replays() {
        let mut r = reader("ab");
        let a = r.get().unwrap().unwrap();
        r.unget(a);
        assert_eq!(r.get().unwrap(), Some('a'));
        assert_eq!(r.get().unwrap(), Some('b'));
    }

    #[test]
    fn two_slot_pushback() {
        let mut r = reader("c");
        r.unget('b');
        r.unget('a');
        assert_eq!(r.get().unwrap(), Some('a'));
        assert_eq!(r.get().unwrap(), Some('b'));
        assert_eq!(r.get().unwrap(), Some('c'));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = reader("xy");
        assert_eq!(r.peek().unwrap(), Some('x'));
        assert_eq!(r.peek().unwrap(), Some('x'));
        assert_eq!(r.get().unwrap(), Some('x'));
        assert_eq!(r.get().unwrap(), Some('y'));
    }

    #[test]
    fn at_eof() {
        let mut r = reader("z");
        assert!(!r.at_eof().unwrap());
        r.get().unwrap();
        assert!(r.at_eof().unwrap());
    }

    #[test]
    fn nul_bytes_pass_through() {
        let mut r = TextReader::new(&b"a\0b"[..]);
        assert_eq!(r.get().unwrap(), Some('a'));
        assert_eq!(r.get().unwrap(), Some('\0'));
        assert_eq!(r.get().unwrap(), Some('b'));
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let mut r = TextReader::new(&[0xFFu8][..]);
        assert!(r.get().is_err());
    }

    #[test]
    fn char_split_across_refills() {
        // A BufReader with capacity 1 forces the 2-byte 'ä' to span fills.
        let r = io::BufReader::with_capacity(1, "\u{00E4}x".as_bytes());
        let mut r = TextReader::new(r);
        assert_eq!(r.get().unwrap(), Some('\u{00E4}'));
        assert_eq!(r.get().unwrap(), Some('x'));
    }
}
