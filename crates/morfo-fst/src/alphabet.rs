// Symbol alphabet: multichar symbol strings <-> negative ids, pair-label
// encoding for transition tables, and rendering back to text.

use hashbrown::HashMap;

use crate::compression::{ByteReader, ByteWriter};
use crate::FormatError;

/// Bidirectional symbol table shared by every transducer in a container.
///
/// Ids come in two ranges:
/// - a positive id is a plain character and equals its code point;
/// - a negative id is a multichar symbol such as `<n>`, allocated in
///   interning order (`-1`, `-2`, ...);
/// - `0` is epsilon.
///
/// Transitions in the compiled tables carry *pair labels*: indexes into a
/// table of `(left, right)` id pairs, so that one integer names both sides
/// of a transduction step.
#[derive(Default, Debug)]
pub struct Alphabet {
    /// Multichar symbol string -> negative id.
    symbols: HashMap<String, i32>,
    /// Rendering of multichar id `-(k+1)` at index `k`. May be blanked by
    /// [`set_symbol`](Self::set_symbol).
    renderings: Vec<String>,
    /// `(left, right)` -> pair label.
    pairs: HashMap<(i32, i32), i32>,
    /// Pair label `k` -> `(left, right)`.
    pair_sides: Vec<(i32, i32)>,
}

impl Alphabet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a symbol string, allocating a fresh id on first sight.
    ///
    /// A single-character string is its own id (the code point); only
    /// multichar strings occupy the table.
    pub fn intern(&mut self, symbol: &str) -> i32 {
        let mut it = symbol.chars();
        if let (Some(c), None) = (it.next(), it.clone().next()) {
            return c as i32;
        }
        if let Some(&id) = self.symbols.get(symbol) {
            return id;
        }
        let id = -(self.renderings.len() as i32 + 1);
        self.symbols.insert(symbol.to_string(), id);
        self.renderings.push(symbol.to_string());
        id
    }

    /// Look up a symbol string without interning. Returns `0` for unknown
    /// multichar symbols, which callers treat as "not in this alphabet".
    pub fn symbol_id(&self, symbol: &str) -> i32 {
        let mut it = symbol.chars();
        if let (Some(c), None) = (it.next(), it.clone().next()) {
            return c as i32;
        }
        self.symbols.get(symbol).copied().unwrap_or(0)
    }

    /// Number of interned multichar symbols.
    pub fn multichar_count(&self) -> usize {
        self.renderings.len()
    }

    /// Encode a `(left, right)` id pair into a transition label.
    pub fn encode_pair(&mut self, left: i32, right: i32) -> i32 {
        if let Some(&label) = self.pairs.get(&(left, right)) {
            return label;
        }
        let label = self.pair_sides.len() as i32;
        self.pairs.insert((left, right), label);
        self.pair_sides.push((left, right));
        label
    }

    /// Decode a transition label back into its `(left, right)` ids.
    pub fn decode_pair(&self, label: i32) -> Result<(i32, i32), FormatError> {
        self.pair_sides
            .get(label as usize)
            .copied()
            .ok_or(FormatError::BadPairLabel {
                label: label as u32,
            })
    }

    /// True iff the id renders as a `<...>` tag. Only multichar ids can be
    /// tags; a blanked control symbol stops being one.
    pub fn is_tag(&self, id: i32) -> bool {
        if id >= 0 {
            return false;
        }
        match self.renderings.get((-id - 1) as usize) {
            Some(s) => s.starts_with('<') && s.ends_with('>'),
            None => false,
        }
    }

    /// Append the rendering of `id` to `out`.
    ///
    /// Positive ids append their character, uppercased when `uppercase` is
    /// set; negative ids append the stored symbol string; epsilon appends
    /// nothing.
    pub fn get_symbol(&self, out: &mut String, id: i32, uppercase: bool) {
        if id == 0 {
            return;
        }
        if id < 0 {
            if let Some(s) = self.renderings.get((-id - 1) as usize) {
                out.push_str(s);
            }
            return;
        }
        if let Some(c) = char::from_u32(id as u32) {
            if uppercase {
                out.push(morfo_core::character::to_upper(c));
            } else {
                out.push(c);
            }
        }
    }

    /// Replace the rendering of a multichar id. Used to blank out control
    /// symbols so they disappear from emitted lexical forms.
    pub fn set_symbol(&mut self, id: i32, rendering: &str) {
        if id < 0 {
            if let Some(slot) = self.renderings.get_mut((-id - 1) as usize) {
                *slot = rendering.to_string();
            }
        }
    }

    /// Parse an alphabet body: multichar symbol table, then pair table.
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let mut alphabet = Alphabet::new();

        let symbol_count = reader.read_uvarint()?;
        for _ in 0..symbol_count {
            let char_count = reader.read_uvarint()?;
            let mut symbol = String::new();
            for _ in 0..char_count {
                symbol.push(reader.read_char()?);
            }
            let id = -(alphabet.renderings.len() as i32 + 1);
            alphabet.symbols.insert(symbol.clone(), id);
            alphabet.renderings.push(symbol);
        }

        let pair_count = reader.read_uvarint()?;
        for _ in 0..pair_count {
            let left = reader.read_ivarint()?;
            let right = reader.read_ivarint()?;
            let label = alphabet.pair_sides.len() as i32;
            alphabet.pairs.insert((left, right), label);
            alphabet.pair_sides.push((left, right));
        }

        Ok(alphabet)
    }

    /// Serialize in the layout [`read`](Self::read) expects. Symbols are
    /// written in interning order so ids survive the round trip.
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_uvarint(self.renderings.len() as u32);
        for symbol in &self.renderings {
            writer.write_uvarint(symbol.chars().count() as u32);
            for c in symbol.chars() {
                writer.write_char(c);
            }
        }
        writer.write_uvarint(self.pair_sides.len() as u32);
        for &(left, right) in &self.pair_sides {
            writer.write_ivarint(left);
            writer.write_ivarint(right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chars_are_their_code_points() {
        let mut a = Alphabet::new();
        assert_eq!(a.intern("x"), 'x' as i32);
        assert_eq!(a.intern("\u{00E4}"), 0xE4);
        assert_eq!(a.symbol_id("x"), 'x' as i32);
    }

    #[test]
    fn multichar_symbols_get_negative_ids() {
        let mut a = Alphabet::new();
        let n = a.intern("<n>");
        let pl = a.intern("<pl>");
        assert_eq!(n, -1);
        assert_eq!(pl, -2);
        // idempotent
        assert_eq!(a.intern("<n>"), -1);
        assert_eq!(a.symbol_id("<pl>"), -2);
        assert_eq!(a.symbol_id("<missing>"), 0);
    }

    #[test]
    fn tag_predicate() {
        let mut a = Alphabet::new();
        let n = a.intern("<n>");
        let odd = a.intern("{w}");
        assert!(a.is_tag(n));
        assert!(!a.is_tag(odd));
        assert!(!a.is_tag('a' as i32));
        assert!(!a.is_tag(0));
    }

    #[test]
    fn pair_encoding_is_injective() {
        let mut a = Alphabet::new();
        let n = a.intern("<n>");
        let p1 = a.encode_pair('a' as i32, 'b' as i32);
        let p2 = a.encode_pair('a' as i32, n);
        let p3 = a.encode_pair('a' as i32, 'b' as i32);
        assert_ne!(p1, p2);
        assert_eq!(p1, p3);
        assert_eq!(a.decode_pair(p2).unwrap(), ('a' as i32, n));
        assert!(a.decode_pair(99).is_err());
    }

    #[test]
    fn rendering() {
        let mut a = Alphabet::new();
        let n = a.intern("<n>");
        let mut out = String::new();
        a.get_symbol(&mut out, 'c' as i32, false);
        a.get_symbol(&mut out, n, false);
        a.get_symbol(&mut out, 0, false);
        assert_eq!(out, "c<n>");
    }

    #[test]
    fn rendering_uppercase() {
        let mut a = Alphabet::new();
        let n = a.intern("<n>");
        let mut out = String::new();
        a.get_symbol(&mut out, 'c' as i32, true);
        a.get_symbol(&mut out, n, true); // tags never change case
        assert_eq!(out, "C<n>");
    }

    #[test]
    fn blanking_a_control_symbol() {
        let mut a = Alphabet::new();
        let co = a.intern("<compound-only-L>");
        a.set_symbol(co, "");
        let mut out = String::new();
        a.get_symbol(&mut out, co, false);
        assert_eq!(out, "");
        assert!(!a.is_tag(co));
        // the id is still interned under the original spelling
        assert_eq!(a.symbol_id("<compound-only-L>"), co);
    }

    #[test]
    fn binary_roundtrip() {
        let mut a = Alphabet::new();
        let n = a.intern("<n>");
        let pl = a.intern("<pl>");
        a.encode_pair('c' as i32, 'c' as i32);
        a.encode_pair('s' as i32, n);
        a.encode_pair(0, pl);

        let mut w = ByteWriter::new();
        a.write(&mut w);
        let bytes = w.into_inner();
        let b = Alphabet::read(&mut ByteReader::new(&bytes)).unwrap();

        assert_eq!(b.symbol_id("<n>"), n);
        assert_eq!(b.symbol_id("<pl>"), pl);
        assert_eq!(b.decode_pair(1).unwrap(), ('s' as i32, n));
        assert_eq!(b.decode_pair(2).unwrap(), (0, pl));
    }

    #[test]
    fn read_rejects_truncation() {
        let mut a = Alphabet::new();
        a.intern("<n>");
        let mut w = ByteWriter::new();
        a.write(&mut w);
        let bytes = w.into_inner();
        let err = Alphabet::read(&mut ByteReader::new(&bytes[..bytes.len() - 1])).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { .. }));
    }
}
