// On-disk container: magic + feature bits, letter set, alphabet, named
// transducer sections.

use hashbrown::HashSet;

use crate::alphabet::Alphabet;
use crate::compression::{ByteReader, ByteWriter};
use crate::transducer::{Direction, Transducer};
use crate::FormatError;

/// Container magic for the current variant. The legacy variant has no
/// magic and starts directly with the letter set.
pub const MAGIC: &[u8; 4] = b"LTTB";

/// First feature bit this version does not understand. A container with
/// feature bits at or above this value is refused.
pub const FEATURES_UNKNOWN: u64 = 1 << 1;

/// A fully parsed container.
#[derive(Debug)]
pub struct Container {
    /// Characters the dictionary declares alphabetic (beyond Unicode
    /// letters and digits).
    pub letters: HashSet<char>,
    pub alphabet: Alphabet,
    /// Named sections in file order. Names carry a priority-class suffix
    /// (`@standard`, `@inconditional`, ...) interpreted by the processor.
    pub sections: Vec<(String, Transducer)>,
}

impl Container {
    /// Parse a container image, resolving transition labels according to
    /// `direction`.
    pub fn read(data: &[u8], direction: Direction) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(data);

        if reader.peek_bytes(4) == Some(&MAGIC[..]) {
            reader.read_bytes(4)?;
            let features = reader.read_u64_le()?;
            if features >= FEATURES_UNKNOWN {
                return Err(FormatError::UnknownFeatures { features });
            }
        }

        let mut letters = HashSet::new();
        let letter_count = reader.read_uvarint()?;
        for _ in 0..letter_count {
            letters.insert(reader.read_char()?);
        }

        let alphabet = Alphabet::read(&mut reader)?;

        let mut sections = Vec::new();
        let section_count = reader.read_uvarint()?;
        for _ in 0..section_count {
            let name_len = reader.read_uvarint()?;
            let mut name = String::new();
            for _ in 0..name_len {
                name.push(reader.read_char()?);
            }
            let transducer = Transducer::read(&mut reader, &alphabet, direction)?;
            sections.push((name, transducer));
        }

        Ok(Self {
            letters,
            alphabet,
            sections,
        })
    }

    /// Serialize in the current (magic-bearing) variant.
    pub fn write(&mut self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_bytes(MAGIC);
        writer.write_u64_le(0);
        self.write_payload(&mut writer);
        writer.into_inner()
    }

    /// Serialize in the legacy variant (no magic, no feature bits).
    pub fn write_legacy(&mut self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        self.write_payload(&mut writer);
        writer.into_inner()
    }

    fn write_payload(&mut self, writer: &mut ByteWriter) {
        // Pre-encode every transition pair so the pair table is complete
        // before the alphabet body is written.
        let alphabet = &mut self.alphabet;
        for (_, t) in &self.sections {
            for node in &t.nodes {
                for tr in &node.transitions {
                    alphabet.encode_pair(tr.input, tr.output);
                }
            }
        }

        let mut letters: Vec<char> = self.letters.iter().copied().collect();
        letters.sort_unstable();
        writer.write_uvarint(letters.len() as u32);
        for c in letters {
            writer.write_char(c);
        }

        self.alphabet.write(writer);

        writer.write_uvarint(self.sections.len() as u32);
        for (name, transducer) in &self.sections {
            writer.write_uvarint(name.chars().count() as u32);
            for c in name.chars() {
                writer.write_char(c);
            }
            transducer.write(writer, &mut self.alphabet);
        }
    }
}
