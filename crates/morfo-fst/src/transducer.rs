// Per-section transducer: an arena of nodes with resolved transitions,
// an initial state and a finals-with-weights map.

use hashbrown::HashMap;

use crate::alphabet::Alphabet;
use crate::compression::{ByteReader, ByteWriter};
use crate::FormatError;

/// Which component of a pair label is treated as the stepping input.
///
/// Tables are compiled once; analysis reads them `Forward` (left side in,
/// right side out) and generation reads the same bytes `Reverse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// One outgoing edge, with the pair label already split by direction.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub input: i32,
    pub output: i32,
    pub weight: f64,
    pub target: u32,
}

/// A state of the transition graph.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub transitions: Vec<Transition>,
}

/// A loaded transducer section.
///
/// Node ids are dense indexes into `nodes`; there are no interior
/// pointers, so sections can be spliced into a shared arena by offsetting
/// every index.
#[derive(Debug)]
pub struct Transducer {
    pub initial: u32,
    pub finals: HashMap<u32, f64>,
    pub nodes: Vec<Node>,
}

/// A section spliced into a shared arena: its relocated initial state and
/// finals map.
pub struct SplicedSection {
    pub initial: u32,
    pub finals: HashMap<u32, f64>,
}

impl Transducer {
    /// Create an empty transducer with a single (initial) state.
    pub fn new() -> Self {
        Self {
            initial: 0,
            finals: HashMap::new(),
            nodes: vec![Node::default()],
        }
    }

    /// Append a fresh state and return its id.
    pub fn add_state(&mut self) -> u32 {
        self.nodes.push(Node::default());
        (self.nodes.len() - 1) as u32
    }

    /// Add a transition between existing states.
    pub fn add_transition(&mut self, from: u32, input: i32, output: i32, weight: f64, to: u32) {
        self.nodes[from as usize].transitions.push(Transition {
            input,
            output,
            weight,
            target: to,
        });
    }

    /// Mark a state as final with the given weight.
    pub fn set_final(&mut self, state: u32, weight: f64) {
        self.finals.insert(state, weight);
    }

    /// Parse a transducer body. Pair labels are resolved through the
    /// alphabet according to `direction`.
    pub fn read(
        reader: &mut ByteReader<'_>,
        alphabet: &Alphabet,
        direction: Direction,
    ) -> Result<Self, FormatError> {
        let state_count = reader.read_uvarint()?;
        let initial = reader.read_uvarint()?;
        if initial >= state_count {
            return Err(FormatError::BadState { index: initial });
        }

        let mut finals = HashMap::new();
        let final_count = reader.read_uvarint()?;
        for _ in 0..final_count {
            let state = reader.read_uvarint()?;
            if state >= state_count {
                return Err(FormatError::BadState { index: state });
            }
            let weight = reader.read_f64()?;
            finals.insert(state, weight);
        }

        let mut nodes = Vec::with_capacity(state_count as usize);
        for _ in 0..state_count {
            let transition_count = reader.read_uvarint()?;
            let mut transitions = Vec::with_capacity(transition_count as usize);
            for _ in 0..transition_count {
                let label = reader.read_uvarint()? as i32;
                let target = reader.read_uvarint()?;
                if target >= state_count {
                    return Err(FormatError::BadState { index: target });
                }
                let weight = reader.read_f64()?;
                let (left, right) = alphabet.decode_pair(label)?;
                let (input, output) = match direction {
                    Direction::Forward => (left, right),
                    Direction::Reverse => (right, left),
                };
                transitions.push(Transition {
                    input,
                    output,
                    weight,
                    target,
                });
            }
            nodes.push(Node { transitions });
        }

        Ok(Self {
            initial,
            finals,
            nodes,
        })
    }

    /// Serialize the transducer body. The in-memory `(input, output)`
    /// sides are written as `(left, right)` pairs, i.e. a transducer built
    /// programmatically is written in `Forward` orientation.
    pub fn write(&self, writer: &mut ByteWriter, alphabet: &mut Alphabet) {
        writer.write_uvarint(self.nodes.len() as u32);
        writer.write_uvarint(self.initial);

        let mut finals: Vec<(u32, f64)> = self.finals.iter().map(|(&s, &w)| (s, w)).collect();
        finals.sort_by_key(|&(s, _)| s);
        writer.write_uvarint(finals.len() as u32);
        for (state, weight) in finals {
            writer.write_uvarint(state);
            writer.write_f64(weight);
        }

        for node in &self.nodes {
            writer.write_uvarint(node.transitions.len() as u32);
            for t in &node.transitions {
                let label = alphabet.encode_pair(t.input, t.output);
                writer.write_uvarint(label as u32);
                writer.write_uvarint(t.target);
                writer.write_f64(t.weight);
            }
        }
    }

    /// Copy this section's nodes into a shared arena, relocating every
    /// state index, and return the relocated initial/finals.
    pub fn splice_into(&self, arena: &mut Vec<Node>) -> SplicedSection {
        let offset = arena.len() as u32;
        for node in &self.nodes {
            let transitions = node
                .transitions
                .iter()
                .map(|t| Transition {
                    target: t.target + offset,
                    ..*t
                })
                .collect();
            arena.push(Node { transitions });
        }
        SplicedSection {
            initial: self.initial + offset,
            finals: self
                .finals
                .iter()
                .map(|(&s, &w)| (s + offset, w))
                .collect(),
        }
    }
}

impl Default for Transducer {
    fn default() -> Self {
        Self::new()
    }
}
