// Processor shell: container loading, per-mode initialization, validity
// checks, and the emission helpers shared by every driver.

use std::collections::VecDeque;
use std::io::Write;

use hashbrown::{HashMap, HashSet};
use morfo_core::character as chr;
use morfo_fst::alphabet::Alphabet;
use morfo_fst::container::Container;
use morfo_fst::state::{FinalsFormat, State};
use morfo_fst::transducer::{Direction, Node, Transition};

use crate::buffer::InputBuffer;
use crate::settings::ProcSettings;
use crate::ProcError;

/// Suffixes classifying a section's finals.
const SUFFIX_INCONDITIONAL: &str = "@inconditional";
const SUFFIX_STANDARD: &str = "@standard";
const SUFFIX_POSTBLANK: &str = "@postblank";
const SUFFIX_PREBLANK: &str = "@preblank";

/// Conventional spellings of the compound control symbols, probed in
/// order at decomposition init.
const COMPOUND_ONLY_L_NAMES: &[&str] = &[
    "<:co:only-L>",
    "<:compound:only-L>",
    "<@co:only-L>",
    "<@compound:only-L>",
    "<compound-only-L>",
];
const COMPOUND_R_NAMES: &[&str] = &[
    "<:co:R>",
    "<:compound:R>",
    "<@co:R>",
    "<@compound:R>",
    "<compound-R>",
];

/// A loaded section: relocated initial state and finals.
pub(crate) struct Section {
    pub name: String,
    pub initial: u32,
    pub finals: HashMap<u32, f64>,
}

/// The streaming processor: one loaded container, one mode, one
/// input/output stream pair at a time.
pub struct FstProcessor {
    pub(crate) alphabet: Alphabet,
    /// Shared node arena; node 0 is the synthetic root.
    pub(crate) nodes: Vec<Node>,
    pub(crate) sections: Vec<Section>,
    pub(crate) initial_state: State,

    pub(crate) inconditional: HashMap<u32, f64>,
    pub(crate) standard: HashMap<u32, f64>,
    pub(crate) postblank: HashMap<u32, f64>,
    pub(crate) preblank: HashMap<u32, f64>,
    pub(crate) all_finals: HashMap<u32, f64>,

    pub(crate) blankqueue: VecDeque<String>,
    pub(crate) wblankqueue: VecDeque<String>,
    pub(crate) input_buffer: InputBuffer,
    pub(crate) numbers: Vec<String>,

    pub(crate) alphabetic_chars: HashSet<char>,
    pub(crate) escaped_chars: HashSet<char>,
    pub(crate) ignored_chars: HashSet<char>,
    pub(crate) rcx_map: HashMap<char, HashSet<i32>>,

    pub settings: ProcSettings,

    // Per-stream scratch flags.
    pub(crate) out_of_word: bool,
    pub(crate) is_wblank: bool,
    pub(crate) collect_wblanks: bool,
    pub(crate) need_end_wblank: bool,
    pub(crate) is_last_blank_tm: bool,
    pub(crate) null_flush_generation: bool,

    pub(crate) do_decomposition: bool,
    pub(crate) compound_only_l_symbol: i32,
    pub(crate) compound_r_symbol: i32,
}

impl FstProcessor {
    pub fn new() -> Self {
        let escaped_chars = ['[', ']', '{', '}', '^', '$', '/', '\\', '@', '<', '>']
            .into_iter()
            .collect();
        let mut ignored_chars = HashSet::new();
        ignored_chars.insert('\u{00AD}'); // soft hyphen, the default ignored set

        Self {
            alphabet: Alphabet::new(),
            nodes: Vec::new(),
            sections: Vec::new(),
            initial_state: State::new(),
            inconditional: HashMap::new(),
            standard: HashMap::new(),
            postblank: HashMap::new(),
            preblank: HashMap::new(),
            all_finals: HashMap::new(),
            blankqueue: VecDeque::new(),
            wblankqueue: VecDeque::new(),
            input_buffer: InputBuffer::new(),
            numbers: Vec::new(),
            alphabetic_chars: HashSet::new(),
            escaped_chars,
            ignored_chars,
            rcx_map: HashMap::new(),
            settings: ProcSettings::default(),
            out_of_word: false,
            is_wblank: false,
            collect_wblanks: false,
            need_end_wblank: false,
            is_last_blank_tm: false,
            null_flush_generation: false,
            do_decomposition: false,
            compound_only_l_symbol: 0,
            compound_r_symbol: 0,
        }
    }

    /// Parse a container image and splice every section into the shared
    /// arena. Must be called before any `init_*` method.
    pub fn load(&mut self, data: &[u8], direction: Direction) -> Result<(), ProcError> {
        let container = Container::read(data, direction)?;
        self.alphabetic_chars = container.letters;
        self.alphabet = container.alphabet;
        self.nodes = vec![Node::default()]; // root
        self.sections.clear();
        for (name, transducer) in &container.sections {
            let spliced = transducer.splice_into(&mut self.nodes);
            self.sections.push(Section {
                name: name.clone(),
                initial: spliced.initial,
                finals: spliced.finals,
            });
        }
        Ok(())
    }

    /// Wire the synthetic root to every section's initial state and build
    /// the initial state set.
    fn calc_initial(&mut self) {
        self.nodes[0].transitions.clear();
        for section in &self.sections {
            self.nodes[0].transitions.push(Transition {
                input: 0,
                output: 0,
                weight: morfo_fst::DEFAULT_WEIGHT,
                target: section.initial,
            });
        }
        let mut state = State::new();
        state.init(&self.nodes, 0);
        self.initial_state = state;
    }

    /// Sort every section's finals into the priority-class maps. A name
    /// without a recognized suffix is fatal.
    fn classify_finals(&mut self) -> Result<(), ProcError> {
        for section in &self.sections {
            let bucket = if section.name.ends_with(SUFFIX_INCONDITIONAL) {
                &mut self.inconditional
            } else if section.name.ends_with(SUFFIX_STANDARD) {
                &mut self.standard
            } else if section.name.ends_with(SUFFIX_POSTBLANK) {
                &mut self.postblank
            } else if section.name.ends_with(SUFFIX_PREBLANK) {
                &mut self.preblank
            } else {
                return Err(ProcError::UnsupportedSection(section.name.clone()));
            };
            bucket.extend(section.finals.iter().map(|(&s, &w)| (s, w)));
        }
        Ok(())
    }

    fn merge_all_finals(&mut self) {
        self.all_finals.clear();
        for section in &self.sections {
            self.all_finals
                .extend(section.finals.iter().map(|(&s, &w)| (s, w)));
        }
    }

    pub fn init_analysis(&mut self) -> Result<(), ProcError> {
        self.calc_initial();
        self.classify_finals()?;
        self.all_finals = self.standard.clone();
        self.all_finals
            .extend(self.inconditional.iter().map(|(&s, &w)| (s, w)));
        self.all_finals
            .extend(self.postblank.iter().map(|(&s, &w)| (s, w)));
        self.all_finals
            .extend(self.preblank.iter().map(|(&s, &w)| (s, w)));
        Ok(())
    }

    pub fn init_tm_analysis(&mut self) {
        self.calc_initial();
        self.merge_all_finals();
    }

    pub fn init_generation(&mut self) {
        self.settings.use_ignored_chars = false;
        self.calc_initial();
        self.merge_all_finals();
    }

    pub fn init_postgeneration(&mut self) {
        self.init_generation();
    }

    pub fn init_biltrans(&mut self) {
        self.init_generation();
    }

    /// Analysis init plus compound decomposition: probe the control
    /// symbols and blank them out of the output unless they were asked
    /// for.
    pub fn init_decomposition(&mut self) -> Result<(), ProcError> {
        self.do_decomposition = true;
        self.init_analysis()?;

        self.compound_only_l_symbol = probe_symbol(&self.alphabet, COMPOUND_ONLY_L_NAMES);
        if self.compound_only_l_symbol == 0 {
            eprintln!("Warning: Decomposition symbol <:compound:only-L> not found");
        } else if !self.settings.show_control_symbols {
            self.alphabet.set_symbol(self.compound_only_l_symbol, "");
        }

        self.compound_r_symbol = probe_symbol(&self.alphabet, COMPOUND_R_NAMES);
        if self.compound_r_symbol == 0 {
            eprintln!("Warning: Decomposition symbol <:compound:R> not found");
        } else if !self.settings.show_control_symbols {
            self.alphabet.set_symbol(self.compound_r_symbol, "");
        }
        Ok(())
    }

    /// Structural dictionary checks: the initial state may not be final,
    /// and no entry may begin with whitespace.
    pub fn valid(&self) -> bool {
        if self.initial_state.is_final(&self.all_finals) {
            eprintln!("Error: Invalid dictionary (hint: the left side of an entry is empty)");
            return false;
        }
        let mut probe = self.initial_state.clone();
        probe.step(&self.nodes, ' ' as i32);
        if !probe.is_empty() {
            eprintln!("Error: Invalid dictionary (hint: entry beginning with whitespace)");
            return false;
        }
        true
    }

    pub fn decomposition_mode(&self) -> bool {
        self.do_decomposition
    }

    // -- injected character sets (loaded externally) --

    pub fn add_ignored_char(&mut self, c: char) {
        self.ignored_chars.insert(c);
    }

    pub fn add_restore_char(&mut self, c: char, substitute: char) {
        self.rcx_map
            .entry(c)
            .or_default()
            .insert(substitute as i32);
    }

    // -- per-segment scratch reset (null flush) --

    pub(crate) fn reset_segment_state(&mut self) {
        self.blankqueue.clear();
        self.wblankqueue.clear();
        self.input_buffer.reset();
        self.numbers.clear();
        self.out_of_word = false;
        self.is_wblank = false;
        self.collect_wblanks = false;
        self.need_end_wblank = false;
        self.is_last_blank_tm = false;
    }

    // -- classification helpers --

    pub(crate) fn is_escaped(&self, c: char) -> bool {
        self.escaped_chars.contains(&c)
    }

    pub(crate) fn is_escaped_sym(&self, val: i32) -> bool {
        sym_char(val).is_some_and(|c| self.escaped_chars.contains(&c))
    }

    pub(crate) fn is_alphabetic_char(&self, c: char) -> bool {
        chr::is_alnum(c) || self.alphabetic_chars.contains(&c)
    }

    pub(crate) fn is_alphabetic_sym(&self, val: i32) -> bool {
        sym_char(val).is_some_and(|c| self.is_alphabetic_char(c))
    }

    pub(crate) fn finals_format(&self, uppercase: bool, firstupper: bool) -> FinalsFormat {
        FinalsFormat {
            display_weights: self.settings.display_weights,
            max_analyses: self.settings.max_analyses,
            max_weight_classes: self.settings.max_weight_classes,
            uppercase,
            firstupper,
        }
    }

    /// `firstupper`/`uppercase` flags from a surface form, honoring
    /// `dictionary_case`.
    pub(crate) fn case_flags(&self, sf: &str) -> (bool, bool) {
        if self.settings.dictionary_case {
            return (false, false);
        }
        let first = sf.chars().next();
        let last = sf.chars().last();
        let firstupper = first.is_some_and(chr::is_upper);
        let uppercase = firstupper && last.is_some_and(chr::is_upper);
        (firstupper, uppercase)
    }

    /// Character index of the last non-alphabetic character of `sf`,
    /// or 0 when every character is alphabetic.
    pub(crate) fn last_blank(&self, sf: &str) -> usize {
        let chars: Vec<char> = sf.chars().collect();
        for i in (0..chars.len()).rev() {
            if !self.is_alphabetic_char(chars[i]) {
                return i;
            }
        }
        0
    }

    /// Character index of the first non-alphabetic character of `sf`.
    pub(crate) fn first_not_alpha(&self, sf: &str) -> Option<usize> {
        sf.chars().position(|c| !self.is_alphabetic_char(c))
    }

    // -- emission helpers --

    pub(crate) fn write_escaped<W: Write>(&self, s: &str, output: &mut W) -> Result<(), ProcError> {
        for c in s.chars() {
            if self.is_escaped(c) {
                write_char(output, '\\')?;
            }
            write_char(output, c)?;
        }
        Ok(())
    }

    /// Escape-write `s`; every space written consumes one single-space
    /// marker from the blank queue immediately. Returns how many real
    /// blanks are left for the caller to pop after the closing `$`.
    pub(crate) fn write_escaped_pop_blanks<W: Write>(
        &mut self,
        s: &str,
        output: &mut W,
    ) -> Result<usize, ProcError> {
        let mut postpop = 0;
        for c in s.chars() {
            if self.is_escaped(c) {
                write_char(output, '\\')?;
            }
            write_char(output, c)?;
            if c == ' ' {
                match self.blankqueue.front().map(|b| b == " ") {
                    Some(true) => {
                        self.blankqueue.pop_front();
                    }
                    Some(false) => postpop += 1,
                    None => {}
                }
            }
        }
        Ok(postpop)
    }

    /// Escape-write up to the first unescaped `<`; from there the string
    /// is tag material and is written through verbatim.
    pub(crate) fn write_escaped_with_tags<W: Write>(
        &self,
        s: &str,
        output: &mut W,
    ) -> Result<(), ProcError> {
        let chars: Vec<char> = s.chars().collect();
        for i in 0..chars.len() {
            if chars[i] == '<' && i >= 1 && chars[i - 1] != '\\' {
                let tail: String = chars[i..].iter().collect();
                output.write_all(tail.as_bytes())?;
                return Ok(());
            }
            if self.is_escaped(chars[i]) {
                write_char(output, '\\')?;
            }
            write_char(output, chars[i])?;
        }
        Ok(())
    }

    pub(crate) fn print_word<W: Write>(
        &self,
        sf: &str,
        lf: &str,
        output: &mut W,
    ) -> Result<(), ProcError> {
        write_char(output, '^')?;
        self.write_escaped(sf, output)?;
        output.write_all(lf.as_bytes())?;
        write_char(output, '$')?;
        Ok(())
    }

    /// [`print_word`](Self::print_word), consuming queued single-space
    /// markers while writing and popping the leftover real blanks after
    /// the closing `$`.
    pub(crate) fn print_word_pop_blank<W: Write>(
        &mut self,
        sf: &str,
        lf: &str,
        output: &mut W,
    ) -> Result<(), ProcError> {
        write_char(output, '^')?;
        let mut postpop = self.write_escaped_pop_blanks(sf, output)?;
        output.write_all(lf.as_bytes())?;
        write_char(output, '$')?;
        while postpop > 0 {
            let Some(blank) = self.blankqueue.pop_front() else {
                break;
            };
            output.write_all(blank.as_bytes())?;
            postpop -= 1;
        }
        Ok(())
    }

    pub(crate) fn print_word_bilingual<W: Write>(
        &self,
        sf: &str,
        lf: &str,
        output: &mut W,
    ) -> Result<(), ProcError> {
        write_char(output, '^')?;
        output.write_all(sf.as_bytes())?;
        output.write_all(lf.as_bytes())?;
        write_char(output, '$')?;
        Ok(())
    }

    pub(crate) fn print_unknown_word<W: Write>(
        &self,
        sf: &str,
        output: &mut W,
    ) -> Result<(), ProcError> {
        write_char(output, '^')?;
        self.write_escaped(sf, output)?;
        write_char(output, '/')?;
        write_char(output, '*')?;
        self.write_escaped(sf, output)?;
        write_char(output, '$')?;
        Ok(())
    }

    /// Write one queued blank run if any is pending, else the literal
    /// space character.
    pub(crate) fn print_space<W: Write>(&mut self, val: char, output: &mut W) -> Result<(), ProcError> {
        if !self.blankqueue.is_empty() {
            self.flush_blanks(output)
        } else {
            write_char(output, val)?;
            Ok(())
        }
    }

    pub(crate) fn flush_blanks<W: Write>(&mut self, output: &mut W) -> Result<(), ProcError> {
        while let Some(blank) = self.blankqueue.pop_front() {
            output.write_all(blank.as_bytes())?;
        }
        Ok(())
    }

    pub(crate) fn flush_wblanks<W: Write>(&mut self, output: &mut W) -> Result<(), ProcError> {
        while let Some(blank) = self.wblankqueue.pop_front() {
            output.write_all(blank.as_bytes())?;
        }
        Ok(())
    }
}

impl Default for FstProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up the first interned spelling from a probe list.
fn probe_symbol(alphabet: &Alphabet, names: &[&str]) -> i32 {
    for name in names {
        let id = alphabet.symbol_id(name);
        if id != 0 {
            return id;
        }
    }
    0
}

/// The character behind a positive symbol id.
pub(crate) fn sym_char(val: i32) -> Option<char> {
    if val > 0 {
        char::from_u32(val as u32)
    } else {
        None
    }
}

pub(crate) fn is_space_sym(val: i32) -> bool {
    sym_char(val).is_some_and(chr::is_space)
}

pub(crate) fn is_punct_sym(val: i32) -> bool {
    sym_char(val).is_some_and(chr::is_punct)
}

pub(crate) fn is_upper_sym(val: i32) -> bool {
    sym_char(val).is_some_and(chr::is_upper)
}

pub(crate) fn lower_sym(val: i32) -> i32 {
    match sym_char(val) {
        Some(c) => chr::to_lower(c) as i32,
        None => val,
    }
}

pub(crate) fn write_char<W: Write>(output: &mut W, c: char) -> std::io::Result<()> {
    let mut buf = [0u8; 4];
    output.write_all(c.encode_utf8(&mut buf).as_bytes())
}

/// Number of characters in a string.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Prefix of `s` holding its first `n` characters.
pub(crate) fn char_prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Everything up to the first unescaped `<` (the tag boundary).
pub(crate) fn remove_tags(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    for i in 0..chars.len() {
        if chars[i] == '<' && i >= 1 && chars[i - 1] != '\\' {
            return chars[..i].iter().collect();
        }
    }
    s.to_string()
}
