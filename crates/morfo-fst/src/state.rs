// Nondeterministic state-set simulation with weighted traces.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use morfo_core::character::{is_upper, to_lower, to_upper};

use crate::alphabet::Alphabet;
use crate::transducer::Node;
use crate::DEFAULT_WEIGHT;

/// One alive path: the node the simulation sits on plus the sequence of
/// `(output_id, weight)` steps that got it there. The trace is what
/// [`State::filter_finals`] renders into a lexical form.
#[derive(Debug, Clone)]
pub struct StatePath {
    pub node: u32,
    pub trace: Vec<(i32, f64)>,
}

/// A bag of alive paths advanced in lockstep over the shared node arena.
#[derive(Debug, Clone, Default)]
pub struct State {
    paths: Vec<StatePath>,
}

/// Rendering options for [`State::filter_finals`].
#[derive(Debug, Clone, Copy)]
pub struct FinalsFormat {
    pub display_weights: bool,
    pub max_analyses: usize,
    pub max_weight_classes: usize,
    pub uppercase: bool,
    pub firstupper: bool,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the single root path and take the epsilon closure, pulling
    /// in every section's initial state.
    pub fn init(&mut self, nodes: &[Node], root: u32) {
        self.paths.clear();
        self.paths.push(StatePath {
            node: root,
            trace: Vec::new(),
        });
        self.epsilon_closure(nodes);
    }

    pub fn size(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[StatePath] {
        &self.paths
    }

    /// True if any path sits on a state in `finals`.
    pub fn is_final(&self, finals: &HashMap<u32, f64>) -> bool {
        self.paths.iter().any(|p| finals.contains_key(&p.node))
    }

    /// Replace the paths with their image under transitions accepted by
    /// `accepts`, without taking the epsilon closure.
    fn apply<F: Fn(i32) -> bool>(&mut self, nodes: &[Node], accepts: F) {
        let mut next = Vec::new();
        for path in &self.paths {
            for t in &nodes[path.node as usize].transitions {
                if t.input != 0 && accepts(t.input) {
                    let mut trace = path.trace.clone();
                    trace.push((t.output, t.weight));
                    next.push(StatePath {
                        node: t.target,
                        trace,
                    });
                }
            }
        }
        self.paths = next;
    }

    /// Extend the bag with everything reachable over epsilon transitions.
    /// The compiler rejects epsilon cycles, so the worklist terminates.
    fn epsilon_closure(&mut self, nodes: &[Node]) {
        let mut i = 0;
        while i < self.paths.len() {
            let node = self.paths[i].node;
            for t in &nodes[node as usize].transitions {
                if t.input == 0 {
                    let mut trace = self.paths[i].trace.clone();
                    trace.push((t.output, t.weight));
                    self.paths.push(StatePath {
                        node: t.target,
                        trace,
                    });
                }
            }
            i += 1;
        }
    }

    /// Advance over one input symbol.
    pub fn step(&mut self, nodes: &[Node], input: i32) {
        self.apply(nodes, |i| i == input);
        self.epsilon_closure(nodes);
    }

    /// Advance over either of two input symbols (case-folded stepping).
    pub fn step_pair(&mut self, nodes: &[Node], a: i32, b: i32) {
        self.apply(nodes, |i| i == a || i == b);
        self.epsilon_closure(nodes);
    }

    /// Advance over `primary`, falling back to `fallback` only when the
    /// primary symbol matched nothing.
    pub fn step_careful(&mut self, nodes: &[Node], primary: i32, fallback: i32) {
        let snapshot = self.paths.clone();
        self.apply(nodes, |i| i == primary);
        if self.paths.is_empty() {
            self.paths = snapshot;
            self.apply(nodes, |i| i == fallback);
        }
        self.epsilon_closure(nodes);
    }

    /// Advance over `input` or any of its substitutes (diacritic
    /// restoration).
    pub fn step_set(&mut self, nodes: &[Node], input: i32, substitutes: &HashSet<i32>) {
        self.apply(nodes, |i| i == input || substitutes.contains(&i));
        self.epsilon_closure(nodes);
    }

    /// Case-folding step: an uppercase character also tries its lowercase
    /// form unless case-sensitive matching is on.
    pub fn step_case(&mut self, nodes: &[Node], c: char, case_sensitive: bool) {
        if !is_upper(c) || case_sensitive {
            self.step(nodes, c as i32);
        } else {
            self.step_pair(nodes, c as i32, to_lower(c) as i32);
        }
    }

    /// Render every path ending in a final state as `/L1/L2/...`, sorted
    /// by ascending total weight.
    ///
    /// Escapable characters are backslashed, the case flags re-case the
    /// whole form, weights append as `<W:x.xxxx>` when requested, and the
    /// analysis/weight-class caps of `fmt` are applied after sorting.
    pub fn filter_finals(
        &self,
        finals: &HashMap<u32, f64>,
        alphabet: &Alphabet,
        escaped: &HashSet<char>,
        fmt: &FinalsFormat,
    ) -> String {
        let mut results: Vec<(f64, String)> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for path in &self.paths {
            let Some(&final_weight) = finals.get(&path.node) else {
                continue;
            };
            let mut weight = final_weight;
            let mut form = String::new();
            for &(sym, w) in &path.trace {
                weight += w;
                if sym > 0 {
                    if let Some(c) = char::from_u32(sym as u32) {
                        if escaped.contains(&c) {
                            form.push('\\');
                        }
                    }
                }
                alphabet.get_symbol(&mut form, sym, fmt.uppercase);
            }
            if fmt.firstupper {
                form = uppercase_first(&form);
            }
            if fmt.display_weights {
                form.push_str(&format!("<W:{weight:.4}>"));
            }
            match seen.get(&form) {
                Some(&idx) => {
                    if weight < results[idx].0 {
                        results[idx].0 = weight;
                    }
                }
                None => {
                    seen.insert(form.clone(), results.len());
                    results.push((weight, form));
                }
            }
        }

        results.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut out = String::new();
        let mut emitted = 0usize;
        let mut classes = 0usize;
        let mut last_weight = f64::NAN;
        for (weight, form) in results {
            if weight != last_weight {
                classes += 1;
                last_weight = weight;
            }
            if emitted >= fmt.max_analyses || classes > fmt.max_weight_classes {
                break;
            }
            out.push('/');
            out.push_str(&form);
            emitted += 1;
        }
        out
    }

    /// Translation-memory variant of [`filter_finals`](Self::filter_finals):
    /// `<n>` symbols are replaced by the queued digit runs and space
    /// symbols by queued blanks; no case handling, no weights.
    pub fn filter_finals_tm(
        &self,
        finals: &HashMap<u32, f64>,
        alphabet: &Alphabet,
        blankqueue: &mut VecDeque<String>,
        numbers: &[String],
    ) -> String {
        let num_sym = alphabet.symbol_id("<n>");
        let mut out = String::new();
        let mut first = true;
        for path in &self.paths {
            if !finals.contains_key(&path.node) {
                continue;
            }
            out.push('/');
            let mut num_idx = 0usize;
            for &(sym, _) in &path.trace {
                if num_sym != 0 && sym == num_sym {
                    if let Some(n) = numbers.get(num_idx) {
                        out.push_str(n);
                    }
                    num_idx += 1;
                } else if sym == ' ' as i32 {
                    match if first { blankqueue.pop_front() } else { None } {
                        Some(blank) => out.push_str(&blank),
                        None => out.push(' '),
                    }
                } else {
                    alphabet.get_symbol(&mut out, sym, false);
                }
            }
            first = false;
        }
        out
    }

    /// Drop paths whose trace contains `symbol`. A zero symbol disables
    /// the pruning.
    pub fn prune_states_with_forbidden_symbol(&mut self, symbol: i32) {
        if symbol == 0 {
            return;
        }
        self.paths
            .retain(|p| !p.trace.iter().any(|&(s, _)| s == symbol));
    }

    /// Compound pruning: keep only paths whose last `separator`-delimited
    /// segment carries `compound_r` (when that symbol exists) and whose
    /// boundary count stays within `max_elements`. Ranking and capping of
    /// the survivors is [`filter_finals`](Self::filter_finals)' job.
    pub fn prune_compounds(&mut self, compound_r: i32, separator: i32, max_elements: usize) {
        self.paths.retain(|p| {
            let mut qualifies = compound_r == 0;
            if !qualifies {
                for &(s, _) in p.trace.iter().rev() {
                    if s == separator {
                        break;
                    }
                    if s == compound_r {
                        qualifies = true;
                        break;
                    }
                }
            }
            if !qualifies {
                return false;
            }
            p.trace.iter().filter(|&&(s, _)| s == separator).count() <= max_elements
        });
    }

    /// Fork every path sitting on a final state back to the initial state,
    /// appending `separator` to its trace. This is what chains compound
    /// elements.
    ///
    /// `only_l` is accepted for call-site symmetry with the prune
    /// operations; position restrictions on marked elements are enforced
    /// by [`prune_states_with_forbidden_symbol`](Self::prune_states_with_forbidden_symbol)
    /// and [`prune_compounds`](Self::prune_compounds), not here.
    pub fn restart_finals(
        &mut self,
        finals: &HashMap<u32, f64>,
        only_l: i32,
        initial: &State,
        separator: i32,
    ) {
        let _ = only_l;
        let len = self.paths.len();
        for i in 0..len {
            if !finals.contains_key(&self.paths[i].node) {
                continue;
            }
            for q in &initial.paths {
                let mut trace = self.paths[i].trace.clone();
                trace.push((separator, DEFAULT_WEIGHT));
                self.paths.push(StatePath {
                    node: q.node,
                    trace,
                });
            }
        }
    }
}

/// Uppercase the first character of a form (tags pass through unchanged
/// since `<` has no uppercase mapping).
fn uppercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => {
            let mut out = String::with_capacity(s.len());
            out.push(to_upper(c));
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}
