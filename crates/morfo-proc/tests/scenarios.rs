// End-to-end driver scenarios over programmatically built containers.

use hashbrown::HashSet;

use morfo_fst::alphabet::Alphabet;
use morfo_fst::container::Container;
use morfo_fst::transducer::{Direction, Transducer};
use morfo_proc::generation::GenerationMode;
use morfo_proc::processor::FstProcessor;
use morfo_proc::text::TextReader;

// ---------------------------------------------------------------------------
// Fixture builders
// ---------------------------------------------------------------------------

/// Split a lexical string into symbol tokens: plain characters and
/// `<tag>` groups.
fn lexical_tokens(alphabet: &mut Alphabet, lexical: &str) -> Vec<i32> {
    let mut out = Vec::new();
    let mut chars = lexical.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '<' {
            let mut tag = String::from("<");
            for t in chars.by_ref() {
                tag.push(t);
                if t == '>' {
                    break;
                }
            }
            out.push(alphabet.intern(&tag));
        } else {
            out.push(c as i32);
        }
    }
    out
}

/// Add one `surface -> lexical` entry as a fresh chain from the initial
/// state, padding the shorter side with epsilon. Both sides may contain
/// `<tag>` symbols (the TM fixtures put `<n>` on the surface side).
fn add_entry(
    t: &mut Transducer,
    alphabet: &mut Alphabet,
    surface: &str,
    lexical: &str,
    weight: f64,
) {
    let ins = lexical_tokens(alphabet, surface);
    let outs = lexical_tokens(alphabet, lexical);
    let len = ins.len().max(outs.len());
    let mut state = 0;
    for i in 0..len {
        let input = ins.get(i).copied().unwrap_or(0);
        let output = outs.get(i).copied().unwrap_or(0);
        let next = t.add_state();
        t.add_transition(state, input, output, 0.0, next);
        state = next;
    }
    t.set_final(state, weight);
}

/// Build a one-section container from `(surface, lexical, weight)`
/// entries.
fn build_container(section: &str, entries: &[(&str, &str, f64)]) -> Vec<u8> {
    let mut alphabet = Alphabet::new();
    let mut t = Transducer::new();
    let mut letters = HashSet::new();
    for &(surface, lexical, weight) in entries {
        add_entry(&mut t, &mut alphabet, surface, lexical, weight);
        for c in surface.chars().filter(|c| c.is_alphabetic()) {
            letters.insert(c);
        }
    }
    let mut container = Container {
        letters,
        alphabet,
        sections: vec![(section.to_string(), t)],
    };
    container.write()
}

fn analyzer(entries: &[(&str, &str, f64)]) -> FstProcessor {
    let bytes = build_container("main@standard", entries);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_analysis().unwrap();
    assert!(proc.valid());
    proc
}

fn run_analysis(proc: &mut FstProcessor, input: &str) -> String {
    let mut reader = TextReader::new(input.as_bytes());
    let mut out = Vec::new();
    proc.analysis(&mut reader, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[test]
fn analysis_known_word() {
    let mut proc = analyzer(&[("cats", "cat<n><pl>", 0.0), ("cat", "cat<n><sg>", 0.0)]);
    assert_eq!(run_analysis(&mut proc, "cats "), "^cats/cat<n><pl>$ ");
}

#[test]
fn analysis_unknown_word() {
    let mut proc = analyzer(&[("cats", "cat<n><pl>", 0.0)]);
    assert_eq!(run_analysis(&mut proc, "xyzzy "), "^xyzzy/*xyzzy$ ");
}

#[test]
fn analysis_preserves_bracket_blanks() {
    let mut proc = analyzer(&[("a", "a<x>", 0.0), ("c", "c<x>", 0.0)]);
    assert_eq!(
        run_analysis(&mut proc, "a [b] c"),
        "^a/a<x>$ [b] ^c/c<x>$"
    );
}

#[test]
fn analysis_preserves_wordbound_blanks() {
    let mut proc = analyzer(&[("a", "a<x>", 0.0)]);
    assert_eq!(
        run_analysis(&mut proc, "[[t:i]]a[[/]]"),
        "[[t:i]]^a/a<x>$[[/]]"
    );
}

#[test]
fn analysis_longest_match_wins() {
    let mut proc = analyzer(&[("cat", "cat<n>", 0.0), ("cats", "cats<n><pl>", 0.0)]);
    assert_eq!(run_analysis(&mut proc, "cats "), "^cats/cats<n><pl>$ ");
}

#[test]
fn analysis_backtracks_to_shorter_match() {
    // "catsx" dies after the longest prefix "cats"; the analyzer must
    // rewind and emit the committed match, then the tail as unknown.
    let mut proc = analyzer(&[("cat", "cat<n>", 0.0), ("cats", "cats<n><pl>", 0.0)]);
    let out = run_analysis(&mut proc, "cat.");
    assert_eq!(out, "^cat/cat<n>$.");
}

#[test]
fn analysis_case_folding() {
    let mut proc = analyzer(&[("dog", "dog<n>", 0.0)]);
    assert_eq!(run_analysis(&mut proc, "dog "), "^dog/dog<n>$ ");
    assert_eq!(run_analysis(&mut proc, "Dog "), "^Dog/Dog<n>$ ");
    assert_eq!(run_analysis(&mut proc, "DOG "), "^DOG/DOG<n>$ ");
}

#[test]
fn analysis_case_sensitive_mode() {
    let mut proc = analyzer(&[("dog", "dog<n>", 0.0)]);
    proc.settings.case_sensitive = true;
    assert_eq!(run_analysis(&mut proc, "Dog "), "^Dog/*Dog$ ");
}

#[test]
fn analysis_dictionary_case() {
    let mut proc = analyzer(&[("dog", "dog<n>", 0.0)]);
    proc.settings.dictionary_case = true;
    assert_eq!(run_analysis(&mut proc, "DOG "), "^DOG/dog<n>$ ");
}

#[test]
fn analysis_ambiguity_sorted_by_weight() {
    let mut proc = analyzer(&[("bank", "bank<n>", 2.0), ("bank", "bank<vblex>", 1.0)]);
    assert_eq!(
        run_analysis(&mut proc, "bank "),
        "^bank/bank<vblex>/bank<n>$ "
    );
}

#[test]
fn analysis_max_analyses_cap() {
    let mut proc = analyzer(&[("bank", "bank<n>", 2.0), ("bank", "bank<vblex>", 1.0)]);
    proc.settings.max_analyses = 1;
    assert_eq!(run_analysis(&mut proc, "bank "), "^bank/bank<vblex>$ ");
}

#[test]
fn analysis_display_weights() {
    let mut proc = analyzer(&[("cat", "cat<n>", 1.5)]);
    proc.settings.display_weights = true;
    assert_eq!(
        run_analysis(&mut proc, "cat "),
        "^cat/cat<n><W:1.5000>$ "
    );
}

#[test]
fn analysis_escaped_metacharacters_round_trip() {
    let mut proc = analyzer(&[("a", "a<x>", 0.0)]);
    // every escaped metacharacter survives, and no '\' appears unpaired
    let out = run_analysis(&mut proc, "\\^\\$\\/ ");
    assert_eq!(out, "\\^\\$\\/ ");
    let unpaired = out.chars().fold((false, 0), |(esc, count), c| {
        if esc {
            (false, count)
        } else if c == '\\' {
            (true, count)
        } else {
            (false, count)
        }
    });
    assert!(!unpaired.0);
}

#[test]
fn analysis_blank_order_is_preserved() {
    let mut proc = analyzer(&[("a", "a<x>", 0.0)]);
    let out = run_analysis(&mut proc, "[1]a[2]a[3]");
    let mut positions = Vec::new();
    for blank in ["[1]", "[2]", "[3]"] {
        positions.push(out.find(blank).unwrap_or_else(|| panic!("{blank} lost")));
    }
    // blanks stay in input order
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn analysis_null_flush_segments_are_independent() {
    let mut proc = analyzer(&[("cats", "cat<n><pl>", 0.0)]);
    proc.settings.null_flush = true;
    let out = run_analysis(&mut proc, "cats \0cats \0");
    assert_eq!(out, "^cats/cat<n><pl>$ \0^cats/cat<n><pl>$ \0");
}

#[test]
fn analysis_ignored_default_soft_hyphen() {
    let mut proc = analyzer(&[("cats", "cat<n><pl>", 0.0)]);
    assert_eq!(
        run_analysis(&mut proc, "ca\u{00AD}ts "),
        "^cats/cat<n><pl>$ "
    );
}

// ---------------------------------------------------------------------------
// Priority classes
// ---------------------------------------------------------------------------

/// Build a container with one entry per named section.
fn build_multi_section(sections: &[(&str, &[(&str, &str, f64)])]) -> Vec<u8> {
    let mut alphabet = Alphabet::new();
    let mut letters = HashSet::new();
    let mut built = Vec::new();
    for &(name, entries) in sections {
        let mut t = Transducer::new();
        for &(surface, lexical, weight) in entries {
            add_entry(&mut t, &mut alphabet, surface, lexical, weight);
            for c in surface.chars().filter(|c| c.is_alphabetic()) {
                letters.insert(c);
            }
        }
        built.push((name.to_string(), t));
    }
    let mut container = Container {
        letters,
        alphabet,
        sections: built,
    };
    container.write()
}

#[test]
fn postblank_section_inserts_trailing_space() {
    let bytes = build_multi_section(&[
        ("main@standard", &[("b", "b<x>", 0.0)]),
        ("punct@postblank", &[("a.", "a<abbr>", 0.0)]),
    ]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_analysis().unwrap();
    let out = run_analysis(&mut proc, "a.b ");
    assert_eq!(out, "^a./a<abbr>$ ^b/b<x>$ ");
}

#[test]
fn preblank_section_inserts_leading_space() {
    let bytes = build_multi_section(&[
        ("main@standard", &[("b", "b<x>", 0.0)]),
        ("punct@preblank", &[(".a", "a<pre>", 0.0)]),
    ]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_analysis().unwrap();
    let out = run_analysis(&mut proc, ".ab ");
    assert_eq!(out, " ^.a/a<pre>$^b/b<x>$ ");
}

#[test]
fn inconditional_commits_mid_word() {
    // an inconditional entry fires even with alphabetic lookahead
    let bytes = build_multi_section(&[
        ("main@standard", &[("b", "b<x>", 0.0)]),
        ("sym@inconditional", &[("a", "a<top>", 0.0)]),
    ]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_analysis().unwrap();
    let out = run_analysis(&mut proc, "ab ");
    assert_eq!(out, "^a/a<top>$^b/b<x>$ ");
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

fn generator(entries: &[(&str, &str, f64)]) -> FstProcessor {
    // the same container serves generation, read with sides swapped
    let bytes = build_container("main@standard", entries);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Reverse).unwrap();
    proc.init_generation();
    proc
}

fn run_generation(proc: &mut FstProcessor, input: &str, mode: GenerationMode) -> String {
    let mut reader = TextReader::new(input.as_bytes());
    let mut out = Vec::new();
    proc.generation(&mut reader, &mut out, mode).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn generation_clean_matched() {
    let mut proc = generator(&[("cats", "cat<n><pl>", 0.0)]);
    assert_eq!(
        run_generation(&mut proc, "^cat<n><pl>$", GenerationMode::Clean),
        "cats"
    );
}

#[test]
fn generation_clean_unmatched_strips_tags() {
    let mut proc = generator(&[("cats", "cat<n><pl>", 0.0)]);
    assert_eq!(
        run_generation(&mut proc, "^foo<xx>$", GenerationMode::Clean),
        "foo"
    );
}

#[test]
fn generation_unknown_marks_gaps() {
    let mut proc = generator(&[("cats", "cat<n><pl>", 0.0)]);
    assert_eq!(
        run_generation(&mut proc, "^foo<xx>$", GenerationMode::Unknown),
        "#foo"
    );
}

#[test]
fn generation_unknown_keeps_starred_words() {
    let mut proc = generator(&[("cats", "cat<n><pl>", 0.0)]);
    assert_eq!(
        run_generation(&mut proc, "^*plugh$", GenerationMode::Unknown),
        "*plugh"
    );
    assert_eq!(
        run_generation(&mut proc, "^*plugh$", GenerationMode::Clean),
        "plugh"
    );
}

#[test]
fn generation_passes_outside_text_through() {
    let mut proc = generator(&[("cats", "cat<n><pl>", 0.0)]);
    assert_eq!(
        run_generation(&mut proc, "x ^cat<n><pl>$ y", GenerationMode::Clean),
        "x cats y"
    );
}

#[test]
fn generation_recases_from_lexical_form() {
    let mut proc = generator(&[("cats", "cat<n><pl>", 0.0)]);
    assert_eq!(
        run_generation(&mut proc, "^Cat<n><pl>$", GenerationMode::Clean),
        "Cats"
    );
    assert_eq!(
        run_generation(&mut proc, "^CAt<n><pl>$", GenerationMode::Clean),
        "CATS"
    );
}

#[test]
fn generation_tagged_frames_output() {
    let mut proc = generator(&[("cats", "cat<n><pl>", 0.0)]);
    assert_eq!(
        run_generation(&mut proc, "^cat<n><pl>$", GenerationMode::Tagged),
        "^cats/cat<n><pl>$"
    );
}

// ---------------------------------------------------------------------------
// Bilingual
// ---------------------------------------------------------------------------

fn bilingual_proc() -> FstProcessor {
    let bytes = build_container("main@standard", &[("cat<n>", "gato<n>", 0.0)]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_biltrans();
    proc
}

#[test]
fn bilingual_reattaches_trailing_tags() {
    let mut proc = bilingual_proc();
    let mut reader = TextReader::new("^cat<n><pl>$".as_bytes());
    let mut out = Vec::new();
    proc.bilingual(&mut reader, &mut out, GenerationMode::Unknown)
        .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "^cat<n><pl>/gato<n><pl>$"
    );
}

#[test]
fn bilingual_unknown_word_passthrough() {
    let mut proc = bilingual_proc();
    let mut reader = TextReader::new("^*xyzzy$".as_bytes());
    let mut out = Vec::new();
    proc.bilingual(&mut reader, &mut out, GenerationMode::Unknown)
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "^*xyzzy/*xyzzy$");
}

#[test]
fn bilingual_missing_entry_marked() {
    let mut proc = bilingual_proc();
    let mut reader = TextReader::new("^dog<n>$".as_bytes());
    let mut out = Vec::new();
    proc.bilingual(&mut reader, &mut out, GenerationMode::Unknown)
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "^dog<n>/@dog<n>$");
}

#[test]
fn biltrans_single_word() {
    let proc = bilingual_proc();
    assert_eq!(
        proc.biltrans("^cat<n>$", true),
        "^gato<n>$"
    );
    let (result, queue_len) = proc.biltrans_with_queue("^cat<n><pl>$", true);
    assert_eq!(result, "^gato<n><pl>$");
    assert_eq!(queue_len, 4);
}

#[test]
fn biltrans_missing_word() {
    let proc = bilingual_proc();
    assert_eq!(proc.biltrans("^dog<n>$", true), "^@dog<n>$");
}

// ---------------------------------------------------------------------------
// Compound decomposition
// ---------------------------------------------------------------------------

#[test]
fn decomposition_splits_unknown_compounds() {
    let bytes = build_container(
        "main@standard",
        &[("dog", "dog<n>", 0.0), ("cat", "cat<n>", 0.0)],
    );
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_decomposition().unwrap();
    let out = run_analysis(&mut proc, "dogcat ");
    assert_eq!(out, "^dogcat/dog<n>+cat<n>$ ");
}

#[test]
fn decomposition_respects_element_limit() {
    let bytes = build_container("main@standard", &[("ab", "ab<n>", 0.0)]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_decomposition().unwrap();
    proc.settings.compound_max_elements = 2;
    // five elements exceed the limit: falls back to unknown
    let out = run_analysis(&mut proc, "ababababab ");
    assert_eq!(out, "^ababababab/*ababababab$ ");
}

// ---------------------------------------------------------------------------
// Post-generation / transliteration
// ---------------------------------------------------------------------------

#[test]
fn postgeneration_applies_rule_at_marker() {
    let bytes = build_container("main@standard", &[("~ocean", "an ocean", 0.0)]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_postgeneration();
    let mut reader = TextReader::new("un ~ocean ".as_bytes());
    let mut out = Vec::new();
    proc.postgeneration(&mut reader, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "un an ocean ");
}

#[test]
fn postgeneration_without_match_drops_marker() {
    let bytes = build_container("main@standard", &[("~ocean", "an ocean", 0.0)]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_postgeneration();
    let mut reader = TextReader::new("~undertow ".as_bytes());
    let mut out = Vec::new();
    proc.postgeneration(&mut reader, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "undertow ");
}

#[test]
fn intergeneration_replaces_marked_region() {
    let bytes = build_container("main@standard", &[("~ab", "xy", 0.0)]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_postgeneration();
    let mut reader = TextReader::new("c ~ab d".as_bytes());
    let mut out = Vec::new();
    proc.intergeneration(&mut reader, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "c xy d");
}

#[test]
fn intergeneration_keeps_source_on_no_match() {
    let bytes = build_container("main@standard", &[("~ab", "xy", 0.0)]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_postgeneration();
    let mut reader = TextReader::new("~zq w".as_bytes());
    let mut out = Vec::new();
    proc.intergeneration(&mut reader, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "~zq w");
}

#[test]
fn transliteration_rewrites_runs() {
    let bytes = build_container("main@standard", &[("abc", "xyz", 0.0)]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_postgeneration();
    let mut reader = TextReader::new("abc abc.".as_bytes());
    let mut out = Vec::new();
    proc.transliteration(&mut reader, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "xyz xyz.");
}

// ---------------------------------------------------------------------------
// TM analysis
// ---------------------------------------------------------------------------

#[test]
fn tm_analysis_reinjects_numbers() {
    // TM entries collapse digit runs into <n>
    let bytes = build_container("main@standard", &[("<n> cats", "<n> gatos", 0.0)]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_tm_analysis();
    let mut reader = TextReader::new("12 cats.".as_bytes());
    let mut out = Vec::new();
    proc.tm_analysis(&mut reader, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "[12 gatos].");
}

// ---------------------------------------------------------------------------
// Diacritic restoration and malformed streams
// ---------------------------------------------------------------------------

#[test]
fn analysis_restores_diacritics() {
    let mut proc = analyzer(&[("caf\u{00E9}", "caf\u{00E9}<n>", 0.0)]);
    proc.settings.use_restore_chars = true;
    proc.add_restore_char('e', '\u{00E9}');
    assert_eq!(
        run_analysis(&mut proc, "cafe "),
        "^cafe/caf\u{00E9}<n>$ "
    );
}

#[test]
fn analysis_malformed_stream_is_fatal() {
    let mut proc = analyzer(&[("a", "a<x>", 0.0)]);
    let mut reader = TextReader::new("[never closed".as_bytes());
    let mut out = Vec::new();
    let err = proc.analysis(&mut reader, &mut out).unwrap_err();
    assert_eq!(err.to_string(), "Malformed input stream.");
}

#[test]
fn biltransfull_guard_discards_long_matches() {
    let proc = bilingual_proc();
    // the historical length guard kicks in for anything longer than a
    // few symbols
    assert_eq!(proc.biltransfull("^cat<n>$", true), "^$");
}

#[test]
fn biltransfull_guard_discards_short_matches() {
    // for very short words the guard's unsigned subtraction wraps
    // around, so even a clean two-letter match is discarded
    let bytes = build_container("main@standard", &[("ab", "xy", 0.0)]);
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_biltrans();
    assert_eq!(proc.biltransfull("^ab$", true), "^$");
}

#[test]
fn generation_null_flush_passes_segments() {
    let mut proc = generator(&[("cats", "cat<n><pl>", 0.0)]);
    proc.settings.null_flush = true;
    let out = run_generation(&mut proc, "^cat<n><pl>$\0^cat<n><pl>$\0", GenerationMode::Clean);
    assert_eq!(out, "cats\0cats\0");
}
