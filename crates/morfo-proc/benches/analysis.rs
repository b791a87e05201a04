// Analysis throughput over a synthetic dictionary.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hashbrown::HashSet;

use morfo_fst::alphabet::Alphabet;
use morfo_fst::container::Container;
use morfo_fst::transducer::{Direction, Transducer};
use morfo_proc::processor::FstProcessor;
use morfo_proc::text::TextReader;

/// A few hundred entries over a small letter inventory, enough to give
/// the state set real ambiguity.
fn build_bench_container() -> Vec<u8> {
    let mut alphabet = Alphabet::new();
    let n = alphabet.intern("<n>");
    let mut t = Transducer::new();
    let mut letters = HashSet::new();

    let stems = ["kala", "talo", "katu", "tanko", "kantaja", "kalastaja"];
    let suffixes = ["", "t", "n", "ssa", "sta", "lla"];
    for stem in stems {
        for suffix in suffixes {
            let surface = format!("{stem}{suffix}");
            let mut state = 0;
            for c in surface.chars() {
                letters.insert(c);
                let next = t.add_state();
                t.add_transition(state, c as i32, c as i32, 0.0, next);
                state = next;
            }
            let tagged = t.add_state();
            t.add_transition(state, 0, n, 0.0, tagged);
            t.set_final(tagged, 0.0);
        }
    }

    let mut container = Container {
        letters,
        alphabet,
        sections: vec![("main@standard".to_string(), t)],
    };
    container.write()
}

fn bench_analysis(c: &mut Criterion) {
    let bytes = build_bench_container();
    let mut proc = FstProcessor::new();
    proc.load(&bytes, Direction::Forward).unwrap();
    proc.init_analysis().unwrap();

    let sentence = "kala talo katu kalastaja tanko plugh kantajassa ".repeat(32);

    c.bench_function("analysis_throughput", |b| {
        b.iter(|| {
            let mut input = TextReader::new(sentence.as_bytes());
            let mut out = Vec::with_capacity(sentence.len() * 2);
            proc.analysis(&mut input, &mut out).unwrap();
            black_box(out);
        })
    });
}

criterion_group!(benches, bench_analysis);
criterion_main!(benches);
