// morfo-proc: stream processor over a compiled transducer container.
//
// Reads annotated text from stdin, runs the selected mode against the
// given container, and writes the result to stdout.
//
// Usage:
//   morfo-proc [OPTIONS] MODE CONTAINER
//
// Modes:
//   analysis | generation | postgeneration | intergeneration |
//   transliteration | bilingual | tm | decomposition
//
// Options:
//   -z                        null-flush segment handling
//   -c                        case-sensitive matching
//   -w                        dictionary case (discard surface case)
//   -W                        display weights
//   -i                        honor injected ignored characters
//   -r                        reverse the container (generation over an
//                             analysis-oriented container)
//   --gen-mode=MODE           clean|unknown|all|tagged|tagged-nm|careful
//   --max-analyses=N          cap analyses per token
//   --max-weight-classes=N    cap weight classes per token
//   -h, --help                print this help

use std::fs;
use std::io::{self, BufWriter};

use morfo_fst::transducer::Direction;
use morfo_proc::generation::GenerationMode;
use morfo_proc::processor::FstProcessor;
use morfo_proc::text::TextReader;

fn print_help() {
    println!("morfo-proc: stream processor over a compiled transducer container.");
    println!();
    println!("Usage: morfo-proc [OPTIONS] MODE CONTAINER");
    println!();
    println!("Modes: analysis, generation, postgeneration, intergeneration,");
    println!("       transliteration, bilingual, tm, decomposition");
    println!();
    println!("Options:");
    println!("  -z                      null-flush segment handling");
    println!("  -c                      case-sensitive matching");
    println!("  -w                      dictionary case");
    println!("  -W                      display weights");
    println!("  -i                      honor injected ignored characters");
    println!("  -r                      reverse the container direction");
    println!("  --gen-mode=MODE         clean|unknown|all|tagged|tagged-nm|careful");
    println!("  --max-analyses=N        cap analyses per token");
    println!("  --max-weight-classes=N  cap weight classes per token");
    println!("  -h, --help              print this help");
}

fn parse_gen_mode(name: &str) -> GenerationMode {
    match name {
        "clean" => GenerationMode::Clean,
        "unknown" => GenerationMode::Unknown,
        "all" => GenerationMode::All,
        "tagged" => GenerationMode::Tagged,
        "tagged-nm" => GenerationMode::TaggedNm,
        "careful" => GenerationMode::CarefulCase,
        other => morfo_cli::fatal(&format!("unknown generation mode '{other}'")),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if morfo_cli::wants_help(&args) {
        print_help();
        return;
    }

    let (flags, positional) = morfo_cli::split_flags(&args);
    if positional.len() != 2 {
        morfo_cli::fatal("expected MODE and CONTAINER arguments (see --help)");
    }
    let mode = positional[0].as_str();
    let container_path = positional[1].as_str();

    let has = |f: &str| flags.iter().any(|a| a == f);
    let direction = if has("-r") {
        Direction::Reverse
    } else {
        Direction::Forward
    };

    let data = fs::read(container_path)
        .unwrap_or_else(|e| morfo_cli::fatal(&format!("cannot read '{container_path}': {e}")));

    let mut proc = FstProcessor::new();
    proc.settings.null_flush = has("-z");
    proc.settings.case_sensitive = has("-c");
    proc.settings.dictionary_case = has("-w");
    proc.settings.display_weights = has("-W");
    proc.settings.use_ignored_chars = has("-i");
    if let Some(n) = morfo_cli::flag_value(&flags, "--max-analyses") {
        proc.settings.max_analyses = n
            .parse()
            .unwrap_or_else(|_| morfo_cli::fatal("--max-analyses expects a number"));
    }
    if let Some(n) = morfo_cli::flag_value(&flags, "--max-weight-classes") {
        proc.settings.max_weight_classes = n
            .parse()
            .unwrap_or_else(|_| morfo_cli::fatal("--max-weight-classes expects a number"));
    }
    let gen_mode = morfo_cli::flag_value(&flags, "--gen-mode")
        .map(parse_gen_mode)
        .unwrap_or(GenerationMode::Unknown);

    if let Err(e) = proc.load(&data, direction) {
        morfo_cli::fatal(&format!("cannot load '{container_path}': {e}"));
    }

    let init_result = match mode {
        "analysis" => proc.init_analysis(),
        "decomposition" => proc.init_decomposition(),
        "tm" => {
            proc.init_tm_analysis();
            Ok(())
        }
        "generation" => {
            proc.init_generation();
            Ok(())
        }
        "postgeneration" | "intergeneration" | "transliteration" => {
            proc.init_postgeneration();
            Ok(())
        }
        "bilingual" => {
            proc.init_biltrans();
            Ok(())
        }
        other => morfo_cli::fatal(&format!("unknown mode '{other}'")),
    };
    if let Err(e) = init_result {
        morfo_cli::fatal(&e.to_string());
    }

    if matches!(mode, "analysis" | "decomposition") && !proc.valid() {
        std::process::exit(1);
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut input = TextReader::new(stdin.lock());
    let mut output = BufWriter::new(stdout.lock());

    let run = match mode {
        "analysis" | "decomposition" => proc.analysis(&mut input, &mut output),
        "tm" => proc.tm_analysis(&mut input, &mut output),
        "generation" => proc.generation(&mut input, &mut output, gen_mode),
        "postgeneration" => proc.postgeneration(&mut input, &mut output),
        "intergeneration" => proc.intergeneration(&mut input, &mut output),
        "transliteration" => proc.transliteration(&mut input, &mut output),
        "bilingual" => proc.bilingual(&mut input, &mut output, gen_mode),
        _ => unreachable!(),
    };

    use std::io::Write;
    if let Err(e) = run.and_then(|()| output.flush().map_err(Into::into)) {
        morfo_cli::fatal(&e.to_string());
    }
}
