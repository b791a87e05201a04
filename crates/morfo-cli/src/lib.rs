// morfo-cli: shared helpers for the command-line tools.

use std::process;

/// Print an error message and exit with code 1.
pub fn fatal(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

/// Check if `--help` or `-h` is in the args.
pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help" || a == "-h")
}

/// Split args into flags (leading `-`) and positional arguments.
pub fn split_flags(args: &[String]) -> (Vec<String>, Vec<String>) {
    let mut flags = Vec::new();
    let mut positional = Vec::new();
    for arg in args {
        if arg.starts_with('-') && arg.len() > 1 {
            flags.push(arg.clone());
        } else {
            positional.push(arg.clone());
        }
    }
    (flags, positional)
}

/// Extract the value of a `--name=value` flag.
pub fn flag_value<'a>(flags: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("{name}=");
    flags
        .iter()
        .find_map(|f| f.strip_prefix(prefix.as_str()))
}
