use std::env;
use std::io;
use std::process;

use filter_rules::{default_rule_table, AppliedRule, RuleSet, RuleTable};
use serde::Serialize;

fn main() {
    if let Err(err) = run() {
        eprintln!("{}: {err}", env!("CARGO_PKG_NAME"));
        process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

    let input = match args.next() {
        Some(flag) if is_help_flag(&flag) => {
            print_help(&program);
            return Ok(());
        }
        Some(flag) if is_version_flag(&flag) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(flag) if flag == "--generate" => {
            if let Some(extra) = args.next() {
                return Err(format!("unexpected argument: {extra}\n{}", usage(&program)));
            }
            return print_json(&default_rule_table());
        }
        Some(path) if path == "-" => Input::Stdin,
        Some(path) => Input::File(path),
        None => return Err(usage(&program)),
    };

    let query = args.collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        return Err(format!("missing query\n{}", usage(&program)));
    }

    let table = match input {
        Input::Stdin => RuleTable::from_reader(io::stdin().lock()),
        Input::File(path) => RuleTable::load(path),
    }
    .map_err(|err| err.to_string())?;

    let compiled = RuleSet::from_table(&table);
    let bound = compiled.rules.bind(&query);
    let report = Report {
        query: &query,
        compiled: compiled.rules.len(),
        rejected: compiled
            .rejected
            .iter()
            .map(|rejected| Rejected {
                index: rejected.index,
                pattern: &rejected.pattern,
                error: rejected.error.to_string(),
            })
            .collect(),
        applicable: bound.applicable(),
    };
    print_json(&report)
}

#[derive(Serialize)]
struct Report<'a> {
    query: &'a str,
    compiled: usize,
    rejected: Vec<Rejected<'a>>,
    applicable: &'a [AppliedRule<'a>],
}

#[derive(Serialize)]
struct Rejected<'a> {
    index: usize,
    pattern: &'a str,
    error: String,
}

enum Input {
    Stdin,
    File(String),
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize JSON: {err}"))?;
    println!("{json}");
    Ok(())
}

fn is_help_flag(arg: &str) -> bool {
    arg == "-h" || arg == "--help"
}

fn is_version_flag(arg: &str) -> bool {
    arg == "-V" || arg == "--version"
}

fn print_help(program: &str) {
    println!(
        "{}\n\nOptions:\n  --generate      Print the default rule table\n  -h, --help      Show this message\n  -V, --version   Print package version",
        usage(program)
    );
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <RULES_FILE|-> <QUERY...>\n       {program} --generate\n\n\
         Lists the rules of a JSON rule table that the query triggers. \
         Pass '-' to read the table from stdin."
    )
}
