//! Report which transcript in a command file's stack governs a path.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use stack::{which, Session, WhichOutcome};
use transcript::TranscriptKind;

#[derive(Parser)]
#[command(name = "twhich", about = "Show which transcript claims a path")]
struct Args {
    /// Command file describing the stack
    #[arg(short = 'K', long = "command-file", default_value = "command.K")]
    kfile: PathBuf,

    /// Case-insensitive path comparison
    #[arg(short = 'I', long = "case-insensitive")]
    case_insensitive: bool,

    /// Show every transcript naming the path, not just the decisive one
    #[arg(short = 'a', long = "all")]
    all: bool,

    /// Suppress diagnostics
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Increase verbosity
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// The path to look up
    path: String,
}

fn kind_tag(kind: TranscriptKind) -> &'static str {
    match kind {
        TranscriptKind::Positive => "positive",
        TranscriptKind::Negative => "negative",
        TranscriptKind::Special => "special",
        TranscriptKind::Null => "null",
    }
}

fn report(outcome: &WhichOutcome, all: bool) -> bool {
    if let Some(pattern) = &outcome.excluded_by {
        println!("# excluded by pattern {pattern}");
    }
    if outcome.special {
        println!("# special file");
    }

    let shown: Vec<_> = if all {
        outcome.matches.iter().collect()
    } else {
        outcome.decisive().into_iter().collect()
    };
    for m in &shown {
        let marker = if outcome.decisive().is_some_and(|d| std::ptr::eq(d, *m)) {
            ""
        } else {
            "# "
        };
        println!("{marker}{} ({}):", m.shortname, kind_tag(m.kind));
        println!("{marker}{}", m.line);
    }
    outcome.decisive().is_some()
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(logging::Verbosity::new(args.verbose, args.quiet));

    let mut session = Session::new(args.path.as_bytes());
    session.case_sensitive = !args.case_insensitive;
    // The lookup covers the whole namespace, not a subtree.
    session.path_prefix.clear();

    match which(&args.kfile, &session, args.path.as_bytes()) {
        Ok(outcome) => {
            if report(&outcome, args.all) {
                ExitCode::SUCCESS
            } else {
                // Not claimed by any transcript.
                ExitCode::from(1)
            }
        }
        Err(err) => {
            eprintln!("twhich: {err}");
            ExitCode::from(2)
        }
    }
}
