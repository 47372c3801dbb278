//! Compare the live filesystem against a transcript stack.

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use checksums::{Algorithm, MIN_BUFFER_SIZE};
use fsdiff::{DiffConfig, Differ, EditPath};
use stack::TranscriptStack;

#[derive(Parser)]
#[command(
    name = "fsdiff",
    about = "Describe how a filesystem differs from a transcript stack",
    version
)]
struct Args {
    /// Command file describing the stack
    #[arg(short = 'K', long = "command-file", default_value = "command.K")]
    kfile: PathBuf,

    /// Produce an applicable transcript (difference stream)
    #[arg(short = 'A', long = "applicable", conflicts_with_all = ["creatable", "single_line"])]
    applicable: bool,

    /// Produce a creatable transcript (default)
    #[arg(short = 'C', long = "creatable")]
    creatable: bool,

    /// Print a single transcript line for the given path; implies --creatable
    #[arg(short = '1', long = "single-line")]
    single_line: bool,

    /// Checksum algorithm (md5, sha1, sha256, sha512)
    #[arg(short = 'c', long = "checksum")]
    checksum: Option<String>,

    /// Case-insensitive path comparison
    #[arg(short = 'I', long = "case-insensitive")]
    case_insensitive: bool,

    /// Output transcript file (stdout when omitted)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Max transcript size to buffer in memory, in bytes
    #[arg(short = 'B', long = "buffer-size")]
    buffer_size: Option<u64>,

    /// Read buffer for checksumming, minimum 8192 bytes
    #[arg(short = 'S', long = "checksum-buffer-size")]
    cksum_buffer_size: Option<usize>,

    /// Warn when an exclude pattern suppresses an object
    #[arg(short = 'W', long = "warning")]
    exclude_warnings: bool,

    /// Percent-done progress on stdout; requires --output
    #[arg(short = 'P', long = "progress")]
    progress: bool,

    /// Enable (+field) or disable (-field) a metadata comparison
    #[arg(short = 'M', long = "metadata-check", value_name = "{+|-}FIELD", allow_hyphen_values = true)]
    metadata_check: Vec<String>,

    /// Increase diagnostic verbosity
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// The start path to walk
    path: String,
}

fn normalize_prefix(raw: &str) -> Vec<u8> {
    let mut prefix = raw.as_bytes().to_vec();
    while prefix.len() > 1 && prefix.last() == Some(&b'/') {
        prefix.pop();
    }
    // Bare names become ./name so relative and absolute stacks keep one
    // sort order.
    match prefix.first() {
        Some(b'/') => prefix,
        Some(b'.') if prefix.len() == 1 || prefix.get(1) == Some(&b'/') => prefix,
        _ => {
            let mut out = b"./".to_vec();
            out.extend_from_slice(&prefix);
            out
        }
    }
}

fn run(args: &Args) -> Result<u64, String> {
    let prefix = normalize_prefix(&args.path);

    let mut config = DiffConfig::new(&prefix);
    config.session.case_sensitive = !args.case_insensitive;
    config.session.exclude_warnings = args.exclude_warnings;
    if let Some(size) = args.buffer_size {
        config.session.transcript_buffer_size = size;
    }
    if let Some(size) = args.cksum_buffer_size {
        if size < MIN_BUFFER_SIZE {
            return Err(format!(
                "checksum buffer size {size} below minimum {MIN_BUFFER_SIZE}"
            ));
        }
        config.cksum_bufsize = size;
    }
    if let Some(name) = &args.checksum {
        let algorithm = Algorithm::from_name(name)
            .ok_or_else(|| format!("{name}: unsupported checksum"))?;
        config = config.with_algorithm(algorithm);
    }
    // Creatable is the default; --creatable exists to spell it out.
    config.edit_path = if args.applicable && !args.creatable {
        EditPath::Applicable
    } else {
        EditPath::Creatable
    };
    config.single_line = args.single_line;
    config.progress = args.progress;
    if args.progress && args.output.is_none() {
        return Err("--progress requires --output".to_owned());
    }
    for toggle in &args.metadata_check {
        let (on, field) = match toggle.split_at_checked(1) {
            Some(("+", rest)) => (true, rest),
            Some(("-", rest)) => (false, rest),
            _ => {
                return Err(format!(
                    "--metadata-check value {toggle:?} must begin with '+' or '-'"
                ))
            }
        };
        config.checks.set(field, on)?;
    }

    let stack = if args.single_line {
        TranscriptStack::null_only(&config.session)
    } else {
        TranscriptStack::open(&args.kfile, &config.session).map_err(|e| e.to_string())?
    };

    let changes = if let Some(path) = &args.output {
        let file = std::fs::File::create(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let mut differ =
            Differ::new(config, stack, BufWriter::new(file)).map_err(|e| e.to_string())?;
        differ.run().map_err(|e| e.to_string())?
    } else {
        let stdout = std::io::stdout();
        let mut differ = Differ::new(config, stack, BufWriter::new(stdout.lock()))
            .map_err(|e| e.to_string())?;
        differ.run().map_err(|e| e.to_string())?
    };

    if args.progress {
        println!("%100");
        std::io::stdout().flush().ok();
    }
    Ok(changes)
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(logging::Verbosity::new(args.verbose, false));

    match run(&args) {
        Ok(changes) => {
            if args.applicable && changes > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(message) => {
            eprintln!("fsdiff: {message}");
            ExitCode::from(2)
        }
    }
}
