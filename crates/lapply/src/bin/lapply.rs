//! Apply an applicable transcript to the filesystem.

use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use checksums::{Algorithm, MIN_BUFFER_SIZE};
use lapply::{Applier, ApplyConfig, Summary};
use transfer::{post_or_warn, DirFetcher, EventReporter, FileFetcher, NullReporter, Outcome};

#[derive(Parser)]
#[command(
    name = "lapply",
    about = "Apply an applicable transcript to the filesystem",
    version
)]
struct Args {
    /// Checksum algorithm for download verification (md5, sha1, sha256, sha512)
    #[arg(short = 'c', long = "checksum")]
    checksum: Option<String>,

    /// Case-insensitive path comparison
    #[arg(short = 'I', long = "case-insensitive")]
    case_insensitive: bool,

    /// No network: apply removals and local updates only
    #[arg(short = 'n', long = "no-network")]
    no_network: bool,

    /// Loadset store to download from (a directory of per-transcript trees)
    #[arg(short = 's', long = "store")]
    store: Option<PathBuf>,

    /// Clear immutable/append flags before mutating
    #[arg(short = 'F', long = "force")]
    force: bool,

    /// Create missing intermediate directories
    #[arg(short = 'C', long = "create")]
    create_prefix: bool,

    /// Read buffer for checksumming, minimum 8192 bytes
    #[arg(short = 'S', long = "checksum-buffer-size")]
    cksum_buffer_size: Option<usize>,

    /// Event name for completion reporting
    #[arg(short = 'e', long = "event-name", default_value = "lapply")]
    event: String,

    /// Suppress per-path status lines
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Increase diagnostic verbosity
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Applicable transcript to apply (stdin when omitted)
    transcript: Option<PathBuf>,
}

fn run(args: &Args, reporter: &mut dyn EventReporter) -> Result<Summary, String> {
    let mut config = ApplyConfig {
        case_sensitive: !args.case_insensitive,
        network: !args.no_network,
        force: args.force,
        create_prefix: args.create_prefix,
        quiet: args.quiet,
        ..ApplyConfig::default()
    };
    if let Some(name) = &args.checksum {
        config.algorithm = Some(
            Algorithm::from_name(name).ok_or_else(|| format!("{name}: unsupported checksum"))?,
        );
    }
    if let Some(size) = args.cksum_buffer_size {
        if size < MIN_BUFFER_SIZE {
            return Err(format!(
                "checksum buffer size {size} below minimum {MIN_BUFFER_SIZE}"
            ));
        }
        config.cksum_bufsize = size;
    }

    let mut dir_fetcher;
    let fetcher: Option<&mut dyn FileFetcher> = if args.no_network {
        None
    } else {
        let store = args
            .store
            .as_ref()
            .ok_or_else(|| "--store is required unless --no-network is given".to_owned())?;
        dir_fetcher = DirFetcher::new(store);
        Some(&mut dir_fetcher)
    };

    let mut applier = Applier::new(config, fetcher);
    let outcome = match &args.transcript {
        Some(path) => {
            let file =
                std::fs::File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
            applier.run(BufReader::new(file))
        }
        None => applier.run(std::io::stdin().lock()),
    };

    match outcome {
        Ok(summary) => Ok(summary),
        Err(err) => {
            let changes = applier.summary().changes;
            post_or_warn(
                reporter,
                &args.event,
                if changes {
                    Outcome::ErrorChangesMade
                } else {
                    Outcome::ErrorNoChanges
                },
            );
            Err(err.to_string())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(logging::Verbosity::new(args.verbose, args.quiet));

    let mut reporter = NullReporter;
    match run(&args, &mut reporter) {
        Ok(summary) => {
            if summary.network_disabled {
                post_or_warn(&mut reporter, &args.event, Outcome::Error);
                // Downloads were skipped; a re-run is needed once the
                // network returns.
                ExitCode::from(3)
            } else if summary.changes {
                post_or_warn(&mut reporter, &args.event, Outcome::ChangesApplied);
                ExitCode::from(1)
            } else {
                post_or_warn(&mut reporter, &args.event, Outcome::NoUpdates);
                ExitCode::SUCCESS
            }
        }
        Err(message) => {
            eprintln!("lapply: {message}");
            ExitCode::from(2)
        }
    }
}
