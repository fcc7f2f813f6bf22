//! QRCert CLI - hospital certificate verification tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Certificate verified as real
  65  Certificate is tampered, fake, or has no readable QR code
  66  Input file could not be read
  69  Shortened URL could not be resolved
  78  Configuration error (no enrolled reference, model or schema problem)";

#[derive(Parser)]
#[command(name = "qrcert")]
#[command(author, version, about = "Hospital certificate QR verification", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the genuine certificate image as the tamper reference
    Enroll {
        /// Path to the reference image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// File the reference digest is written to
        #[arg(short, long, default_value = qrcert_core::reference::DEFAULT_REFERENCE_FILE)]
        reference: PathBuf,
    },

    /// Verify a certificate image
    Verify {
        /// Path to the certificate image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// File holding the enrolled reference digest
        #[arg(short, long, default_value = qrcert_core::reference::DEFAULT_REFERENCE_FILE)]
        reference: PathBuf,

        /// ONNX classifier (schema sidecar: <model>.schema.json)
        #[arg(short, long, default_value = commands::DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// Feature schema: preset name or path to a schema JSON
        #[arg(short, long, default_value = qrcert_core::features::DOMAIN_V1)]
        schema: String,

        /// Known-good certificate URL (repeatable)
        #[arg(long = "allow", value_name = "URL")]
        allow: Vec<String>,

        /// Shortener domain, replacing the built-in list (repeatable)
        #[arg(long = "shortener", value_name = "DOMAIN")]
        shorteners: Vec<String>,

        /// Timeout for resolving shortened URLs, in seconds
        #[arg(long, default_value_t = 5)]
        timeout: u64,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the SHA-256 digest of an image
    Hash {
        /// Path to the image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },

    /// Print the feature vector extracted from a URL
    Features {
        /// URL to analyse
        #[arg(value_name = "URL")]
        url: String,

        /// Feature schema: preset name or path to a schema JSON
        #[arg(short, long, default_value = qrcert_core::features::DOMAIN_V1)]
        schema: String,

        /// Print the vector as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Enroll { image, reference } => {
            commands::enroll::execute(image, reference, quiet).await
        }
        Commands::Verify {
            image,
            reference,
            model,
            schema,
            allow,
            shorteners,
            timeout,
            json,
        } => {
            let options = commands::verify::VerifyOptions {
                reference,
                model,
                schema,
                allow,
                shorteners,
                timeout_secs: timeout,
                json,
                quiet,
            };
            commands::verify::execute(image, options).await
        }
        Commands::Hash { image } => commands::hash::execute(image),
        Commands::Features { url, schema, json } => commands::features::execute(url, schema, json),
    };

    if let Err(err) = result {
        let exit = exit_codes::ExitCode::from_anyhow(&err);
        if let Some(message) = exit.message {
            eprintln!("{} {}", "error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}

/// Logs go to stderr so that `--json` output stays parseable.
fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "qrcert=debug,qrcert_core=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
