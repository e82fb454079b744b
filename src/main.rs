//! dsbond intake CLI
//!
//! Entry point for the `dsbond-intake` command-line tool.

use clap::{Parser, Subcommand};
use dsbond_intake::store::FsJobStore;
use dsbond_intake::telemetry::init_logging;
use dsbond_intake::{IntakeConfig, IntakeService, RpcHandler, SubmissionRequest};
use dsbond_protocol::{Field, SubmitResponse};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

/// Exit code for input the submitter must fix
const EXIT_INVALID: i32 = 1;

/// Exit code for storage and configuration failures
const EXIT_FAILURE: i32 = 2;

#[derive(Parser)]
#[command(name = "dsbond-intake")]
#[command(about = "Job intake gate for the disulfide-bond prediction pipeline", version)]
struct Cli {
    /// Path to config file (default: ./dsbond-intake.toml if present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override the job store root directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log at debug level unless DSBOND_LOG is set
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one job
    Submit {
        /// Requester email address
        #[arg(long, short = 'e')]
        email: String,

        /// Protein sequence, or '-' to read it from stdin
        #[arg(long, short = 's')]
        sequence: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Answer line-delimited JSON submit requests on stdin/stdout
    Serve,

    /// Check and print the effective configuration
    Verify,

    /// Remove staging files left behind by crashed submitters
    Sweep {
        /// Minimum age of files to remove (default: storage.staging_max_age_secs)
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match IntakeConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_root(cli.root),
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(EXIT_FAILURE);
        }
    };

    match cli.command {
        Commands::Submit {
            email,
            sequence,
            json,
        } => run_submit(&config, email, sequence, json),
        Commands::Serve => run_serve(&config),
        Commands::Verify => run_verify(&config),
        Commands::Sweep { max_age_secs } => run_sweep(&config, max_age_secs),
    }
}

fn build_service(config: &IntakeConfig) -> IntakeService {
    match IntakeService::from_config(config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_FAILURE);
        }
    }
}

fn run_submit(config: &IntakeConfig, email: String, sequence: String, json: bool) {
    let sequence = if sequence == "-" {
        let mut buf = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut buf) {
            eprintln!("Error reading sequence from stdin: {}", e);
            process::exit(EXIT_FAILURE);
        }
        buf
    } else {
        sequence
    };

    let service = build_service(config);
    let request = SubmissionRequest::new(email, sequence);

    let (response, exit_code) = match service.submit(request.clone()) {
        Ok(receipt) => (
            SubmitResponse::accepted(
                None,
                receipt.job_id.to_string(),
                receipt.email,
                receipt.sequence,
            ),
            0,
        ),
        Err(e) => {
            let failure = e.to_failure();
            let code = if failure.code.is_user_error() {
                EXIT_INVALID
            } else {
                EXIT_FAILURE
            };
            (
                SubmitResponse::rejected(None, request.email, request.sequence, failure),
                code,
            )
        }
    };

    if json {
        match serde_json::to_string_pretty(&response) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(EXIT_FAILURE);
            }
        }
    } else {
        print_human(&response);
    }

    service.flush_notifications();
    process::exit(exit_code);
}

fn print_human(response: &SubmitResponse) {
    if let (true, Some(job_id)) = (response.ok, response.job_id.as_ref()) {
        println!("Job accepted: {}", job_id);
        println!("  Email: {}", response.email);
        println!("  Residues: {}", response.sequence.len());
        println!("  Sequence: {}", response.sequence);
        return;
    }

    let Some(ref error) = response.error else {
        return;
    };
    eprintln!("Submission rejected: {}", error.message);
    for (field, label) in [(Field::Email, "email"), (Field::Sequence, "sequence")] {
        if let Some(reason) = error.field_reason(field) {
            eprintln!("  {}: {}", label, reason);
        }
    }
    if !error.fields.is_empty() {
        eprintln!();
        eprintln!("  Email as entered: {}", response.email);
        eprintln!("  Sequence as entered: {}", response.sequence.trim_end());
    }
}

fn run_serve(config: &IntakeConfig) {
    let service = Arc::new(build_service(config));
    let handler = RpcHandler::new(service.clone());
    let result = handler.run();
    service.flush_notifications();
    if let Err(e) = result {
        eprintln!("Serve error: {}", e);
        process::exit(EXIT_FAILURE);
    }
}

fn run_verify(config: &IntakeConfig) {
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        process::exit(EXIT_FAILURE);
    }

    match config.to_toml() {
        Ok(text) => {
            println!("Configuration valid");
            println!();
            print!("{}", text);
        }
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            process::exit(EXIT_FAILURE);
        }
    }
}

fn run_sweep(config: &IntakeConfig, max_age_secs: Option<u64>) {
    let store = match FsJobStore::open(&config.storage.root) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening job store: {}", e);
            process::exit(EXIT_FAILURE);
        }
    };

    let max_age =
        Duration::from_secs(max_age_secs.unwrap_or(config.storage.staging_max_age_secs));
    match store.sweep_staging(max_age) {
        Ok(removed) => println!("Removed {} stale staging file(s)", removed),
        Err(e) => {
            eprintln!("Sweep failed: {}", e);
            process::exit(EXIT_FAILURE);
        }
    }
}
