//! ksigner CLI
//!
//! Entry point for the `ksigner` command-line tool.

use clap::{Parser, Subcommand};
use ksigner::artifact;
use ksigner::config::{EffectiveConfig, KsignerConfig};
use ksigner::qr::{stdin_lines, LineCapture};
use ksigner::signal::SignalHandler;
use ksigner::workflow::{
    ErrorClass, Secp256k1Verifier, SignRequest, SignSettings, SigningCoordinator,
    TerminalOperator, VerificationCoordinator, VerificationRequest,
};
use ksigner::{hash, logging, CertificateError, SigningState};
use ksigner_cert::PublicKeyRecord;
use std::fmt::Display;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "ksigner")]
#[command(about = "Sign files with an air-gapped secp256k1 device over QR codes", version)]
struct Cli {
    /// Log level: trace, debug, info, warn or error (default: $LOG_LEVEL, then config)
    #[arg(long, global = true)]
    log: Option<String>,

    /// Path to config file (default: ~/.config/ksigner/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a file, show the hash QR and capture signature and public key
    Sign {
        /// File to sign
        #[arg(long, short = 'f')]
        file: PathBuf,

        /// Certificate owner, saved as <owner>.pem next to the file
        #[arg(long, short = 'o')]
        owner: Option<String>,

        /// The device exports uncompressed public keys
        #[arg(long, short = 'u')]
        uncompressed: bool,

        /// Continue from artifacts left by an interrupted run
        #[arg(long)]
        resume: bool,

        /// Give up on a scan after this many seconds (0 waits forever)
        #[arg(long)]
        timeout: Option<u64>,

        /// Also save the hash QR code as an SVG file
        #[arg(long)]
        qr_svg: Option<PathBuf>,

        /// Render the QR code dark-on-light
        #[arg(long)]
        no_invert: bool,
    },

    /// Verify a file against its signature and public key certificate
    Verify {
        /// Signed file
        #[arg(long, short = 'f')]
        file: PathBuf,

        /// Signature file (.sig)
        #[arg(long, short = 's')]
        sig_file: PathBuf,

        /// Public key certificate (.pem)
        #[arg(long, short = 'p')]
        pub_file: PathBuf,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Hash a file and save <file>.sha256sum.txt
    Hash {
        #[arg(long, short = 'f')]
        file: PathBuf,
    },

    /// Convert a hex public key from the device into <owner>.pem
    Pem {
        /// Public key as hex
        #[arg(long)]
        pubkey: String,

        #[arg(long, short = 'o')]
        owner: Option<String>,

        #[arg(long, short = 'u')]
        uncompressed: bool,

        /// Directory to write the certificate to (default: current directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let effective = match EffectiveConfig::load(cli.config.as_deref(), cli_overrides(&cli.command)) {
        Ok(effective) => effective,
        Err(e) => process::exit(fail(e, ErrorClass::Input)),
    };

    let env_level = std::env::var(logging::LOG_LEVEL_ENV).ok();
    let level = match logging::resolve_level(
        cli.log.as_deref(),
        env_level.as_deref(),
        &effective.config.log,
    ) {
        Ok(level) => level,
        Err(e) => process::exit(fail(e, ErrorClass::Input)),
    };
    if let Err(e) = logging::init(level) {
        process::exit(fail(e, ErrorClass::Input));
    }
    for source in &effective.sources {
        tracing::debug!(
            origin = ?source.origin,
            path = ?source.path,
            digest = ?source.digest,
            "config source"
        );
    }

    let config = &effective.config;
    let code = match cli.command {
        Commands::Sign {
            file,
            resume,
            qr_svg,
            ..
        } => run_sign(config, file, resume, qr_svg),
        Commands::Verify {
            file,
            sig_file,
            pub_file,
            json,
        } => run_verify(file, sig_file, pub_file, json),
        Commands::Hash { file } => run_hash(file),
        Commands::Pem { pubkey, dir, .. } => run_pem(config, &pubkey, dir),
    };

    process::exit(code);
}

/// Flags that override configuration values
fn cli_overrides(command: &Commands) -> Option<serde_json::Value> {
    let mut overrides = serde_json::Map::new();

    let (owner, uncompressed) = match command {
        Commands::Sign {
            owner,
            uncompressed,
            timeout,
            no_invert,
            ..
        } => {
            if let Some(seconds) = timeout {
                overrides.insert(
                    "capture".to_string(),
                    serde_json::json!({ "timeout_seconds": seconds }),
                );
            }
            if *no_invert {
                overrides.insert("qr".to_string(), serde_json::json!({ "invert": false }));
            }
            (owner, *uncompressed)
        }
        Commands::Pem {
            owner, uncompressed, ..
        } => (owner, *uncompressed),
        _ => return None,
    };

    if let Some(owner) = owner {
        overrides.insert("owner".to_string(), serde_json::Value::String(owner.clone()));
    }
    if uncompressed {
        overrides.insert("uncompressed".to_string(), serde_json::Value::Bool(true));
    }

    (!overrides.is_empty()).then(|| serde_json::Value::Object(overrides))
}

fn fail(message: impl Display, class: ErrorClass) -> i32 {
    eprintln!("Error: {}", message);
    class.exit_code()
}

fn run_sign(config: &KsignerConfig, file: PathBuf, resume: bool, qr_svg: Option<PathBuf>) -> i32 {
    let handler = SignalHandler::new();
    if let Err(e) = handler.install() {
        return fail(format!("failed to install signal handler: {}", e), ErrorClass::Input);
    }

    let capture =
        LineCapture::new(stdin_lines(), handler.state()).with_timeout(config.capture.timeout());
    let request = SignRequest {
        file,
        owner: config.owner.clone(),
        format: config.key_format(),
    };
    let settings = SignSettings {
        max_capture_attempts: config.capture.max_attempts,
        qr_svg,
    };
    let operator = TerminalOperator::new(config.qr.invert);

    let mut coordinator = match SigningCoordinator::new(request, settings, capture, operator) {
        Ok(coordinator) => coordinator,
        Err(e) => return fail(&e, e.class()),
    };

    if resume {
        if let Err(e) = coordinator.resume() {
            return fail(&e, e.class());
        }
    }

    match coordinator.run() {
        Ok(outcome) => {
            println!();
            println!("Signed {}", outcome.digest.source_path().display());
            println!("  digest:      {}", outcome.digest_path.display());
            println!("  signature:   {}", outcome.signature_path.display());
            println!("  certificate: {}", outcome.certificate_path.display());
            0
        }
        Err(e) => {
            let class = e.class();
            tracing::debug!(state = %coordinator.state(), error = ?e, "signing stopped");
            if class == ErrorClass::Cancelled {
                eprintln!("{}", e);
            } else {
                eprintln!("Error: {}", e);
            }
            if coordinator.state() > SigningState::Idle {
                eprintln!("Run again with --resume to continue from the saved artifacts.");
            }
            class.exit_code()
        }
    }
}

fn run_verify(file: PathBuf, sig_file: PathBuf, pub_file: PathBuf, json: bool) -> i32 {
    let request = VerificationRequest {
        file,
        pubkey_pem: pub_file,
        signature: sig_file,
    };

    let result = match VerificationCoordinator::new(Secp256k1Verifier).verify(&request) {
        Ok(result) => result,
        Err(e) => return fail(&e, e.class()),
    };

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{}", text),
            Err(e) => return fail(e, ErrorClass::Engine),
        }
    } else {
        println!("{}", result.detail);
    }

    if result.ok {
        0
    } else {
        1
    }
}

fn run_hash(file: PathBuf) -> i32 {
    let persisted = hash::hash_file(&file).and_then(|digest| {
        let path = hash::persist_digest(&digest)?;
        Ok((digest, path))
    });

    match persisted {
        Ok((digest, path)) => {
            println!("{}", digest.sidecar_line());
            tracing::debug!(path = %path.display(), "digest sidecar written");
            0
        }
        Err(e) => fail(e, ErrorClass::Input),
    }
}

fn run_pem(config: &KsignerConfig, pubkey: &str, dir: Option<PathBuf>) -> i32 {
    let certificate = match PublicKeyRecord::parse(pubkey, config.key_format())
        .and_then(|record| record.to_certificate(&config.owner))
    {
        Ok(certificate) => certificate,
        Err(e @ CertificateError::InvalidOwner { .. }) => return fail(e, ErrorClass::Input),
        Err(e) => return fail(e, ErrorClass::Encoding),
    };

    let dir = dir.unwrap_or_else(|| PathBuf::from("."));
    match artifact::persist_certificate(&certificate, &dir) {
        Ok(path) => {
            println!("{}", certificate.pem_text);
            println!("{} saved", path.display());
            0
        }
        Err(e) => fail(e, ErrorClass::Input),
    }
}
