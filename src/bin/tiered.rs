//! tiered CLI: encrypt and decrypt text envelopes against a local state directory.
//!
//! State directory layout:
//! ```text
//! <state-dir>/
//!   keys/          software key store
//!   prefs.json     persisted installation password
//! ```

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tiered_envelope::{wire, Engine, EngineConfig, FilePreferences, SoftwareKeyStore};

#[derive(Parser)]
#[command(name = "tiered", version, about = "Tiered text encryption: keystore AES, wrapped RSA, or password derived.")]
struct Cli {
    /// Directory holding the key store and preferences.
    #[arg(long, global = true, default_value = ".tiered")]
    state_dir: PathBuf,

    /// JSON engine configuration; tier flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Oldest tier whose envelopes must stay decryptable.
    #[arg(long, global = true)]
    min_tier: Option<i32>,

    /// Tier of this platform.
    #[arg(long, global = true)]
    platform_tier: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt text (argument or stdin) into an envelope.
    Encrypt {
        text: Option<String>,

        /// Use this password instead of the stored one.
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Decrypt an envelope (argument or stdin).
    Decrypt {
        envelope: Option<String>,

        /// Password the envelope was encrypted with.
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Show envelope metadata (no decryption).
    Inspect { envelope: Option<String> },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Encrypt { text, password } => {
            let engine = open_engine(&cli)?;
            let text = input(text.as_deref())?;
            let envelope = match password {
                Some(pw) => engine.encrypt_with_password(&text, pw)?,
                None => engine.encrypt(&text)?,
            };
            println!("{}", envelope);
        }
        Commands::Decrypt { envelope, password } => {
            let engine = open_engine(&cli)?;
            let envelope = input(envelope.as_deref())?;
            let plaintext = match password {
                Some(pw) => engine.decrypt_with_password(envelope.trim_end(), pw)?,
                None => engine.decrypt(envelope.trim_end())?,
            };
            println!("{}", plaintext);
        }
        Commands::Inspect { envelope } => {
            let envelope = input(envelope.as_deref())?;
            let info = wire::inspect(envelope.trim_end())?;
            println!("mode:    {}", info.mode);
            println!("tier:    {}", info.mode.min_tier());
            println!("fields:  {:?}", info.field_lengths);
        }
    }
    Ok(())
}

fn open_engine(cli: &Cli) -> Result<Engine, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(min) = cli.min_tier {
        config.min_tier = min;
    }
    if let Some(platform) = cli.platform_tier {
        config.platform_tier = platform;
    }

    let (keystore, prefs) = open_state(&cli.state_dir)?;
    Ok(Engine::with_config(config, Arc::new(keystore), Arc::new(prefs))?)
}

fn open_state(dir: &Path) -> Result<(SoftwareKeyStore, FilePreferences), Box<dyn std::error::Error>> {
    let keystore = SoftwareKeyStore::open(dir.join("keys"))?;
    let prefs = FilePreferences::new(dir.join("prefs.json"))?;
    Ok((keystore, prefs))
}

fn input(arg: Option<&str>) -> io::Result<String> {
    match arg {
        Some(text) => Ok(text.to_string()),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}
