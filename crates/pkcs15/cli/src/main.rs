//! `pkcs15-crypt`: sign or decipher with a key held on a PKCS#15 smart card

use std::{path::PathBuf, process::ExitCode};

use clap::{ArgAction, ArgGroup, Parser};
use colored::Colorize;
use nexum_pkcs15_core::{
    CryptoFlags, HashAlgorithm, Operation, Options, Padding, SessionConfig, run,
};
use nexum_pkcs15_pcsc::{PcscCardLayer, Pkcs15Config};
use tracing::debug;
use zeroize::Zeroizing;

mod prompt;

use prompt::ConsoleCredentials;

#[derive(Parser)]
#[command(
    name = "pkcs15-crypt",
    version,
    about = "Perform crypto operations using PKCS#15 smart cards"
)]
#[command(group(ArgGroup::new("operation").required(true).args(["sign", "decipher"])))]
struct Cli {
    /// Perform digital signature operation
    #[arg(short, long)]
    sign: bool,

    /// Decipher operation
    #[arg(short = 'c', long)]
    decipher: bool,

    /// Selects the private key ID to use (hex)
    #[arg(short, long, value_name = "ID")]
    key: Option<String>,

    /// Uses reader number <N>
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    reader: usize,

    /// Selects the input file to use
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Outputs to file <FILE>, standard output when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Input file is a SHA-1 hash
    #[arg(long = "sha-1", conflicts_with = "md5")]
    sha1: bool,

    /// Input file is an MD5 hash
    #[arg(long)]
    md5: bool,

    /// Use PKCS#1 v1.5 padding
    #[arg(long)]
    pkcs1: bool,

    /// Uses password (PIN) <PIN>
    #[arg(short, long, value_name = "PIN")]
    pin: Option<String>,

    /// Quiet operation
    #[arg(short, long)]
    quiet: bool,

    /// Debug output, may be used several times
    #[arg(short, long, action = ArgAction::Count)]
    debug: u8,
}

impl Cli {
    fn into_options(self) -> Options {
        let operation = if self.sign {
            Operation::Sign
        } else {
            Operation::Decipher
        };

        let mut flags = CryptoFlags::default();
        if self.md5 {
            flags = flags.with_hash(HashAlgorithm::Md5);
        } else if self.sha1 {
            flags = flags.with_hash(HashAlgorithm::Sha1);
        }
        if self.pkcs1 {
            flags = flags.with_padding(Padding::Pkcs1);
        }

        let mut options = Options::new(operation, self.input);
        options.session = SessionConfig::new(self.reader).with_debug(self.debug);
        options.key_id = self.key;
        options.output = self.output;
        options.flags = flags;
        options.pin = self.pin.map(Zeroizing::new);
        options
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.quiet, cli.debug);

    let options = cli.into_options();
    debug!(?options, "Starting");

    let layer = PcscCardLayer::new(Pkcs15Config::default());
    match run(layer, &options, &mut ConsoleCredentials) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn setup_logging(quiet: bool, debug: u8) {
    let level = if quiet { "warn" } else { "info" };
    let card_level = match debug {
        0 => level,
        1 => "debug",
        _ => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("{level},nexum_pkcs15_pcsc={card_level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_ansi(true)
        .init();
}
