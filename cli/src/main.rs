mod report;

use std::process::ExitCode;
use std::time::Duration;

use ccid_bulk::usb::{list_readers, UsbReader};
use ccid_bulk::{CcidError, Session, SessionConfig};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::report::{AtrReport, ReaderList, StatusReport, TransmitReport};

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("Error occurred on communicating with USB device: {0}")]
    Usb(#[from] ccid_bulk::usb::Error),

    #[error("CCID exchange failed: {0}")]
    Ccid(#[from] CcidError),

    #[error("Invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Could not serialize the output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ATR {actual} does not start with {expected}")]
    AtrMismatch { expected: String, actual: String },
}

type Result<T> = std::result::Result<T, Error>;

fn parse_id(s: &str) -> std::result::Result<u16, String> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Vendor ID of the reader, in hex
    #[arg(long, value_parser = parse_id, default_value = "072F")]
    vid: u16,

    /// Product ID of the reader, in hex
    #[arg(long, value_parser = parse_id, default_value = "90CC")]
    pid: u16,

    /// Timeout for each bulk transfer, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Slot to address
    #[arg(long, default_value_t = 0)]
    slot: u8,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists connected devices exposing a CCID interface
    List,

    /// Powers the card on and prints its ATR
    PowerOn,

    /// Powers the card off
    PowerOff,

    /// Prints the slot status
    Status,

    /// Sends a short APDU, given in hex, to the powered card
    Transmit { apdu: String },

    /// Power-cycles the card and checks the ATR prefix
    Check {
        /// Expected ATR prefix, in hex
        #[arg(long, default_value = "3B8C8001")]
        expect_atr_prefix: String,
    },
}

impl Cli {
    fn open(&self) -> Result<Session<UsbReader>> {
        let config = SessionConfig::default()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_slot(self.slot);

        debug!("Opening reader {:04x}:{:04x}", self.vid, self.pid);

        let reader = UsbReader::open(self.vid, self.pid)?;

        Ok(Session::new(reader, config)?)
    }

    fn print<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + std::fmt::Display,
    {
        match self.json {
            true => println!("{}", serde_json::to_string_pretty(value)?),
            _ => println!("{value}"),
        }

        Ok(())
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::List => cli.print(&ReaderList(list_readers()?)),
        Commands::PowerOn => {
            let atr = cli.open()?.power_on()?;
            cli.print(&AtrReport::from(&atr))
        }
        Commands::PowerOff => {
            let response = cli.open()?.power_off()?;
            cli.print(&StatusReport::from(&response))
        }
        Commands::Status => {
            let response = cli.open()?.slot_status()?;
            cli.print(&StatusReport::from(&response))
        }
        Commands::Transmit { apdu } => {
            let apdu = hex::decode(apdu.replace(' ', ""))?;
            let mut session = cli.open()?;
            session.power_on()?;

            let response = session.transmit(&apdu)?;
            cli.print(&TransmitReport {
                response: hex::encode_upper(response),
            })
        }
        Commands::Check { expect_atr_prefix } => {
            let prefix = hex::decode(expect_atr_prefix)?;
            let mut session = cli.open()?;

            let power_off = session.power_off()?;
            info!("Power off: {}", StatusReport::from(&power_off));

            let atr = session.power_on()?;
            if !atr.starts_with(&prefix) {
                return Err(Error::AtrMismatch {
                    expected: hex::encode_upper(&prefix),
                    actual: hex::encode_upper(atr.as_bytes()),
                });
            }

            cli.print(&AtrReport::from(&atr))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
