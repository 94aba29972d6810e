use clap::{ArgAction, Parser};
use scservo_ping::{
    protocol::ProtocolEnd,
    scan::{ScanRequest, DEFAULT_DEVICE, DEFAULT_ID_END, DEFAULT_ID_START},
    serial::DEFAULT_BAUD_RATE,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "scservo-ping")]
#[command(about = "Ping SCServo devices on a given port.")]
pub struct Args {
    /// Device name (e.g., /dev/ttyUSB0 or COM1)
    #[arg(long, default_value = DEFAULT_DEVICE)]
    pub device: String,

    /// Baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baudrate: u32,

    /// Protocol end (0 for STS/SMS, 1 for SCS)
    #[arg(long, default_value = "0")]
    pub protocol: ProtocolEnd,

    /// Start of ID range
    #[arg(long = "id_start", visible_alias = "id-start", default_value_t = DEFAULT_ID_START)]
    pub id_start: u8,

    /// End of ID range, inclusive
    #[arg(long = "id_end", visible_alias = "id-end", default_value_t = DEFAULT_ID_END)]
    pub id_end: u8,

    /// Print without ANSI colors
    #[arg(long)]
    pub no_color: bool,

    /// Log more detail to stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn request(&self) -> ScanRequest {
        ScanRequest {
            device: self.device.clone(),
            baud_rate: self.baudrate,
            protocol: self.protocol,
            id_start: self.id_start,
            id_end: self.id_end,
        }
    }
}

/// Logs go to stderr so they never mix with the scan output.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
