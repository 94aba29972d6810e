//! Walks an ID range, pinging each servo in turn and reporting what answered.

use std::{
    fmt::Display,
    io::{self, Write},
    ops::RangeInclusive,
};

use colored::Colorize;
use thiserror::Error;
use tracing::debug;

use crate::{
    protocol::{Pong, ProtocolEnd, ProtocolHandler},
    serial::{OpenPort, SerialError, TransportHandle, DEFAULT_BAUD_RATE},
};

pub const DEFAULT_DEVICE: &str = "/dev/tty.usbserial-21240";
pub const DEFAULT_ID_START: u8 = 1;
pub const DEFAULT_ID_END: u8 = 253;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to open the port {device}: {source}")]
    PortOpen {
        device: String,
        #[source]
        source: SerialError,
    },
    #[error("Failed to change the baudrate to {baud_rate}: {source}")]
    BaudRate {
        baud_rate: u32,
        #[source]
        source: SerialError,
    },
    #[error("Failed to write scan output: {0}")]
    Output(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub device: String,
    pub baud_rate: u32,
    pub protocol: ProtocolEnd,
    pub id_start: u8,
    /// Inclusive.
    pub id_end: u8,
}

impl ScanRequest {
    /// Empty when `id_start > id_end`.
    pub fn ids(&self) -> RangeInclusive<u8> {
        self.id_start..=self.id_end
    }
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_owned(),
            baud_rate: DEFAULT_BAUD_RATE,
            protocol: ProtocolEnd::default(),
            id_start: DEFAULT_ID_START,
            id_end: DEFAULT_ID_END,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    Success { id: u8, model_number: u16 },
    CommFailure { id: u8, reason: String },
    DeviceError { id: u8, error_code: u8 },
}

impl PingOutcome {
    pub fn id(&self) -> u8 {
        match self {
            Self::Success { id, .. } | Self::CommFailure { id, .. } | Self::DeviceError { id, .. } => {
                *id
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    outcomes: Vec<PingOutcome>,
}

impl ScanReport {
    pub fn outcomes(&self) -> &[PingOutcome] {
        &self.outcomes
    }

    /// `(id, model_number)` of every servo that answered cleanly, in scan order.
    pub fn successes(&self) -> impl Iterator<Item = (u8, u16)> + '_ {
        self.outcomes.iter().filter_map(|outcome| match *outcome {
            PingOutcome::Success { id, model_number } => Some((id, model_number)),
            _ => None,
        })
    }

    fn push(&mut self, outcome: PingOutcome) {
        self.outcomes.push(outcome);
    }
}

/// Line oriented output, bright green for good news and bright red for bad.
pub struct Console<W> {
    out: W,
    color: bool,
}

impl<W: Write> Console<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn plain(&mut self, line: impl Display) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }

    pub fn success(&mut self, line: impl Display) -> io::Result<()> {
        self.colored("", line, true)
    }

    pub fn failure(&mut self, line: impl Display) -> io::Result<()> {
        self.colored("", line, false)
    }

    fn colored(&mut self, prefix: &str, line: impl Display, good: bool) -> io::Result<()> {
        let line = line.to_string();
        match (self.color, good) {
            (false, _) => writeln!(self.out, "{prefix}{line}"),
            (true, true) => writeln!(self.out, "{prefix}{}", line.bright_green()),
            (true, false) => writeln!(self.out, "{prefix}{}", line.bright_red()),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Pings every ID of `request` over `transport`.
///
/// The port is opened and configured first; failing either step ends the run
/// before any ID is queried. Once open, the port is closed exactly once.
pub fn scan<T, H, W>(
    request: &ScanRequest,
    transport: &mut T,
    handler: &H,
    console: &mut Console<W>,
) -> Result<ScanReport, ScanError>
where
    T: TransportHandle + ?Sized,
    H: ProtocolHandler<T> + ?Sized,
    W: Write,
{
    let device = &request.device;
    let mut port = match OpenPort::open(transport) {
        Ok(port) => port,
        Err(source) => {
            console.failure(format_args!("Failed to open the port: {device}"))?;
            return Err(ScanError::PortOpen {
                device: device.clone(),
                source,
            });
        }
    };
    console.success(format_args!("Succeeded to open the port: {device}"))?;

    let baud_rate = request.baud_rate;
    if let Err(source) = port.set_baud_rate(baud_rate) {
        console.failure(format_args!("Failed to change the baudrate to {baud_rate}"))?;
        return Err(ScanError::BaudRate { baud_rate, source });
    }
    console.success(format_args!("Succeeded to change the baudrate to {baud_rate}"))?;

    console.plain(format_args!(
        "Scanning for servos in ID range: {}-{}...",
        request.id_start, request.id_end
    ))?;

    let mut report = ScanReport::default();
    for id in request.ids() {
        let outcome = match handler.ping(&mut *port, id) {
            Ok(Pong {
                model_number,
                error: 0,
            }) => {
                console.success(format_args!(
                    "[ID:{id:03}] Ping succeeded. SCServo model number: {model_number}"
                ))?;
                PingOutcome::Success { id, model_number }
            }
            Ok(Pong { error, .. }) => {
                let description = handler.describe_device_error(error);
                console.failure(format_args!("[ID:{id:03}] {description}"))?;
                PingOutcome::DeviceError {
                    id,
                    error_code: error,
                }
            }
            Err(error) => {
                console.failure(format_args!("[ID:{id:03}] {error}"))?;
                PingOutcome::CommFailure {
                    id,
                    reason: error.to_string(),
                }
            }
        };
        debug!(?outcome, "ping");
        report.push(outcome);
    }

    drop(port);

    console.plain("\nSummary of Successful Pings:")?;
    let mut found = false;
    for (id, model_number) in report.successes() {
        found = true;
        console.colored("  - ", format_args!("ID:{id} Model:{model_number}"), true)?;
    }
    if !found {
        console.colored("  ", "No successful pings.", false)?;
    }

    Ok(report)
}
