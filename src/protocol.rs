use std::{fmt::Display, str::FromStr};

use enumn::N;
use thiserror::Error;
use tracing::trace;

use crate::{
    command::Command,
    hardware::{address::ReadRegion, DriverErrors, Instruction, ID},
    serial::{packet_tx_rx, CommError, TransportHandle},
};

/// Protocol dialect, which decides the byte order of register words.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, N)]
pub enum ProtocolEnd {
    /// STS/SMS series, little endian words.
    #[default]
    Sts = 0,
    /// SCS series, big endian words.
    Scs = 1,
}

impl ProtocolEnd {
    pub fn word(self, first: u8, second: u8) -> u16 {
        match self {
            Self::Sts => u16::from_le_bytes([first, second]),
            Self::Scs => u16::from_be_bytes([first, second]),
        }
    }
}

impl Display for ProtocolEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sts => write!(f, "STS/SMS"),
            Self::Scs => write!(f, "SCS"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Protocol must be 0 (STS/SMS) or 1 (SCS), got {0:?}.")]
pub struct ProtocolEndError(String);

impl FromStr for ProtocolEnd {
    type Err = ProtocolEndError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(ProtocolEnd::n)
            .ok_or_else(|| ProtocolEndError(s.to_owned()))
    }
}

/// Reply to a successful ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong {
    pub model_number: u16,
    /// Error byte reported by the device, zero when healthy.
    pub error: u8,
}

pub trait ProtocolHandler<T: ?Sized> {
    fn ping(&self, port: &mut T, id: u8) -> Result<Pong, CommError>;

    fn describe_device_error(&self, code: u8) -> String {
        DriverErrors::from_byte(code)
            .map(|errors| errors.to_string())
            .unwrap_or_default()
    }
}

/// Speaks the SCServo packet protocol over any transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketHandler {
    end: ProtocolEnd,
}

impl PacketHandler {
    pub fn new(end: ProtocolEnd) -> Self {
        Self { end }
    }

    fn read_word<T: TransportHandle + ?Sized>(
        &self,
        port: &mut T,
        id: ID,
        region: ReadRegion,
    ) -> Result<(u16, u8), CommError> {
        let read = Command::new(id, Instruction::read(region));
        let response = packet_tx_rx(read, port)?.ok_or(CommError::RxFail)?;

        let [first, second, ..] = response.payload[..] else {
            return Err(CommError::RxCorrupt);
        };

        Ok((self.end.word(first, second), response.error))
    }
}

impl<T: TransportHandle + ?Sized> ProtocolHandler<T> for PacketHandler {
    fn ping(&self, port: &mut T, id: u8) -> Result<Pong, CommError> {
        let id = match ID::try_from(id) {
            Ok(ID::Single(id)) => ID::Single(id),
            _ => return Err(CommError::NotAvailable),
        };

        packet_tx_rx(Command::new(id, Instruction::ping()), port)?;
        let (model_number, error) = self.read_word(port, id, ReadRegion::model())?;
        trace!(id = id.value(), model_number, error, "pong");

        Ok(Pong {
            model_number,
            error,
        })
    }
}
