use std::{
    io::{self, Read, Write},
    ops::{Deref, DerefMut},
    time::Duration,
};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    command::Command,
    response::{Response, RX_PACKET_MAX_LEN},
};

pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// Baud rates the servo firmware can be configured for.
pub const SUPPORTED_BAUD_RATES: [u32; 11] = [
    4_800, 9_600, 14_400, 19_200, 38_400, 57_600, 115_200, 128_000, 250_000, 500_000, 1_000_000,
];

/// USB serial adapters buffer reads for up to this long.
const LATENCY_TIMER: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Baud rate {0} is not supported.")]
    UnsupportedBaudRate(u32),
    #[error("The port is not open.")]
    NotOpen,
}

/// Result of a single request/response exchange on the bus.
#[repr(i8)]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommError {
    #[error("Port is in use.")]
    PortBusy = -1,
    #[error("Failed to transmit instruction packet.")]
    TxFail = -2,
    #[error("Failed to get status packet from device.")]
    RxFail = -3,
    #[error("Incorrect instruction packet.")]
    TxError = -4,
    #[error("Now receiving status packet.")]
    RxWaiting = -5,
    #[error("There is no status packet.")]
    RxTimeout = -6,
    #[error("Incorrect status packet.")]
    RxCorrupt = -7,
    #[error("Protocol does not support this function.")]
    NotAvailable = -9,
}

impl CommError {
    pub fn code(self) -> i8 {
        self as i8
    }

    fn from_read(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::UnexpectedEof => Self::RxTimeout,
            _ => Self::RxFail,
        }
    }
}

/// A byte link to the servo bus with an explicit open/configure/close lifecycle.
pub trait TransportHandle: Read + Write {
    fn open(&mut self) -> Result<(), SerialError>;

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SerialError>;

    fn close(&mut self);

    /// Drops stale bytes left over from an earlier exchange.
    fn clear_input(&mut self) -> Result<(), SerialError> {
        Ok(())
    }

    /// Arms the read timeout for a status packet of `packet_len` bytes.
    fn set_packet_timeout(&mut self, _packet_len: usize) -> Result<(), SerialError> {
        Ok(())
    }
}

/// An opened transport. Closes it when dropped.
pub struct OpenPort<'a, T: TransportHandle + ?Sized> {
    port: &'a mut T,
}

impl<'a, T: TransportHandle + ?Sized> OpenPort<'a, T> {
    pub fn open(port: &'a mut T) -> Result<Self, SerialError> {
        port.open()?;
        Ok(Self { port })
    }
}

impl<T: TransportHandle + ?Sized> Deref for OpenPort<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &*self.port
    }
}

impl<T: TransportHandle + ?Sized> DerefMut for OpenPort<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.port
    }
}

impl<T: TransportHandle + ?Sized> Drop for OpenPort<'_, T> {
    fn drop(&mut self) {
        self.port.close();
    }
}

/// Serial device backed transport.
pub struct SerialTransport {
    device: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            port: None,
        }
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, SerialError::NotOpen))
    }
}

/// Time to read a packet of `packet_len` bytes, plus the adapter latency.
pub fn packet_timeout(baud_rate: u32, packet_len: usize) -> Duration {
    let per_byte = Duration::from_secs(10) / baud_rate.max(1);
    per_byte * (packet_len as u32 + 3) + LATENCY_TIMER
}

impl TransportHandle for SerialTransport {
    fn open(&mut self) -> Result<(), SerialError> {
        debug!(device = %self.device, baud_rate = self.baud_rate, "opening port");
        let port = serialport::new(&self.device, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(packet_timeout(self.baud_rate, 0))
            .open()?;
        self.port = Some(port);
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SerialError> {
        if !SUPPORTED_BAUD_RATES.contains(&baud_rate) {
            return Err(SerialError::UnsupportedBaudRate(baud_rate));
        }
        let port = self.port.as_mut().ok_or(SerialError::NotOpen)?;
        port.set_baud_rate(baud_rate)?;
        self.baud_rate = baud_rate;
        debug!(device = %self.device, baud_rate, "baud rate set");
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(device = %self.device, "port closed");
        }
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.port()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn set_packet_timeout(&mut self, packet_len: usize) -> Result<(), SerialError> {
        let timeout = packet_timeout(self.baud_rate, packet_len);
        self.port()?.set_timeout(timeout)?;
        Ok(())
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port()?.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port()?.flush()
    }
}

/// Sends one instruction packet and waits for the matching status packet.
///
/// Broadcast commands get no reply, so `Ok(None)` is returned for them.
pub fn packet_tx_rx<T: TransportHandle + ?Sized>(
    transmit: Command,
    port: &mut T,
) -> Result<Option<Response>, CommError> {
    let is_broadcast = transmit.id.is_broadcast();
    let expected_len = 6 + transmit.instruction.response_len();
    let packet = transmit.build().ok_or(CommError::TxError)?;

    port.clear_input().map_err(|_| CommError::TxFail)?;
    trace!(?packet, "tx");
    port.write_all(&packet)
        .and_then(|()| port.flush())
        .map_err(|_| CommError::TxFail)?;

    // Device does not respond to broadcast, so do not listen for response.
    if is_broadcast {
        return Ok(None);
    }

    port.set_packet_timeout(expected_len).map_err(|_| CommError::RxFail)?;

    // Noise, realignment and replies for other IDs all draw on one budget.
    let mut discarded = 0usize;
    loop {
        let receive = read_packet(port, &mut discarded)?;
        trace!(packet = ?receive, "rx");
        let response = Response::try_from(receive.as_slice()).map_err(|_| CommError::RxCorrupt)?;

        // Another device answered late; keep listening for ours.
        if response.id != transmit.id {
            debug!(
                expected = transmit.id.value(),
                got = response.id.value(),
                "skipping status packet"
            );
            discard(&mut discarded, receive.len())?;
            continue;
        }

        return Ok(Some(response));
    }
}

/// Counts `count` unusable bytes against the exchange budget.
fn discard(discarded: &mut usize, count: usize) -> Result<(), CommError> {
    *discarded += count;
    if *discarded > RX_PACKET_MAX_LEN {
        return Err(CommError::RxCorrupt);
    }
    Ok(())
}

/// Reads one raw status packet, discarding noise before the header.
fn read_packet<T: Read + ?Sized>(
    port: &mut T,
    discarded: &mut usize,
) -> Result<Vec<u8>, CommError> {
    let mut byte = [0u8; 1];
    let mut previous = 0u8;

    loop {
        port.read_exact(&mut byte).map_err(CommError::from_read)?;
        if previous == 0xff && byte[0] == 0xff {
            break;
        }
        previous = byte[0];
        discard(discarded, 1)?;
    }

    let mut receive = vec![0xff, 0xff, 0, 0]; // [ HEADER0, HEADER1, ID, LENGTH ]
    port.read_exact(&mut receive[2..4]).map_err(CommError::from_read)?;

    // Header bytes repeat on a noisy line; realign on the last pair.
    while receive[2] == 0xff {
        discard(discarded, 1)?;
        receive[2] = receive[3];
        port.read_exact(&mut receive[3..4]).map_err(CommError::from_read)?;
    }

    let length = receive[3] as usize;
    if length < 2 || receive.len() + length > RX_PACKET_MAX_LEN {
        return Err(CommError::RxCorrupt);
    }

    let mut remain = vec![0u8; length];
    port.read_exact(&mut remain).map_err(CommError::from_read)?;
    receive.extend(remain);

    Ok(receive)
}
