use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IDError {
    #[error("ID value out of allowed range.")]
    Range,
    #[error("ID cannot be broadcast.")]
    MustNotBroadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ID {
    Broadcast,
    Single(u8),
}

impl ID {
    const BROADCAST: u8 = 0xfe;
    const MAX: u8 = 0xfd;

    pub fn broadcast() -> Self {
        Self::Broadcast
    }

    pub fn single(value: u8) -> Result<Self, IDError> {
        match value {
            Self::BROADCAST => Err(IDError::MustNotBroadcast),
            0..=Self::MAX => Ok(Self::Single(value)),
            _ => Err(IDError::Range),
        }
    }

    pub fn is_broadcast(self) -> bool {
        matches!(self, Self::Broadcast)
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Broadcast => Self::BROADCAST,
            Self::Single(x) => x,
        }
    }
}

impl From<ID> for u8 {
    fn from(id: ID) -> Self {
        id.value()
    }
}

impl TryFrom<u8> for ID {
    type Error = IDError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value == Self::BROADCAST {
            return Ok(Self::Broadcast);
        }

        Self::single(value)
    }
}

pub mod address {
    /// Model number, one word in EEPROM.
    pub const MODEL: u8 = 3;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReadRegion {
        pub(crate) start: u8,
        pub(crate) length: u8,
    }

    impl ReadRegion {
        pub fn new(start: u8, length: u8) -> Self {
            Self { start, length }
        }

        pub fn word(start: u8) -> Self {
            Self::new(start, 2)
        }

        pub fn model() -> Self {
            Self::word(MODEL)
        }
    }
}

/// Error byte of a status packet. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub struct DriverErrors {
    errors: u8,
}

impl Display for DriverErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let errors: Vec<String> = DriverError::VALUES
            .into_iter()
            .filter(|&error| self.contains(error))
            .map(|error| format!("{error}"))
            .collect();

        if errors.is_empty() {
            return write!(f, "Unknown device error ({:#04x}).", self.errors);
        }
        write!(f, "{}", errors.join(" "))
    }
}

impl DriverErrors {
    fn contains(self, error: DriverError) -> bool {
        self.errors & error as u8 > 0
    }

    pub fn from_byte(value: u8) -> Option<Self> {
        (value != 0).then_some(Self { errors: value })
    }

    pub fn code(self) -> u8 {
        self.errors
    }
}

#[repr(u8)]
#[derive(Debug, Error, Clone, Copy)]
pub enum DriverError {
    #[error("Input voltage error.")]
    Voltage = 1,
    #[error("Angle sensor error.")]
    Angle = 2,
    #[error("Overheat error.")]
    OverHeat = 4,
    #[error("Over current error.")]
    OverEle = 8,
    #[error("Overload error.")]
    OverLoad = 32,
}

impl DriverError {
    const VALUES: [Self; 5] = [
        Self::Voltage,
        Self::Angle,
        Self::OverHeat,
        Self::OverEle,
        Self::OverLoad,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Ping,
    Read(address::ReadRegion),
}

impl Instruction {
    pub fn ping() -> Instruction {
        Self::Ping
    }

    pub fn read(region: address::ReadRegion) -> Self {
        Self::Read(region)
    }

    /// Number of parameter bytes the device returns in its status packet.
    pub fn response_len(&self) -> usize {
        match self {
            Self::Ping => 0,
            Self::Read(region) => region.length as usize,
        }
    }

    pub(crate) fn data(self) -> Vec<u8> {
        match self {
            Self::Ping => Vec::from([0x01]),
            Self::Read(region) => Vec::from([0x02, region.start, region.length]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_accepts_scan_range() {
        assert_eq!(ID::try_from(0).unwrap(), ID::Single(0));
        assert_eq!(ID::try_from(253).unwrap(), ID::Single(253));
        assert_eq!(ID::try_from(254).unwrap(), ID::Broadcast);
        assert!(matches!(ID::try_from(255), Err(IDError::Range)));
        assert!(matches!(ID::single(254), Err(IDError::MustNotBroadcast)));
    }

    #[test]
    fn zero_error_byte_is_not_an_error() {
        assert_eq!(DriverErrors::from_byte(0), None);
        assert_eq!(DriverErrors::from_byte(4).map(DriverErrors::code), Some(4));
    }

    #[test]
    fn driver_errors_list_every_set_bit() {
        let errors = DriverErrors::from_byte(1 | 32).unwrap();
        assert_eq!(errors.to_string(), "Input voltage error. Overload error.");
    }

    #[test]
    fn unknown_driver_error_shows_raw_code() {
        let errors = DriverErrors::from_byte(0x10).unwrap();
        assert_eq!(errors.to_string(), "Unknown device error (0x10).");
    }

    #[test]
    fn read_instruction_carries_region() {
        let read = Instruction::read(address::ReadRegion::model());
        assert_eq!(read.response_len(), 2);
        assert_eq!(read.data(), vec![0x02, 0x03, 0x02]);
    }
}
