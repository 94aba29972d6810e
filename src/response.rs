use thiserror::Error;

use crate::{
    crc,
    hardware::{DriverErrors, ID},
};

/// Longest status packet the reader will buffer.
pub const RX_PACKET_MAX_LEN: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: ID,
    pub error: u8,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn errors(&self) -> Option<DriverErrors> {
        DriverErrors::from_byte(self.error)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("Response format is invalid.")]
    Malformed,
    #[error("CRC does not match.")]
    CrcInvalid,
    #[error("The id is not valid.")]
    IdInvalid,
}

impl TryFrom<&[u8]> for Response {
    type Error = ResponseError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let header = value.get(..2);
        let id = value.get(2);
        let length = value.get(3);
        let error = value.get(4);

        // Make sure the packet has the required fields.
        let (Some([0xff, 0xff]), Some(&id), Some(&length), Some(&error)) = (header, id, length, error)
        else {
            return Err(ResponseError::Malformed);
        };

        // The length counts the error byte and the crc.
        if length < 2 || value.len() != 4 + length as usize {
            return Err(ResponseError::Malformed);
        }

        let Ok(id) = ID::try_from(id) else {
            return Err(ResponseError::IdInvalid);
        };

        let rx_crc = value[value.len() - 1];
        if rx_crc != crc(&value[2..value.len() - 1]) {
            return Err(ResponseError::CrcInvalid);
        }

        let payload = Vec::from(&value[5..value.len() - 1]);

        Ok(Self { id, error, payload })
    }
}
