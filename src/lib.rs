pub mod command;
pub mod hardware;
pub mod protocol;
pub mod response;
pub mod scan;
pub mod serial;

fn crc(packet: &[u8]) -> u8 {
    !packet.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_is_inverted_byte_sum() {
        // ID 1, LEN 2, PING
        assert_eq!(crc(&[0x01, 0x02, 0x01]), 0xfb);
        assert_eq!(crc(&[]), 0xff);
    }
}
