use crate::{
    crc,
    hardware::{Instruction, ID},
};

/// Longest instruction packet the servos accept.
pub const TX_PACKET_MAX_LEN: usize = 250;

#[derive(Debug, Clone, Copy)]
pub struct Command {
    pub id: ID,
    pub instruction: Instruction,
}

impl Command {
    pub fn new(id: ID, instruction: Instruction) -> Self {
        Self { id, instruction }
    }

    /// Frames the command, or `None` when it does not fit in one packet.
    pub(crate) fn build(self) -> Option<Vec<u8>> {
        let data = self.instruction.data();
        let length = u8::try_from(data.len() + 1).ok()?;

        let mut packet = Vec::from([0xff, 0xff, self.id.into(), length]);
        packet.extend(data);

        packet.push(crc(&packet[2..]));

        (packet.len() <= TX_PACKET_MAX_LEN).then_some(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::address::ReadRegion;

    #[test]
    fn builds_ping_packet() {
        let ping = Command::new(ID::Single(1), Instruction::ping());
        assert_eq!(ping.build().unwrap(), vec![0xff, 0xff, 0x01, 0x02, 0x01, 0xfb]);
    }

    #[test]
    fn builds_model_read_packet() {
        let read = Command::new(ID::Single(1), Instruction::read(ReadRegion::model()));
        // 1 + 4 + 2 + 3 + 2 = 12 -> !12
        assert_eq!(
            read.build().unwrap(),
            vec![0xff, 0xff, 0x01, 0x04, 0x02, 0x03, 0x02, 0xf3]
        );
    }

    #[test]
    fn broadcast_uses_reserved_id() {
        let ping = Command::new(ID::broadcast(), Instruction::ping());
        assert_eq!(ping.build().unwrap()[2], 0xfe);
    }
}
