use crate::error::Result;
use crate::varint::{Reader, Writer};
use std::io::{Read, Write};

/// Bit 0 of [`VideoPacketHeader::flags`]: the display is round.
pub const FLAG_DISPLAY_ROUND: i32 = 1 << 0;
/// Bit 1 of [`VideoPacketHeader::flags`]: bit rate was reduced for this packet.
pub const FLAG_BIT_RATE_REDUCED: i32 = 1 << 1;

/// Fixed-layout header prefixed to every payload on the video socket.
///
/// Wire layout (little-endian, raw fixed-width fields, not varints): four
/// `i32`s, two `i16`s, `i32`, `i64`, `i64`, `i64`, `i32`, `i32` in the order
/// the fields are declared here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoPacketHeader {
    pub display_id: i32,
    pub display_width: i32,
    pub display_height: i32,
    pub display_orientation: i16,
    pub orientation_correction: i16,
    pub packet_size: i32,
    pub frame_number: i64,
    pub origination_ts_us: i64,
    pub presentation_ts_us: i64,
    pub flags: i32,
    pub bit_rate: i32,
}

impl VideoPacketHeader {
    /// `presentation_ts_us == 0` marks a codec-config blob (SPS/PPS,
    /// codec-private data, sequence header) rather than a coded frame.
    #[must_use]
    pub fn is_config_packet(&self) -> bool {
        self.presentation_ts_us == 0
    }

    pub fn write<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_fixed32(self.display_id as u32);
        w.write_fixed32(self.display_width as u32);
        w.write_fixed32(self.display_height as u32);
        w.write_raw(&self.display_orientation.to_le_bytes());
        w.write_raw(&self.orientation_correction.to_le_bytes());
        w.write_fixed32(self.packet_size as u32);
        w.write_raw(&self.frame_number.to_le_bytes());
        w.write_raw(&self.origination_ts_us.to_le_bytes());
        w.write_raw(&self.presentation_ts_us.to_le_bytes());
        w.write_fixed32(self.flags as u32);
        w.write_fixed32(self.bit_rate as u32);
        Ok(())
    }

    pub fn read<R: Read>(r: &mut Reader<R>) -> Result<Self> {
        let display_id = r.read_fixed32()? as i32;
        let display_width = r.read_fixed32()? as i32;
        let display_height = r.read_fixed32()? as i32;
        let display_orientation = i16::from_le_bytes(r.read_bytes_raw(2)?.try_into().unwrap());
        let orientation_correction = i16::from_le_bytes(r.read_bytes_raw(2)?.try_into().unwrap());
        let packet_size = r.read_fixed32()? as i32;
        let frame_number = i64::from_le_bytes(r.read_bytes_raw(8)?.try_into().unwrap());
        let origination_ts_us = i64::from_le_bytes(r.read_bytes_raw(8)?.try_into().unwrap());
        let presentation_ts_us = i64::from_le_bytes(r.read_bytes_raw(8)?.try_into().unwrap());
        let flags = r.read_fixed32()? as i32;
        let bit_rate = r.read_fixed32()? as i32;
        Ok(Self {
            display_id,
            display_width,
            display_height,
            display_orientation,
            orientation_correction,
            packet_size,
            frame_number,
            origination_ts_us,
            presentation_ts_us,
            flags,
            bit_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrips_through_the_wire() {
        let header = VideoPacketHeader {
            display_id: 0,
            display_width: 1080,
            display_height: 2400,
            display_orientation: 1,
            orientation_correction: 3,
            packet_size: 4096,
            frame_number: 42,
            origination_ts_us: 123_456_789,
            presentation_ts_us: 987_654_321,
            flags: FLAG_BIT_RATE_REDUCED,
            bit_rate: 8_000_000,
        };

        let mut w = Writer::new(Vec::new());
        header.write(&mut w).unwrap();
        w.flush().unwrap();

        let mut r = Reader::new(Cursor::new(w.get_mut().clone()));
        let decoded = VideoPacketHeader::read(&mut r).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn config_packet_has_zero_presentation_ts() {
        let header = VideoPacketHeader {
            presentation_ts_us: 0,
            ..Default::default()
        };
        assert!(header.is_config_packet());
    }
}
