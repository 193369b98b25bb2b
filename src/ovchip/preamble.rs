use crate::errors::ensure_len;
use crate::util::get_bits;
use crate::Result;

/// The first three blocks of sector 0. Mostly manufacturer constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvcPreamble {
    pub id: String,
    pub checkbit: u8,
    pub manufacturer: String,
    pub publisher: String,
    pub unknown_constant1: String,
    pub expdate: u32,
    pub unknown_constant2: String,
    /// 2 for personal cards.
    pub card_type: u8,
}

impl OvcPreamble {
    pub const LEN: usize = 48;

    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("OV-chip preamble", data, Self::LEN)?;
        let hex = hex::encode_upper(&data[..Self::LEN]);
        Ok(Self {
            id: hex[0..8].to_owned(),
            checkbit: get_bits(data, 32, 8) as u8,
            manufacturer: hex[10..20].to_owned(),
            publisher: hex[20..32].to_owned(),
            unknown_constant1: hex[32..54].to_owned(),
            expdate: get_bits(data, 216, 20) as u32,
            unknown_constant2: hex[59..68].to_owned(),
            card_type: get_bits(data, 276, 4) as u8,
        })
    }

    pub fn is_personal(&self) -> bool {
        self.card_type == 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() -> Result<()> {
        let mut data = [0u8; 48];
        data[..16].copy_from_slice(&[
            0x12, 0x34, 0x56, 0x78, // ID
            0x9A, // Checkbit
            0x88, 0x04, 0x00, 0x00, 0x00, // Manufacturer
            0x84, 0x00, 0x00, 0x00, 0x06, 0x03, // Publisher
        ]);
        data[27] = 0x12; // Expdate: bits 216..236
        data[28] = 0x34;
        data[29] = 0x50;
        data[34] = 0x02; // Personal card: bits 276..280

        let p = OvcPreamble::parse(&data)?;
        assert_eq!(p.id, "12345678");
        assert_eq!(p.checkbit, 0x9A);
        assert_eq!(p.manufacturer, "8804000000");
        assert_eq!(p.publisher, "840000000603");
        assert_eq!(p.unknown_constant1.len(), 22);
        assert_eq!(p.expdate, 0x12345);
        assert_eq!(p.unknown_constant2.len(), 9);
        assert_eq!(p.card_type, 2);
        assert!(p.is_personal());
        Ok(())
    }
}
