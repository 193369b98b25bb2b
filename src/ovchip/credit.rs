use crate::errors::ensure_len;
use crate::util::get_bits;
use crate::Result;

/// The current balance, and whether the card has been blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvcCredit {
    pub banbits: u16,
    pub id: u16,
    pub credit_id: u16,
    /// Cents.
    pub credit: i32,
}

impl OvcCredit {
    pub const LEN: usize = 16;

    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("OV-chip credit", data, Self::LEN)?;
        let mut credit = get_bits(data, 78, 15) as i32;
        // The sign lives outside the field, in the bit just before it.
        if data[9] & 0x04 != 0x04 {
            credit = -(credit ^ 0x7FFF);
        }
        Ok(Self {
            banbits: get_bits(data, 0, 9) as u16,
            id: get_bits(data, 9, 12) as u16,
            credit_id: get_bits(data, 56, 12) as u16,
            credit,
        })
    }

    pub fn is_banned(&self) -> bool {
        self.banbits & 0xC0 == 0xC0
    }
}
