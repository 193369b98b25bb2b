use chrono::NaiveDate;
use tracing::warn;

use crate::errors::ensure_len;
use crate::util::{bcd_to_int, get_bits};
use crate::Result;

/// Card holder information.
///
/// Anonymous cards have no birthdate, and no autocharge either; those fields are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvcInfo {
    pub company: u8,
    pub expdate: u32,
    pub birthdate: Option<NaiveDate>,
    /// 5 if autocharge is on.
    pub active: u8,
    /// Autocharge kicks in below this, in cents.
    pub limit: u32,
    /// Autocharge amount, in cents.
    pub charge: u32,
    pub unknown: u32,
}

impl OvcInfo {
    pub const LEN: usize = 48;

    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("OV-chip info", data, Self::LEN)?;
        let mut info = Self {
            company: get_bits(data, 48, 5) as u8,
            expdate: get_bits(data, 53, 14) as u32,
            birthdate: None,
            active: 0,
            limit: 0,
            charge: 0,
            unknown: 0,
        };
        if data[13] & 0x02 == 0x02 {
            let year = bcd_to_int(data[14]) * 100 + bcd_to_int(data[15]);
            let (month, day) = (bcd_to_int(data[16]), bcd_to_int(data[17]));
            info.birthdate = NaiveDate::from_ymd_opt(year as i32, month, day);
            if info.birthdate.is_none() {
                warn!(year, month, day, "Nonsensical birthdate");
            }
            info.active = get_bits(data, 176, 3) as u8;
            info.limit = get_bits(data, 179, 16) as u32;
            info.charge = get_bits(data, 195, 16) as u32;
            info.unknown = get_bits(data, 211, 16) as u32;
        }
        Ok(info)
    }

    pub fn is_autocharge(&self) -> bool {
        self.active == 0x05
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::set_bits;

    #[test]
    fn test_parse_anonymous() -> Result<()> {
        let mut data = [0u8; 48];
        set_bits(&mut data, 48, 5, 0x04);
        set_bits(&mut data, 53, 14, 6000);
        // Autocharge fields are ignored without a birthdate.
        set_bits(&mut data, 176, 3, 5);

        let info = OvcInfo::parse(&data)?;
        assert_eq!(info.company, 4);
        assert_eq!(info.expdate, 6000);
        assert_eq!(info.birthdate, None);
        assert_eq!(info.active, 0);
        assert!(!info.is_autocharge());
        Ok(())
    }

    #[test]
    fn test_parse_personal() -> Result<()> {
        let mut data = [0u8; 48];
        data[13] = 0x02;
        data[14..18].copy_from_slice(&[0x19, 0x85, 0x07, 0x21]);
        set_bits(&mut data, 176, 3, 5);
        set_bits(&mut data, 179, 16, 1000);
        set_bits(&mut data, 195, 16, 2000);
        set_bits(&mut data, 211, 16, 0xBEEF);

        let info = OvcInfo::parse(&data)?;
        assert_eq!(info.birthdate, NaiveDate::from_ymd_opt(1985, 7, 21));
        assert!(info.is_autocharge());
        assert_eq!(info.limit, 1000);
        assert_eq!(info.charge, 2000);
        assert_eq!(info.unknown, 0xBEEF);
        Ok(())
    }
}
