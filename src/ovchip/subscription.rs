use chrono::NaiveDateTime;

use super::convert_date;
use crate::errors::ensure_len;
use crate::util::{get_bits, get_bits_from_int, BitCursor};
use crate::{Error, Result};

/// Product names for the subscription types we know about.
const SUBSCRIPTION_NAMES: &[(u16, &str)] = &[
    // NS
    (0x0005, "OV-jaarkaart"),
    (0x0007, "OV-Bijkaart 1e klas"),
    (0x0011, "NS Businesscard"),
    (0x0019, "Voordeelurenabonnement (twee jaar)"),
    (0x00AF, "Studenten OV-chipkaart week (2009)"),
    (0x00B0, "Studenten OV-chipkaart weekend (2009)"),
    (0x00B1, "Studentenkaart korting week (2009)"),
    (0x00B2, "Studentenkaart korting weekend (2009)"),
    (0x00C9, "Reizen op saldo bij NS, 1e klasse"),
    (0x00CA, "Reizen op saldo bij NS, 2de klasse"),
    (0x00CE, "Voordeelurenabonnement reizen op saldo"),
    (0x00E5, "Reizen op saldo (tijdelijk eerste klas)"),
    (0x00E6, "Reizen op saldo (tijdelijk tweede klas)"),
    (0x00E7, "Reizen op saldo (tijdelijk eerste klas korting)"),
    // Arriva
    (0x059A, "Dalkorting"),
    // Veolia
    (0x0626, "DALU Dalkorting"),
    // Connexxion
    (0x0692, "Daluren Oost-Nederland"),
    (0x069C, "Daluren Oost-Nederland"),
    // DUO
    (0x09C6, "Student weekend-vrij"),
    (0x09C7, "Student week-korting"),
    (0x09C9, "Student week-vrij"),
    (0x09CA, "Student weekend-korting"),
    // GVB
    (0x0BBD, "Fietssupplement"),
];

/// An entry in a subscription index slot: how a subscription is being used, and which
/// subscription index pointer leads to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionEntry {
    pub type1: u8,
    pub type2: u8,
    pub used: bool,
    pub rest: u8,
    /// 1-based index into `OvcIndex::subscription_index`.
    pub index_id: u8,
}

impl SubscriptionEntry {
    const BITS: usize = 21;

    /// Parses a subscription index slot (2 blocks): a 4-bit count, then packed entries.
    ///
    /// The count comes straight off the card; entries that wouldn't fit are dropped.
    pub fn parse_slot(data: &[u8]) -> Result<Vec<Self>> {
        ensure_len("OV-chip subscription index", data, 1)?;
        let count = get_bits(data, 0, 4) as usize;
        let room = (data.len() * 8 - 4) / Self::BITS;
        Ok((0..count.min(room))
            .map(|i| Self::from_bits(get_bits(data, 4 + i * Self::BITS, Self::BITS)))
            .collect())
    }

    fn from_bits(bits: u64) -> Self {
        Self {
            type1: get_bits_from_int(bits, 13, 8) as u8,
            type2: get_bits_from_int(bits, 7, 6) as u8,
            used: get_bits_from_int(bits, 6, 1) == 1,
            rest: get_bits_from_int(bits, 4, 2) as u8,
            index_id: get_bits_from_int(bits, 0, 4) as u8,
        }
    }
}

/// A subscription (season ticket, discount product, etc).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvcSubscription {
    /// Byte pointer the record was read from.
    pub address: u32,
    pub entry: SubscriptionEntry,
    pub id: u32,
    pub company: u8,
    pub subscription: u16,
    pub unknown1: u32,
    pub valid_from_date: u32,
    pub valid_from_time: u32,
    pub valid_to_date: u32,
    pub valid_to_time: u32,
    pub unknown2: u64,
    pub machine_id: u32,
}

impl OvcSubscription {
    pub const LEN: usize = 48;

    pub fn parse(address: u32, entry: SubscriptionEntry, data: &[u8]) -> Result<Self> {
        ensure_len("OV-chip subscription", data, Self::LEN)?;
        let mut cur = BitCursor::new(data, 0);
        let fieldbits = cur.read(28);
        if fieldbits == 0 {
            return Err(Error::Invalid("Not valid".into()));
        }

        let mut sub = Self {
            address,
            entry,
            id: 0,
            company: 0,
            subscription: 0,
            unknown1: 0,
            valid_from_date: 0,
            valid_from_time: 0,
            valid_to_date: 0,
            valid_to_time: 0,
            unknown2: 0,
            machine_id: 0,
        };
        if let Some(v) = cur.read_if(fieldbits & 0x200 != 0, 8) {
            sub.company = v as u8;
        }
        if let Some(v) = cur.read_if(fieldbits & 0x400 != 0, 16) {
            sub.subscription = v as u16;
            // Followed by a byte that doesn't seem to belong to anything.
            cur.skip(8);
        }
        if let Some(v) = cur.read_if(fieldbits & 0x800 != 0, 24) {
            sub.id = v as u32;
        }
        if let Some(v) = cur.read_if(fieldbits & 0x2000 != 0, 10) {
            sub.unknown1 = v as u32;
        }
        let subfieldbits = cur.read_if(fieldbits & 0x200000 != 0, 9).unwrap_or(0);
        if let Some(v) = cur.read_if(subfieldbits & 0x01 != 0, 14) {
            sub.valid_from_date = v as u32;
        }
        if let Some(v) = cur.read_if(subfieldbits & 0x02 != 0, 11) {
            sub.valid_from_time = v as u32;
        }
        if let Some(v) = cur.read_if(subfieldbits & 0x04 != 0, 14) {
            sub.valid_to_date = v as u32;
        }
        if let Some(v) = cur.read_if(subfieldbits & 0x08 != 0, 11) {
            sub.valid_to_time = v as u32;
        }
        if let Some(v) = cur.read_if(subfieldbits & 0x10 != 0, 53) {
            sub.unknown2 = v;
        }
        if let Some(v) = cur.read_if(fieldbits & 0x800000 != 0, 24) {
            sub.machine_id = v as u32;
        }
        Ok(sub)
    }

    pub fn name(&self) -> String {
        SUBSCRIPTION_NAMES
            .iter()
            .find(|(code, _)| *code == self.subscription)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| format!("Unknown Subscription ({:#x})", self.subscription))
    }

    pub fn activation(&self) -> &'static str {
        match (self.entry.type1, self.entry.used) {
            (0, _) => "Deactivated",
            (_, true) => "Activated and used",
            (_, false) => "Activated but not used",
        }
    }

    pub fn valid_from(&self) -> Option<NaiveDateTime> {
        convert_date(self.valid_from_date, self.valid_from_time)
    }

    pub fn valid_to(&self) -> Option<NaiveDateTime> {
        convert_date(self.valid_to_date, self.valid_to_time)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::util::set_bits;

    /// A record with company, type, id and a validity window.
    pub(crate) fn encode(id: u32, company: u8, subscription: u16) -> [u8; 48] {
        let mut data = [0u8; 48];
        set_bits(&mut data, 0, 28, 0x200 | 0x400 | 0x800 | 0x200000 | 0x800000);
        let mut pos = 28;
        for (value, len) in [
            (u64::from(company), 8),
            (u64::from(subscription), 16),
            (0xFF, 8), // Spacer
            (u64::from(id), 24),
            (0x05, 9), // Valid from and valid to dates
            (5000, 14),
            (5365, 14),
            (0xABCDEF, 24),
        ] {
            set_bits(&mut data, pos, len, value);
            pos += len;
        }
        data
    }

    pub(crate) fn entry(index_id: u8) -> SubscriptionEntry {
        SubscriptionEntry {
            type1: 0x11,
            type2: 0x02,
            used: true,
            rest: 0,
            index_id,
        }
    }

    #[test]
    fn test_parse() -> Result<()> {
        let sub = OvcSubscription::parse(0x830, entry(2), &encode(77, 4, 0x00CA))?;
        assert_eq!(sub.address, 0x830);
        assert_eq!(sub.id, 77);
        assert_eq!(sub.company, 4);
        assert_eq!(sub.subscription, 0x00CA);
        assert_eq!(sub.name(), "Reizen op saldo bij NS, 2de klasse");
        assert_eq!(sub.valid_from_date, 5000);
        assert_eq!(sub.valid_from_time, 0);
        assert_eq!(sub.valid_to_date, 5365);
        assert_eq!(sub.unknown2, 0);
        assert_eq!(sub.machine_id, 0xABCDEF);
        assert_eq!(
            sub.valid_from().map(|t| t.to_string()),
            Some("2010-09-10 00:00:00".to_string())
        );
        assert_eq!(sub.activation(), "Activated and used");
        Ok(())
    }

    #[test]
    fn test_not_valid() {
        match OvcSubscription::parse(0x800, entry(1), &[0; 48]) {
            Err(Error::Invalid(msg)) => assert_eq!(msg, "Not valid"),
            v => panic!("wrong result: {:?}", v),
        }
    }

    #[test]
    fn test_name_fallback() -> Result<()> {
        let sub = OvcSubscription::parse(0x800, entry(1), &encode(1, 2, 0x1234))?;
        assert_eq!(sub.name(), "Unknown Subscription (0x1234)");
        Ok(())
    }

    #[test]
    fn test_activation() -> Result<()> {
        let mut sub = OvcSubscription::parse(0x800, entry(1), &encode(1, 2, 0x0005))?;
        sub.entry.used = false;
        assert_eq!(sub.activation(), "Activated but not used");
        sub.entry.type1 = 0;
        assert_eq!(sub.activation(), "Deactivated");
        Ok(())
    }

    #[test]
    fn test_parse_slot() -> Result<()> {
        let mut data = [0u8; 32];
        set_bits(&mut data, 0, 4, 2);
        // type1 0x11, type2 0x02, used, rest 1, index 3
        set_bits(&mut data, 4, 21, (0x11 << 13) | (0x02 << 7) | (1 << 6) | (1 << 4) | 3);
        set_bits(&mut data, 25, 21, 12);

        let entries = SubscriptionEntry::parse_slot(&data)?;
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            SubscriptionEntry {
                type1: 0x11,
                type2: 0x02,
                used: true,
                rest: 1,
                index_id: 3,
            }
        );
        assert_eq!(entries[1].index_id, 12);
        assert_eq!(entries[1].type1, 0);
        Ok(())
    }

    #[test]
    fn test_parse_slot_clamps_count() -> Result<()> {
        // 15 claimed, but a 2-block slot only has room for 12.
        let mut data = [0u8; 32];
        set_bits(&mut data, 0, 4, 15);
        assert_eq!(SubscriptionEntry::parse_slot(&data)?.len(), 12);
        // And a single block for 5.
        assert_eq!(SubscriptionEntry::parse_slot(&data[..16])?.len(), 5);
        Ok(())
    }
}
