use crate::errors::ensure_len;
use crate::util::get_bits;
use crate::Result;

/// Where the most recent copies of everything live.
///
/// The card double-buffers most of its structures, and flips a bit in here to say which
/// copy is current. The index itself is double-buffered too, with a counter deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvcIndex {
    /// 0xFB0 or 0xFD0.
    pub recent_transaction_slot: u32,
    /// 0x580 or 0x5C0.
    pub recent_info_slot: u32,
    /// 0xF10 or 0xF30.
    pub recent_subscription_slot: u32,
    /// 0xF50 or 0xF70.
    pub recent_travelhistory_slot: u32,
    /// 0xF90 or 0xFA0.
    pub recent_credit_slot: u32,
    /// Byte pointers to subscription records. The card can hold 15, but only has room
    /// for 12 pointers; the rest are unreachable from here.
    pub subscription_index: [u32; OvcIndex::SUBSCRIPTION_SLOTS],
}

impl OvcIndex {
    pub const SLOT_LEN: usize = 32;
    pub const LEN: usize = Self::SLOT_LEN * 2;
    pub const SUBSCRIPTION_SLOTS: usize = 12;

    /// Parses blocks 11..15 of sector 39.
    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("OV-chip index", data, Self::LEN)?;
        let (first, second) = data[..Self::LEN].split_at(Self::SLOT_LEN);

        let (buf, recent_transaction_slot) = if get_bits(second, 10, 16) > get_bits(first, 10, 16)
        {
            (second, 0xFB0)
        } else {
            (first, 0xFD0)
        };

        let recent_info_slot = if (buf[3] >> 5) & 0x01 == 1 { 0x5C0 } else { 0x580 };

        let indexes = (buf[31] >> 5) & 0x07;
        let recent_subscription_slot = if indexes & 0x04 == 0 { 0xF10 } else { 0xF30 };
        let recent_travelhistory_slot = if indexes & 0x02 == 0 { 0xF50 } else { 0xF70 };
        let recent_credit_slot = if indexes & 0x01 == 0 { 0xF90 } else { 0xFA0 };

        let mut subscription_index = [0; Self::SUBSCRIPTION_SLOTS];
        for (i, addr) in subscription_index.iter_mut().enumerate() {
            *addr = subscription_address(get_bits(buf, 108 + i * 4, 4) as u32);
        }

        Ok(Self {
            recent_transaction_slot,
            recent_info_slot,
            recent_subscription_slot,
            recent_travelhistory_slot,
            recent_credit_slot,
            subscription_index,
        })
    }

    /// Looks up a 1-based entry in the subscription index.
    pub fn subscription(&self, index_id: u8) -> Option<u32> {
        match index_id {
            0 => None,
            n => self.subscription_index.get(usize::from(n) - 1).copied(),
        }
    }
}

/// Subscription records are spread over three sectors, five to a sector.
fn subscription_address(bits: u32) -> u32 {
    match bits {
        0..=4 => 0x800 + bits * 0x30,
        5..=9 => 0x900 + (bits - 5) * 0x30,
        _ => 0xA00 + (bits - 10) * 0x30,
    }
}
