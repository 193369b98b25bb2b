//! OV-chipkaart: the Dutch national transit card, a MIFARE Classic 4K.
//!
//! Everything on it is bit-packed, and most structures are double-buffered, with an
//! index in sector 39 pointing at whichever copy is current. See:
//! http://ov-chipkaart.pc-active.nl/Indexes
pub mod credit;
pub mod index;
pub mod info;
pub mod preamble;
pub mod subscription;
pub mod transaction;
pub mod trip;

pub use credit::OvcCredit;
pub use index::OvcIndex;
pub use info::OvcInfo;
pub use preamble::OvcPreamble;
pub use subscription::{OvcSubscription, SubscriptionEntry};
pub use transaction::OvcTransaction;
pub use trip::{reconstruct, OvcTrip};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use num_enum::FromPrimitive;
use tracing::{debug, trace_span, warn};

use crate::classic::ClassicCard;
use crate::transit::format_amount;
use crate::Result;

/// Starts at 0x010; the same on every card we've seen.
pub const OVC_HEADER: [u8; 11] = [
    0x84, 0x00, 0x00, 0x00, 0x06, 0x03, 0xA0, 0x00, 0x13, 0xAE, 0xE4,
];

/// Transport companies, as they appear in the company fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u16)]
pub enum Agency {
    /// Trans Link Systems, who run the whole thing.
    Tls = 0x00,
    Connexxion = 0x01,
    Gvb = 0x02,
    Htm = 0x03,
    Ns = 0x04,
    Ret = 0x05,
    Veolia = 0x07,
    Arriva = 0x08,
    Syntus = 0x09,
    Qbuzz = 0x0A,
    Duo = 0x0C,
    /// DUO as well, but not counted as "other" when classifying trips.
    DuoAlt = 0x2C,
    /// Top-up machines in shops.
    Reseller = 0x19,
    #[num_enum(catch_all)]
    Unknown(u16),
}

impl Agency {
    pub fn short_name(&self) -> String {
        match self {
            Self::Tls => "TLS".into(),
            Self::Connexxion => "Connexxion".into(),
            Self::Gvb => "GVB".into(),
            Self::Htm => "HTM".into(),
            Self::Ns => "NS".into(),
            Self::Ret => "RET".into(),
            Self::Veolia => "Veolia".into(),
            Self::Arriva => "Arriva".into(),
            Self::Syntus => "Syntus".into(),
            Self::Qbuzz => "Qbuzz".into(),
            Self::Duo | Self::DuoAlt => "DUO".into(),
            Self::Reseller => "Reseller".into(),
            Self::Unknown(v) => format!("Unknown ({:#x})", v),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Tls => "Trans Link Systems".into(),
            Self::Gvb => "Gemeentelijk Vervoersbedrijf".into(),
            Self::Htm => "Haagsche Tramweg-Maatschappij".into(),
            Self::Ns => "Nederlandse Spoorwegen".into(),
            Self::Ret => "Rotterdamse Elektrische Tram".into(),
            Self::Duo | Self::DuoAlt => "Dienst Uitvoering Onderwijs".into(),
            _ => self.short_name(),
        }
    }
}

/// Dates count days from 1997-01-01, times minutes from midnight.
pub fn convert_date(days: u32, minutes: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1997, 1, 1)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::days(days.into()))?
        .checked_add_signed(Duration::minutes(minutes.into()))
}

pub fn format_euro(cents: i64) -> String {
    format_amount(cents, "€")
}

/// A fully decoded card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvcCard {
    pub index: OvcIndex,
    pub preamble: OvcPreamble,
    pub info: OvcInfo,
    pub credit: OvcCredit,
    /// All 28 slots, in slot order, empty ones included.
    pub transactions: Vec<OvcTransaction>,
    pub subscriptions: Vec<OvcSubscription>,
    pub trips: Vec<OvcTrip>,
}

impl OvcCard {
    pub fn balance(&self) -> String {
        format_euro(self.credit.credit.into())
    }
}

/// Is this a 4K card with the OV-chip header?
pub fn check(card: &ClassicCard) -> bool {
    if card.sectors.len() != 40 {
        return false;
    }
    match card.sectors[0].read_blocks(1, 1) {
        Ok(block) => block[..OVC_HEADER.len()] == OVC_HEADER,
        Err(_) => false,
    }
}

pub fn parse(card: &ClassicCard) -> Result<OvcCard> {
    let span = trace_span!("ovchip", tag_id = %card.tag_id);
    let _enter = span.enter();

    let index = OvcIndex::parse(&card.sector(39)?.read_blocks(11, 4)?)?;
    debug!(?index, "Read index");

    let preamble = OvcPreamble::parse(&card.sector(0)?.read_blocks(0, 3)?)?;
    let info = OvcInfo::parse(&card.read_at_pointer(index.recent_info_slot, 3)?)?;
    let credit = OvcCredit::parse(&card.read_at_pointer(index.recent_credit_slot, 1)?)?;

    let transactions = (0..OvcTransaction::SLOTS)
        .map(|slot| read_transaction(card, slot))
        .collect::<Result<Vec<_>>>()?;
    let trips = reconstruct(&transactions);

    let subscriptions = read_subscriptions(card, &index)?;

    Ok(OvcCard {
        index,
        preamble,
        info,
        credit,
        transactions,
        subscriptions,
        trips,
    })
}

/// Slots are spread over sectors 35-38, seven to a sector, two blocks each.
fn read_transaction(card: &ClassicCard, slot: u8) -> Result<OvcTransaction> {
    let sector = 35 + usize::from(slot / 7);
    let block = usize::from(slot % 7) * 2;
    OvcTransaction::parse(slot, &card.sector(sector)?.read_blocks(block, 2)?)
}

fn read_subscriptions(card: &ClassicCard, index: &OvcIndex) -> Result<Vec<OvcSubscription>> {
    let slot = card.read_at_pointer(index.recent_subscription_slot, 2)?;
    let mut subscriptions = Vec::new();
    for entry in SubscriptionEntry::parse_slot(&slot)? {
        let address = match index.subscription(entry.index_id) {
            Some(address) => address,
            None => {
                warn!(index_id = entry.index_id, "Subscription index out of range");
                continue;
            }
        };
        let parsed = card
            .read_at_pointer(address, 3)
            .and_then(|data| OvcSubscription::parse(address, entry, &data));
        match parsed {
            Ok(sub) => subscriptions.push(sub),
            Err(err) => warn!(address, %err, "Skipping subscription"),
        }
    }
    subscriptions.sort_by_key(|sub| sub.id);
    Ok(subscriptions)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classic::{sector_to_block, ClassicSector, BLOCK_SIZE};
    use crate::Error;
    use crate::ovchip::transaction::{PROCESS_CHECKIN, PROCESS_CHECKOUT, PROCESS_TRANSFER};
    use crate::util::set_bits;

    fn write_at(dump: &mut [u8], sector: u32, block: u32, data: &[u8]) {
        let offset = (sector_to_block(sector) + block) as usize * BLOCK_SIZE;
        dump[offset..offset + data.len()].copy_from_slice(data);
    }

    /// A 4K image of an anonymous card with €12.50 on it, two transactions that make
    /// up a train trip, a top-up, and one subscription.
    pub(crate) fn ovc_dump() -> Vec<u8> {
        let mut dump = vec![0u8; 4096];
        write_at(&mut dump, 0, 0, &[0xDE, 0xAD, 0xBE, 0xEF, 0x42]);
        write_at(&mut dump, 0, 1, &OVC_HEADER);

        // Index: first slot, current info at 0x580, credit at 0xF90, subscriptions at
        // 0xF10; subscription pointer #1 leads to 0x800, #2 to 0x830.
        let mut index = [0u8; 64];
        set_bits(&mut index[..32], 10, 16, 1);
        set_bits(&mut index[..32], 112, 4, 1);
        write_at(&mut dump, 39, 11, &index);

        let mut info = [0u8; 48];
        set_bits(&mut info, 48, 5, 4);
        write_at(&mut dump, 22, 0, &info);

        let mut credit = [0u8; 16];
        credit[9] |= 0x04;
        set_bits(&mut credit, 78, 15, 1250);
        write_at(&mut dump, 39, 9, &credit);

        let txs = [
            transaction::tests::encode(10, PROCESS_CHECKIN, 4, 5000, 480, 8001, 0),
            transaction::tests::encode(11, PROCESS_CHECKOUT, 4, 5000, 530, 8002, 350),
            transaction::tests::encode(9, PROCESS_TRANSFER, 0x19, 4999, 600, 0, 2000),
        ];
        for (slot, data) in txs.iter().enumerate() {
            let slot = slot as u32 + 5;
            write_at(&mut dump, 35 + slot / 7, (slot % 7) * 2, data);
        }

        // Subscription index slot, 0xF10 = sector 39 block 1. The second entry points
        // past the 12 pointers the card has, the third at an empty record.
        let mut subs = [0u8; 32];
        set_bits(&mut subs, 0, 4, 3);
        set_bits(&mut subs, 4, 21, (0x01 << 13) | 1);
        set_bits(&mut subs, 25, 21, 13);
        set_bits(&mut subs, 46, 21, 2);
        write_at(&mut dump, 39, 1, &subs);
        write_at(&mut dump, 32, 0, &subscription::tests::encode(5, 4, 0x0005));

        dump
    }

    #[test]
    fn test_check() -> Result<()> {
        let dump = ovc_dump();
        assert!(check(&ClassicCard::from_dump(&[1], &dump)?));
        assert!(!check(&ClassicCard::from_dump(&[1], &dump[..1024])?));

        let mut other = dump.clone();
        other[16] = 0x85;
        assert!(!check(&ClassicCard::from_dump(&[1], &other)?));
        Ok(())
    }

    #[test]
    fn test_parse() -> Result<()> {
        let card = parse(&ClassicCard::from_dump(&[1], &ovc_dump())?)?;
        assert_eq!(card.preamble.id, "DEADBEEF");
        assert_eq!(card.index.recent_info_slot, 0x580);
        assert_eq!(card.info.company, 4);
        assert_eq!(card.credit.credit, 1250);
        assert_eq!(card.balance(), "€12.50");

        assert_eq!(card.transactions.len(), 28);
        assert_eq!(card.transactions.iter().filter(|tx| tx.valid).count(), 3);

        assert_eq!(card.trips.len(), 2);
        assert_eq!(card.trips[0].id, 9);
        assert_eq!(card.trips[0].agency, Agency::Reseller);
        assert_eq!(card.trips[1].id, 10);
        assert_eq!(card.trips[1].agency, Agency::Ns);
        assert_eq!(card.trips[1].end_station, Some(8002));
        assert_eq!(card.trips[1].fare_string(), "€3.50");

        assert_eq!(card.subscriptions.len(), 1);
        let sub = &card.subscriptions[0];
        assert_eq!(sub.address, 0x800);
        assert_eq!(sub.name(), "OV-jaarkaart");
        assert_eq!(sub.activation(), "Activated but not used");
        Ok(())
    }

    #[test]
    fn test_parse_skips_unreadable_subscriptions() -> Result<()> {
        // Pointer #1 = 15 lands on the last block of sector 34, too late for a record.
        let mut dump = ovc_dump();
        let mut index = [0u8; 32];
        set_bits(&mut index, 10, 16, 1);
        set_bits(&mut index, 108, 4, 15);
        set_bits(&mut index, 112, 4, 1);
        write_at(&mut dump, 39, 11, &index);
        let card = parse(&ClassicCard::from_dump(&[1], &dump)?)?;
        assert_eq!(card.index.subscription(1), Some(0xAF0));
        assert!(card.subscriptions.is_empty());
        assert_eq!(card.trips.len(), 2);

        let mut card = ClassicCard::from_dump(&[1], &ovc_dump())?;
        card.sectors[32] = ClassicSector::Unauthorized { index: 32 };
        let ovc = parse(&card)?;
        assert!(ovc.subscriptions.is_empty());
        assert_eq!(ovc.balance(), "€12.50");
        Ok(())
    }

    #[test]
    fn test_parse_unreadable_sectors() -> Result<()> {
        // Losing any of these loses the card.
        for sector in [0, 22, 35, 38, 39] {
            let mut card = ClassicCard::from_dump(&[1], &ovc_dump())?;
            card.sectors[sector] = ClassicSector::Unauthorized { index: sector };
            match parse(&card) {
                Err(Error::Invalid(msg)) => assert!(msg.contains("unauthorized"), "{}", msg),
                v => panic!("wrong result for sector {}: {:?}", sector, v),
            }
        }

        let mut card = ClassicCard::from_dump(&[1], &ovc_dump())?;
        card.sectors[36] = ClassicSector::Invalid {
            index: 36,
            error: "read failed".into(),
        };
        assert!(parse(&card).is_err());
        Ok(())
    }

    #[test]
    fn test_convert_date() {
        assert_eq!(
            convert_date(0, 0).map(|t| t.to_string()),
            Some("1997-01-01 00:00:00".to_string())
        );
        assert_eq!(
            convert_date(366, 61).map(|t| t.to_string()),
            Some("1998-01-02 01:01:00".to_string())
        );
    }

    #[test]
    fn test_agency() {
        assert_eq!(Agency::from(4), Agency::Ns);
        assert_eq!(Agency::from(0x2C), Agency::DuoAlt);
        assert_eq!(Agency::DuoAlt.short_name(), "DUO");
        assert_eq!(Agency::from(0x42), Agency::Unknown(0x42));
        assert_eq!(Agency::Unknown(0x42).short_name(), "Unknown (0x42)");
        assert_eq!(Agency::Ns.name(), "Nederlandse Spoorwegen");
        assert_eq!(Agency::Arriva.name(), "Arriva");
    }
}
