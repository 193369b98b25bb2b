//! Transit systems: turning decoded cards into balances and trips.
//!
//! Each supported system has a [`TransitFactory`], which recognises its cards and knows
//! how to read them. They're tried in order, and the first one that recognises a card
//! gets to decode it.
pub mod clipper;
pub mod ezlink;
pub mod hsl;
pub mod orca;
pub mod ovchip;

use std::fmt;

use chrono::NaiveDateTime;
use tracing::{debug, trace_span};

use crate::card::Card;
use crate::{Error, Result};

/// Known transit systems, in the order they're tried.
pub static FACTORIES: &[&dyn TransitFactory] = &[
    &orca::Orca,
    &clipper::Clipper,
    &hsl::Hsl,
    &ezlink::EzLink,
    &ovchip::OvChip,
];

pub trait TransitFactory: Sync {
    fn name(&self) -> &'static str;

    /// Does this card belong to us? Must be cheap; must not fail.
    fn check(&self, card: &Card) -> bool;

    /// Name and serial number, without decoding everything else.
    fn parse_identity(&self, card: &Card) -> Result<TransitIdentity>;

    fn parse_info(&self, card: &Card) -> Result<TransitInfo>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitIdentity {
    pub name: String,
    pub serial_number: Option<String>,
}

impl TransitIdentity {
    pub fn new(name: impl Into<String>, serial_number: Option<String>) -> Self {
        Self {
            name: name.into(),
            serial_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitInfo {
    pub card_name: String,
    pub serial_number: Option<String>,
    /// Formatted with the system's currency.
    pub balance: String,
    /// Oldest first, whatever order the card keeps them in.
    pub trips: Vec<Trip>,
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Bus,
    Train,
    Metro,
    Ferry,
    TicketMachine,
    VendingMachine,
    /// Point of sale: shops, service counters.
    Pos,
    Banned,
    Other,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bus => "Bus",
            Self::Train => "Train",
            Self::Metro => "Metro",
            Self::Ferry => "Ferry",
            Self::TicketMachine => "Ticket Machine",
            Self::VendingMachine => "Vending Machine",
            Self::Pos => "POS",
            Self::Banned => "Banned",
            Self::Other => "Other",
        })
    }
}

/// A journey, top-up or purchase, in whatever detail the card gives us.
///
/// Times are local to the transit system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub timestamp: Option<NaiveDateTime>,
    pub exit_timestamp: Option<NaiveDateTime>,
    pub agency: Option<String>,
    pub route: Option<String>,
    pub fare: Option<String>,
    pub start_station: Option<String>,
    pub end_station: Option<String>,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: u32,
    pub name: String,
    pub agency: String,
    pub valid_from: Option<NaiveDateTime>,
    pub valid_to: Option<NaiveDateTime>,
    pub activation: String,
}

/// Formats cents as eg. "$1.50" or "$-1.50".
pub fn format_amount(cents: i64, symbol: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}{}.{:02}", symbol, sign, abs / 100, abs % 100)
}

/// Finds the transit system a card belongs to.
pub fn find(card: &Card) -> Result<&'static dyn TransitFactory> {
    FACTORIES
        .iter()
        .copied()
        .find(|factory| factory.check(card))
        .ok_or(Error::UnsupportedCard)
}

pub fn identify(card: &Card) -> Result<TransitIdentity> {
    let factory = find(card)?;
    debug!(system = factory.name(), "Identified card");
    factory.parse_identity(card)
}

pub fn parse(card: &Card) -> Result<TransitInfo> {
    let factory = find(card)?;
    let span = trace_span!("transit", system = factory.name());
    let _enter = span.enter();
    factory.parse_info(card)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classic::ClassicCard;
    use crate::desfire::{
        DesfireApplication, DesfireCard, DesfireFile, FileSettings, FileType, ManufacturingData,
        SettingsDetail,
    };
    use chrono::Utc;

    /// A DESFire card with nothing but standard files.
    pub(crate) fn desfire_card(apps: &[(u32, &[(u8, &[u8])])]) -> Card {
        let applications = apps
            .iter()
            .map(|(id, files)| DesfireApplication {
                id: *id,
                files: files
                    .iter()
                    .map(|(file_id, data)| DesfireFile::Standard {
                        id: *file_id,
                        settings: FileSettings {
                            file_type: FileType::Standard,
                            comm_setting: 0,
                            access_rights: [0xEE, 0xEE],
                            detail: SettingsDetail::Standard {
                                file_size: data.len() as u32,
                            },
                        },
                        data: (*data).into(),
                    })
                    .collect(),
            })
            .collect();
        Card::Desfire(DesfireCard {
            tag_id: vec![0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66].into(),
            scanned_at: Utc::now(),
            manufacturing_data: ManufacturingData::parse(&[0; 28]).unwrap(),
            applications,
        })
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0, "$"), "$0.00");
        assert_eq!(format_amount(5, "$"), "$0.05");
        assert_eq!(format_amount(1234, "S$"), "S$12.34");
        assert_eq!(format_amount(-150, "€"), "€-1.50");
        assert_eq!(format_amount(-5, "€"), "€-0.05");
    }

    #[test]
    fn test_registry_order() {
        let names: Vec<_> = FACTORIES.iter().map(|f| f.name()).collect();
        assert_eq!(names, ["ORCA", "Clipper", "HSL", "EZ-Link", "OV-chipkaart"]);
    }

    #[test]
    fn test_unsupported() {
        let card = desfire_card(&[(0x123456, &[(0x01, &[0x00])])]);
        assert!(matches!(identify(&card), Err(Error::UnsupportedCard)));
        assert!(matches!(parse(&card), Err(Error::UnsupportedCard)));

        let classic = Card::Classic(ClassicCard::from_dump(&[1], &[0; 1024]).unwrap());
        assert!(matches!(identify(&classic), Err(Error::UnsupportedCard)));
    }

    #[test]
    fn test_first_match_wins() -> Result<()> {
        // Both ORCA and HSL applications; ORCA is tried first.
        let mut serial = [0u8; 8];
        serial[4..8].copy_from_slice(&[0x00, 0x0F, 0x42, 0x40]);
        let card = desfire_card(&[
            (0x3010F2, &[]),
            (0xFFFFFF, &[(0x0F, &serial)]),
            (0x1120EF, &[]),
        ]);
        assert_eq!(find(&card)?.name(), "ORCA");
        assert_eq!(
            identify(&card)?,
            TransitIdentity::new("ORCA", Some("1000000".into()))
        );
        Ok(())
    }
}
