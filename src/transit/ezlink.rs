//! EZ-Link and NETS FlashPay, Singapore. Both are plain CEPAS cards using purse 3.
use chrono::FixedOffset;

use super::{format_amount, Mode, TransitFactory, TransitIdentity, TransitInfo, Trip};
use crate::card::Card;
use crate::cepas::{CepasCard, CepasTransaction, Purse, TransactionType};
use crate::{Error, Result};

pub const PURSE_ID: u8 = 3;

/// Singapore time; the card stores UTC.
const SGT_OFFSET: i32 = 8 * 3600;

/// Station codes as they appear in the transaction log. Not complete: just the
/// top-up codes and the North-East line.
const STATIONS: &[(&str, &str)] = &[
    ("GTM", "GTM Manual Top-up"),
    ("PSC", "Passenger Service Centre Top-up"),
    ("HBF", "HarbourFront"),
    ("HBC", "HarbourFront"),
    ("OTP", "Outram Park"),
    ("CNT", "Chinatown"),
    ("CQY", "Clarke Quay"),
    ("DBG", "Dhoby Ghaut"),
    ("DBN", "Dhoby Ghaut"),
    ("LTI", "Little India"),
    ("FRP", "Farrer Park"),
    ("BNK", "Boon Keng"),
    ("PTP", "Potong Pasir"),
    ("WLH", "Woodleigh"),
    ("SER", "Serangoon"),
    ("SRC", "Serangoon"),
    ("KVN", "Kovan"),
    ("HGN", "Hougang"),
    ("BGK", "Buangkok"),
    ("SKG", "Sengkang"),
    ("PGL", "Punggol"),
    ("PGC", "Punggol Coast"),
];

pub struct EzLink;

fn station_name(code: &str) -> Option<&'static str> {
    STATIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// The first three digits of the CAN say who issued the card.
pub fn card_issuer(can: &str) -> &'static str {
    match can.get(0..3) {
        Some("100") => "EZ-Link",
        Some("111") => "NETS",
        _ => "CEPAS",
    }
}

fn purse(card: &CepasCard) -> Result<&Purse> {
    card.purse(PURSE_ID)
        .and_then(|p| p.purse())
        .ok_or(Error::UnsupportedCard)
}

fn serial_number(purse: &Purse) -> String {
    hex::encode(purse.can)
}

fn sgd(cents: i64) -> String {
    format_amount(cents, "S$")
}

fn is_bus(tx: &CepasTransaction) -> bool {
    matches!(tx.kind, TransactionType::Bus | TransactionType::BusRefund)
}

fn route(tx: &CepasTransaction) -> String {
    match tx.kind {
        TransactionType::Bus => {
            if tx.user_data.starts_with("SVC") || tx.user_data.starts_with("BUS") {
                let service: String = tx
                    .user_data
                    .chars()
                    .skip(3)
                    .take(4)
                    .filter(|c| *c != ' ')
                    .collect();
                format!("Bus #{}", service)
            } else {
                "(Unknown Bus Route)".into()
            }
        }
        TransactionType::BusRefund => "Bus Refund".into(),
        TransactionType::Mrt => "MRT".into(),
        TransactionType::TopUp => "Top-up".into(),
        TransactionType::Creation => "First use".into(),
        TransactionType::Retail => "Retail Purchase".into(),
        TransactionType::Service => "Service Charge".into(),
        TransactionType::Unknown(_) => "(Unknown Route)".into(),
    }
}

/// Station pairs are logged as "ABC-DEF" (or with a space).
fn stations(tx: &CepasTransaction) -> (Option<String>, Option<String>) {
    if tx.kind == TransactionType::Creation || is_bus(tx) {
        return (None, None);
    }
    let data = tx.user_data.as_str();
    match (data.get(0..3), data.get(3..4), data.get(4..7)) {
        (Some(start), Some("-" | " "), end) => {
            let lookup = |code: &str| station_name(code).unwrap_or(code).to_owned();
            (Some(lookup(start)), end.map(lookup))
        }
        _ if data.is_empty() => (None, None),
        _ => (Some(data.to_owned()), None),
    }
}

fn trip(tx: &CepasTransaction, card_name: &str) -> Trip {
    let agency = match tx.kind {
        TransactionType::Bus | TransactionType::BusRefund => None,
        TransactionType::Creation | TransactionType::TopUp | TransactionType::Service => {
            Some(card_name.to_owned())
        }
        TransactionType::Retail => Some("POS".into()),
        _ => Some("SMRT".into()),
    };
    // Debits are negative on the card; show them as positive fares.
    let fare = match tx.kind {
        TransactionType::Creation => None,
        _ => {
            let fare = -i64::from(tx.amount);
            Some(if fare < 0 {
                format!("Credit {}", sgd(-fare))
            } else {
                sgd(fare)
            })
        }
    };
    let mode = match tx.kind {
        TransactionType::Bus | TransactionType::BusRefund => Mode::Bus,
        TransactionType::Mrt => Mode::Metro,
        TransactionType::TopUp => Mode::TicketMachine,
        TransactionType::Retail | TransactionType::Service => Mode::Pos,
        _ => Mode::Other,
    };
    let (start_station, end_station) = stations(tx);
    Trip {
        timestamp: FixedOffset::east_opt(SGT_OFFSET)
            .map(|tz| tx.timestamp.with_timezone(&tz).naive_local()),
        exit_timestamp: None,
        agency,
        route: Some(route(tx)),
        fare,
        start_station,
        end_station,
        mode,
    }
}

impl TransitFactory for EzLink {
    fn name(&self) -> &'static str {
        "EZ-Link"
    }

    fn check(&self, card: &Card) -> bool {
        match card.as_cepas() {
            Some(card) => {
                card.purse(PURSE_ID).map_or(false, |p| p.is_valid())
                    && card.history(PURSE_ID).map_or(false, |h| h.is_valid())
            }
            None => false,
        }
    }

    fn parse_identity(&self, card: &Card) -> Result<TransitIdentity> {
        let card = card.as_cepas().ok_or(Error::UnsupportedCard)?;
        let serial = serial_number(purse(card)?);
        Ok(TransitIdentity::new(card_issuer(&serial), Some(serial)))
    }

    fn parse_info(&self, card: &Card) -> Result<TransitInfo> {
        let card = card.as_cepas().ok_or(Error::UnsupportedCard)?;
        let purse = purse(card)?;
        let serial = serial_number(purse);
        let card_name = card_issuer(&serial);

        let mut transactions: Vec<&CepasTransaction> = card
            .history(PURSE_ID)
            .map(|h| h.transactions().iter().collect())
            .unwrap_or_default();
        transactions.sort_by_key(|tx| tx.timestamp);

        Ok(TransitInfo {
            card_name: card_name.into(),
            serial_number: Some(serial),
            balance: sgd(purse.balance.into()),
            trips: transactions.into_iter().map(|tx| trip(tx, card_name)).collect(),
            subscriptions: Vec::new(),
        })
    }
}
