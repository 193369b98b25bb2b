//! Clipper, San Francisco Bay Area.
use super::{format_amount, TransitFactory, TransitIdentity, TransitInfo};
use crate::card::Card;
use crate::desfire::DesfireCard;
use crate::errors::ensure_len;
use crate::util::be_uint;
use crate::{Error, Result};

pub const APP_ID: u32 = 0x9011F2;

pub struct Clipper;

fn file<'a>(card: &'a DesfireCard, id: u8, need: usize) -> Result<&'a [u8]> {
    let data = card
        .file_data(APP_ID, id)
        .ok_or_else(|| Error::Invalid(format!("Clipper card has no file {:#04x}", id)))?;
    ensure_len("Clipper file", data, need)?;
    Ok(data)
}

fn serial_number(card: &DesfireCard) -> Result<String> {
    Ok(be_uint(&file(card, 0x08, 5)?[1..5]).to_string())
}

impl TransitFactory for Clipper {
    fn name(&self) -> &'static str {
        "Clipper"
    }

    fn check(&self, card: &Card) -> bool {
        card.as_desfire()
            .map_or(false, |card| card.application(APP_ID).is_some())
    }

    fn parse_identity(&self, card: &Card) -> Result<TransitIdentity> {
        let card = card.as_desfire().ok_or(Error::UnsupportedCard)?;
        Ok(TransitIdentity::new(self.name(), Some(serial_number(card)?)))
    }

    fn parse_info(&self, card: &Card) -> Result<TransitInfo> {
        let card = card.as_desfire().ok_or(Error::UnsupportedCard)?;
        let data = file(card, 0x02, 20)?;
        // Can go negative.
        let balance = i16::from_be_bytes([data[18], data[19]]);
        Ok(TransitInfo {
            card_name: self.name().into(),
            serial_number: Some(serial_number(card)?),
            balance: format_amount(balance.into(), "$"),
            trips: Vec::new(),
            subscriptions: Vec::new(),
        })
    }
}
