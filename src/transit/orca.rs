//! ORCA, Seattle. Only the serial number and balance; trips live in a record file we
//! don't decode.
use super::{format_amount, TransitFactory, TransitIdentity, TransitInfo};
use crate::card::Card;
use crate::desfire::DesfireCard;
use crate::errors::ensure_len;
use crate::util::be_uint;
use crate::{Error, Result};

pub const APP_ID: u32 = 0x3010F2;
const CARD_APP_ID: u32 = 0xFFFFFF;

pub struct Orca;

impl Orca {
    fn card<'a>(&self, card: &'a Card) -> Result<&'a DesfireCard> {
        card.as_desfire().ok_or(Error::UnsupportedCard)
    }

    fn serial_number(card: &DesfireCard) -> Result<String> {
        let data = card
            .file_data(CARD_APP_ID, 0x0F)
            .ok_or_else(|| Error::Invalid("ORCA card has no serial number file".into()))?;
        ensure_len("ORCA serial number", data, 8)?;
        Ok(be_uint(&data[4..8]).to_string())
    }
}

impl TransitFactory for Orca {
    fn name(&self) -> &'static str {
        "ORCA"
    }

    fn check(&self, card: &Card) -> bool {
        card.as_desfire()
            .map_or(false, |card| card.application(APP_ID).is_some())
    }

    fn parse_identity(&self, card: &Card) -> Result<TransitIdentity> {
        let card = self.card(card)?;
        Ok(TransitIdentity::new(self.name(), Some(Self::serial_number(card)?)))
    }

    fn parse_info(&self, card: &Card) -> Result<TransitInfo> {
        let card = self.card(card)?;
        let data = card
            .file_data(APP_ID, 0x04)
            .ok_or_else(|| Error::Invalid("ORCA card has no balance file".into()))?;
        ensure_len("ORCA balance", data, 43)?;
        Ok(TransitInfo {
            card_name: self.name().into(),
            serial_number: Some(Self::serial_number(card)?),
            balance: format_amount(be_uint(&data[41..43]) as i64, "$"),
            trips: Vec::new(),
            subscriptions: Vec::new(),
        })
    }
}
