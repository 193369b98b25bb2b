//! OV-chipkaart, the Netherlands.
use super::{Subscription, TransitFactory, TransitIdentity, TransitInfo, Trip};
use crate::card::Card;
use crate::classic::ClassicCard;
use crate::ovchip::{self, format_euro, Agency, OvcSubscription, OvcTrip};
use crate::{Error, Result};

pub struct OvChip;

impl OvChip {
    fn card<'a>(&self, card: &'a Card) -> Result<&'a ClassicCard> {
        card.as_classic().ok_or(Error::UnsupportedCard)
    }
}

fn trip(trip: &OvcTrip) -> Trip {
    Trip {
        timestamp: trip.timestamp,
        exit_timestamp: trip.exit_timestamp,
        agency: Some(trip.agency.short_name()),
        route: None,
        fare: Some(trip.fare_string()),
        start_station: Some(trip.start_station.to_string()),
        end_station: trip.end_station.map(|station| station.to_string()),
        mode: trip.mode(),
    }
}

fn subscription(sub: &OvcSubscription) -> Subscription {
    Subscription {
        id: sub.id,
        name: sub.name(),
        agency: Agency::from(u16::from(sub.company)).short_name(),
        valid_from: sub.valid_from(),
        valid_to: sub.valid_to(),
        activation: sub.activation().into(),
    }
}

impl TransitFactory for OvChip {
    fn name(&self) -> &'static str {
        "OV-chipkaart"
    }

    fn check(&self, card: &Card) -> bool {
        card.as_classic().map_or(false, ovchip::check)
    }

    /// The serial number is the first four bytes of the manufacturer block, which
    /// is all we need to read for it.
    fn parse_identity(&self, card: &Card) -> Result<TransitIdentity> {
        let block = self.card(card)?.sector(0)?.read_blocks(0, 1)?;
        Ok(TransitIdentity::new(
            self.name(),
            Some(hex::encode_upper(&block[..4])),
        ))
    }

    fn parse_info(&self, card: &Card) -> Result<TransitInfo> {
        let ovc = ovchip::parse(self.card(card)?)?;
        Ok(TransitInfo {
            card_name: self.name().into(),
            serial_number: Some(ovc.preamble.id.clone()),
            balance: format_euro(ovc.credit.credit.into()),
            trips: ovc.trips.iter().map(trip).collect(),
            subscriptions: ovc.subscriptions.iter().map(subscription).collect(),
        })
    }
}
