use chrono::NaiveDateTime;
use tracing::{trace, trace_span};

use super::transaction::{
    PROCESS_BANNED, PROCESS_CREDIT, PROCESS_NODATA, PROCESS_PURCHASE, PROCESS_TRANSFER,
};
use super::{format_euro, Agency, OvcTransaction};
use crate::transit::Mode;

/// A journey, made from a check-in and (hopefully) its matching check-out.
///
/// Anything that isn't a check-in, like a top-up or a purchase, becomes a trip on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvcTrip {
    /// Sequence number of the first transaction.
    pub id: u32,
    pub process_type: i32,
    pub agency: Agency,
    pub timestamp: Option<NaiveDateTime>,
    pub exit_timestamp: Option<NaiveDateTime>,
    pub start_station: u32,
    pub end_station: Option<u32>,
    /// Cents; the check-out carries the actual fare.
    pub fare: i32,
}

impl OvcTrip {
    pub fn new(checkin: &OvcTransaction, checkout: Option<&OvcTransaction>) -> Self {
        Self {
            id: checkin.id,
            process_type: checkin.transfer,
            agency: checkin.agency(),
            timestamp: checkin.timestamp(),
            exit_timestamp: checkout.and_then(|out| out.timestamp()),
            start_station: checkin.station,
            end_station: checkout.map(|out| out.station),
            fare: checkout.unwrap_or(checkin).amount,
        }
    }

    /// Bus unless proven otherwise; there's no telling bus stops from tram stops.
    pub fn mode(&self) -> Mode {
        match self.process_type {
            PROCESS_BANNED => return Mode::Banned,
            PROCESS_CREDIT | PROCESS_TRANSFER => return Mode::TicketMachine,
            PROCESS_PURCHASE | PROCESS_NODATA => return Mode::VendingMachine,
            _ => {}
        }
        let station = self.start_station;
        match self.agency {
            Agency::Ns => Mode::Train,
            Agency::Arriva if station < 800 => Mode::Train,
            Agency::Gvb | Agency::Ret if station < 3000 => Mode::Metro,
            Agency::Arriva if station > 4600 && station < 4700 => Mode::Ferry,
            Agency::Tls | Agency::Duo | Agency::Reseller => Mode::Other,
            _ => Mode::Bus,
        }
    }

    pub fn fare_string(&self) -> String {
        format_euro(self.fare.into())
    }
}

/// Turns the transaction log into trips.
///
/// Transactions are walked in sequence order. A check-in followed by its check-out
/// becomes one trip; the card sometimes logs a check-in or check-out twice, in which
/// case only one copy is used.
pub fn reconstruct(transactions: &[OvcTransaction]) -> Vec<OvcTrip> {
    let span = trace_span!("reconstruct", transactions = transactions.len());
    let _enter = span.enter();

    let mut txs: Vec<&OvcTransaction> = transactions.iter().collect();
    txs.sort_by_key(|tx| tx.id);

    let mut trips = Vec::new();
    let mut i = 0;
    while i < txs.len() {
        let tx = txs[i];
        if !tx.valid {
            i += 1;
            continue;
        }
        match txs.get(i + 1) {
            Some(next) if next.id == tx.id => {
                trace!(id = tx.id, "Skipping duplicate check-in");
                i += 1;
            }
            Some(next) if tx.is_same_trip(next) => {
                trips.push(OvcTrip::new(tx, Some(next)));
                i += 2;
                if txs.get(i).map_or(false, |following| following.id == next.id) {
                    trace!(id = next.id, "Skipping duplicate check-out");
                    i += 1;
                }
            }
            _ => {
                trips.push(OvcTrip::new(tx, None));
                i += 1;
            }
        }
    }

    trips.sort_by_key(|trip| trip.id);
    trips
}
