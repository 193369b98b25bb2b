//! Reads contactless transit cards and turns them into balances and trips.
//!
//! Cards are read over a [`transport::Transport`] (usually PC/SC), decoded into a
//! [`card::Card`], and then handed to [`transit`] to figure out what system they
//! belong to.
pub mod card;
pub mod cepas;
pub mod classic;
pub mod desfire;
pub mod errors;
pub mod ovchip;
pub mod pcsc;
pub mod protocol;
pub mod transit;
pub mod transport;
pub mod util;

pub use errors::{Error, Result};
