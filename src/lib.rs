//! Circles - rotating-savings group engine
//!
//! Group lifecycle and payout cycles, an event-sourced trust score, the
//! early payout workflow, the referral credit ledger and monthly fee
//! reconciliation, persisted in SQLite.

pub mod clock;
pub mod config;
pub mod error;
pub mod facade;
pub mod model;
pub mod services;
pub mod storage;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{EngineError, Result};
pub use facade::{Circles, CirclesBuilder};
