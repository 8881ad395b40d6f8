//! Data models for bill records

pub mod bill;

pub use bill::{BillHeader, BillLine, Ledger, MAX_TEXT_LEN};
