//! korefi-types - Shared record types for KoreFi services
//!
//! Pure data structures without heavy dependencies.
//! No database driver, no async runtime - just serde-serializable types.
//!
//! Used by:
//! - korefi-commons (schema store)
//! - bill-processing services that read and write these records

pub mod models;

pub use models::{BillHeader, BillLine, Ledger, MAX_TEXT_LEN};
