//! Bill schema
//!
//! DDL for the four bill tables and a small SQLite-backed store
//! ([`BillDatabase`]) that exercises it.
//!
//! Schema (per ledger, `ap_` or `ar_` prefix):
//! - `*_bill_header_h`: one row per bill, keyed by `bill_hdr_id`
//! - `*_bill_lines_h`: line items, `bill_hdr_id` references the header with
//!   `ON DELETE CASCADE`
//!
//! UUIDs and dates are stored as TEXT (hyphenated / ISO-8601).

mod bill_store;

pub use bill_store::BillDatabase;

use korefi_types::{Ledger, MAX_TEXT_LEN};

/// Stored in `PRAGMA user_version` once the tables exist
pub const SCHEMA_VERSION: i32 = 1;

/// `CREATE TABLE IF NOT EXISTS` statements for one ledger
pub fn ledger_ddl(ledger: Ledger) -> String {
    let header = ledger.header_table();
    let lines = ledger.lines_table();
    let text = format!("VARCHAR({MAX_TEXT_LEN})");

    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {header} (
            bill_hdr_id TEXT PRIMARY KEY NOT NULL,
            organisation_id INTEGER NOT NULL,
            vendor_id INTEGER NOT NULL,
            bill_number {text} NOT NULL,
            bill_currency_code INTEGER NOT NULL,
            bill_amount REAL NOT NULL,
            bill_amount_lc REAL NOT NULL,
            bill_date TEXT NOT NULL,
            bill_type INTEGER NOT NULL,
            description {text} NOT NULL,
            payment_terms_id INTEGER NOT NULL,
            due_date TEXT NOT NULL,
            payment_status {text} NOT NULL,
            exchange_rate REAL NOT NULL,
            paid_amount_lc REAL NOT NULL,
            created_time TEXT NOT NULL,
            created_by {text} NOT NULL,
            last_update_date TEXT NOT NULL,
            last_updated_by {text} NOT NULL,
            account_id INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {lines} (
            bill_line_id TEXT PRIMARY KEY NOT NULL,
            bill_hdr_id TEXT NOT NULL
                REFERENCES {header}(bill_hdr_id) ON DELETE CASCADE,
            item_description {text} NOT NULL,
            quantity REAL NOT NULL,
            line_amount REAL NOT NULL,
            unit_price REAL NOT NULL,
            created_time TEXT NOT NULL,
            created_by {text} NOT NULL,
            last_update_date TEXT NOT NULL,
            last_updated_by {text} NOT NULL,
            item_id INTEGER NOT NULL,
            item {text} NOT NULL,
            line_amount_lc REAL NOT NULL,
            line_status {text} NOT NULL,
            account_id INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_{lines}_hdr ON {lines}(bill_hdr_id);
        "#
    )
}
