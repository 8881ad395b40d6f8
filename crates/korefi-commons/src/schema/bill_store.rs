//! SQLite store for bill headers and lines

use super::{ledger_ddl, SCHEMA_VERSION};
use crate::error::SchemaError;
use anyhow::Context;
use chrono::NaiveDate;
use korefi_types::{BillHeader, BillLine, Ledger, MAX_TEXT_LEN};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

const HEADER_COLUMNS: &str = "bill_hdr_id, organisation_id, vendor_id, bill_number, \
    bill_currency_code, bill_amount, bill_amount_lc, bill_date, bill_type, description, \
    payment_terms_id, due_date, payment_status, exchange_rate, paid_amount_lc, created_time, \
    created_by, last_update_date, last_updated_by, account_id";

const LINE_COLUMNS: &str = "bill_line_id, bill_hdr_id, item_description, quantity, \
    line_amount, unit_price, created_time, created_by, last_update_date, last_updated_by, \
    item_id, item, line_amount_lc, line_status, account_id";

/// Bill tables for both ledgers in one SQLite database (thread-safe)
pub struct BillDatabase {
    conn: Mutex<Connection>,
}

impl BillDatabase {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self, SchemaError> {
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "Bill database opened");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SchemaError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, SchemaError> {
        // Per-connection setting; cascades depend on it
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create every bill table that doesn't exist yet. Safe to run repeatedly.
    pub fn migrate(&self) -> Result<(), SchemaError> {
        let conn = self.conn.lock();
        apply_schema(&conn).map_err(SchemaError::Migration)?;
        debug!(version = SCHEMA_VERSION, "Bill schema migrated");
        Ok(())
    }

    /// Value of `PRAGMA user_version` (0 before the first migration)
    pub fn schema_version(&self) -> Result<i32, SchemaError> {
        let conn = self.conn.lock();
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn insert_header(&self, ledger: Ledger, header: &BillHeader) -> Result<(), SchemaError> {
        check_lengths(&header.text_fields())?;

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO {} ({HEADER_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                ledger.header_table()
            ),
            params![
                header.bill_hdr_id.to_string(),
                header.organisation_id,
                header.vendor_id,
                header.bill_number,
                header.bill_currency_code,
                header.bill_amount,
                header.bill_amount_lc,
                header.bill_date.to_string(),
                header.bill_type,
                header.description,
                header.payment_terms_id,
                header.due_date.to_string(),
                header.payment_status,
                header.exchange_rate,
                header.paid_amount_lc,
                header.created_time.to_string(),
                header.created_by,
                header.last_update_date.to_string(),
                header.last_updated_by,
                header.account_id,
            ],
        )?;

        debug!(ledger = ledger.as_str(), id = %header.bill_hdr_id, "Inserted bill header");
        Ok(())
    }

    /// Insert a line; its header must already exist in the same ledger
    pub fn insert_line(&self, ledger: Ledger, line: &BillLine) -> Result<(), SchemaError> {
        check_lengths(&line.text_fields())?;

        let conn = self.conn.lock();
        let header_exists: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE bill_hdr_id = ?1)",
                ledger.header_table()
            ),
            params![line.bill_hdr_id.to_string()],
            |row| row.get(0),
        )?;
        if !header_exists {
            return Err(SchemaError::HeaderNotFound {
                id: line.bill_hdr_id,
            });
        }

        conn.execute(
            &format!(
                "INSERT INTO {} ({LINE_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                ledger.lines_table()
            ),
            params![
                line.bill_line_id.to_string(),
                line.bill_hdr_id.to_string(),
                line.item_description,
                line.quantity,
                line.line_amount,
                line.unit_price,
                line.created_time.to_string(),
                line.created_by,
                line.last_update_date.to_string(),
                line.last_updated_by,
                line.item_id,
                line.item,
                line.line_amount_lc,
                line.line_status,
                line.account_id,
            ],
        )?;
        Ok(())
    }

    pub fn get_header(&self, ledger: Ledger, id: Uuid) -> Result<Option<BillHeader>, SchemaError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {HEADER_COLUMNS} FROM {} WHERE bill_hdr_id = ?1",
                    ledger.header_table()
                ),
                params![id.to_string()],
                HeaderRow::read,
            )
            .optional()?;

        row.map(HeaderRow::into_header).transpose()
    }

    /// Lines of a bill in insertion order
    pub fn lines_for(&self, ledger: Ledger, header_id: Uuid) -> Result<Vec<BillLine>, SchemaError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LINE_COLUMNS} FROM {} WHERE bill_hdr_id = ?1 ORDER BY rowid",
            ledger.lines_table()
        ))?;

        let rows = stmt
            .query_map(params![header_id.to_string()], LineRow::read)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(LineRow::into_line).collect()
    }

    /// Delete a bill and (by cascade) its lines. `false` if it didn't exist.
    pub fn delete_header(&self, ledger: Ledger, id: Uuid) -> Result<bool, SchemaError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE bill_hdr_id = ?1", ledger.header_table()),
            params![id.to_string()],
        )?;

        if deleted > 0 {
            debug!(ledger = ledger.as_str(), %id, "Deleted bill header");
        }
        Ok(deleted > 0)
    }
}

fn apply_schema(conn: &Connection) -> anyhow::Result<()> {
    for ledger in Ledger::ALL {
        conn.execute_batch(&ledger_ddl(ledger))
            .with_context(|| format!("Failed to create {} tables", ledger.as_str()))?;
    }
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .context("Failed to record schema version")?;
    Ok(())
}

fn check_lengths(fields: &[(&'static str, &str)]) -> Result<(), SchemaError> {
    for &(field, value) in fields {
        let len = value.chars().count();
        if len > MAX_TEXT_LEN {
            return Err(SchemaError::FieldTooLong {
                field,
                len,
                max: MAX_TEXT_LEN,
            });
        }
    }
    Ok(())
}

fn parse_uuid(column: &'static str, value: &str) -> Result<Uuid, SchemaError> {
    Uuid::parse_str(value).map_err(|_| SchemaError::CorruptValue {
        column,
        value: value.to_string(),
    })
}

fn parse_date(column: &'static str, value: &str) -> Result<NaiveDate, SchemaError> {
    value
        .parse::<NaiveDate>()
        .map_err(|_| SchemaError::CorruptValue {
            column,
            value: value.to_string(),
        })
}

/// Raw header row; TEXT-encoded ids and dates are parsed afterwards so a bad
/// value surfaces as [`SchemaError::CorruptValue`] rather than a SQLite error.
struct HeaderRow {
    bill_hdr_id: String,
    organisation_id: i32,
    vendor_id: i32,
    bill_number: String,
    bill_currency_code: i64,
    bill_amount: f64,
    bill_amount_lc: f64,
    bill_date: String,
    bill_type: i64,
    description: String,
    payment_terms_id: i64,
    due_date: String,
    payment_status: String,
    exchange_rate: f64,
    paid_amount_lc: f64,
    created_time: String,
    created_by: String,
    last_update_date: String,
    last_updated_by: String,
    account_id: i64,
}

impl HeaderRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            bill_hdr_id: row.get(0)?,
            organisation_id: row.get(1)?,
            vendor_id: row.get(2)?,
            bill_number: row.get(3)?,
            bill_currency_code: row.get(4)?,
            bill_amount: row.get(5)?,
            bill_amount_lc: row.get(6)?,
            bill_date: row.get(7)?,
            bill_type: row.get(8)?,
            description: row.get(9)?,
            payment_terms_id: row.get(10)?,
            due_date: row.get(11)?,
            payment_status: row.get(12)?,
            exchange_rate: row.get(13)?,
            paid_amount_lc: row.get(14)?,
            created_time: row.get(15)?,
            created_by: row.get(16)?,
            last_update_date: row.get(17)?,
            last_updated_by: row.get(18)?,
            account_id: row.get(19)?,
        })
    }

    fn into_header(self) -> Result<BillHeader, SchemaError> {
        Ok(BillHeader {
            bill_hdr_id: parse_uuid("bill_hdr_id", &self.bill_hdr_id)?,
            organisation_id: self.organisation_id,
            vendor_id: self.vendor_id,
            bill_number: self.bill_number,
            bill_currency_code: self.bill_currency_code,
            bill_amount: self.bill_amount,
            bill_amount_lc: self.bill_amount_lc,
            bill_date: parse_date("bill_date", &self.bill_date)?,
            bill_type: self.bill_type,
            description: self.description,
            payment_terms_id: self.payment_terms_id,
            due_date: parse_date("due_date", &self.due_date)?,
            payment_status: self.payment_status,
            exchange_rate: self.exchange_rate,
            paid_amount_lc: self.paid_amount_lc,
            created_time: parse_date("created_time", &self.created_time)?,
            created_by: self.created_by,
            last_update_date: parse_date("last_update_date", &self.last_update_date)?,
            last_updated_by: self.last_updated_by,
            account_id: self.account_id,
        })
    }
}

struct LineRow {
    bill_line_id: String,
    bill_hdr_id: String,
    item_description: String,
    quantity: f64,
    line_amount: f64,
    unit_price: f64,
    created_time: String,
    created_by: String,
    last_update_date: String,
    last_updated_by: String,
    item_id: i64,
    item: String,
    line_amount_lc: f64,
    line_status: String,
    account_id: i64,
}

impl LineRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            bill_line_id: row.get(0)?,
            bill_hdr_id: row.get(1)?,
            item_description: row.get(2)?,
            quantity: row.get(3)?,
            line_amount: row.get(4)?,
            unit_price: row.get(5)?,
            created_time: row.get(6)?,
            created_by: row.get(7)?,
            last_update_date: row.get(8)?,
            last_updated_by: row.get(9)?,
            item_id: row.get(10)?,
            item: row.get(11)?,
            line_amount_lc: row.get(12)?,
            line_status: row.get(13)?,
            account_id: row.get(14)?,
        })
    }

    fn into_line(self) -> Result<BillLine, SchemaError> {
        Ok(BillLine {
            bill_line_id: parse_uuid("bill_line_id", &self.bill_line_id)?,
            bill_hdr_id: parse_uuid("bill_hdr_id", &self.bill_hdr_id)?,
            item_description: self.item_description,
            quantity: self.quantity,
            line_amount: self.line_amount,
            unit_price: self.unit_price,
            created_time: parse_date("created_time", &self.created_time)?,
            created_by: self.created_by,
            last_update_date: parse_date("last_update_date", &self.last_update_date)?,
            last_updated_by: self.last_updated_by,
            item_id: self.item_id,
            item: self.item,
            line_amount_lc: self.line_amount_lc,
            line_status: self.line_status,
            account_id: self.account_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_idempotent() {
        let db = BillDatabase::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), 0);

        db.migrate().unwrap();
        db.migrate().unwrap();
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_check_lengths_counts_chars() {
        let exact = "é".repeat(MAX_TEXT_LEN);
        assert!(check_lengths(&[("description", exact.as_str())]).is_ok());

        let long = "x".repeat(MAX_TEXT_LEN + 1);
        assert!(matches!(
            check_lengths(&[("bill_number", "ok"), ("description", long.as_str())]),
            Err(SchemaError::FieldTooLong {
                field: "description",
                len: 256,
                max: 255
            })
        ));
    }

    #[test]
    fn test_corrupt_date_is_reported() {
        let db = BillDatabase::open_in_memory().unwrap();
        db.migrate().unwrap();
        let id = Uuid::new_v4();
        {
            let conn = db.conn.lock();
            conn.execute(
                &format!(
                    "INSERT INTO ap_bill_header_h ({HEADER_COLUMNS}) VALUES \
                     (?1, 1, 1, 'B', 356, 1.0, 1.0, 'not-a-date', 1, '', 30, '2025-01-01', \
                     'unpaid', 1.0, 0.0, '2025-01-01', 'sys', '2025-01-01', 'sys', 1)"
                ),
                params![id.to_string()],
            )
            .unwrap();
        }

        assert!(matches!(
            db.get_header(Ledger::Payable, id),
            Err(SchemaError::CorruptValue {
                column: "bill_date",
                ..
            })
        ));
    }
}
