use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of every text column in the bill tables.
pub const MAX_TEXT_LEN: usize = 255;

/// Which family of bill tables a record belongs to.
///
/// Payable and receivable bills share one shape; only the backing tables
/// differ:
/// - `Payable`: `ap_bill_header_h` / `ap_bill_lines_h`
/// - `Receivable`: `ar_bill_header_h` / `ar_bill_lines_h`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ledger {
    Payable,
    Receivable,
}

impl Ledger {
    pub const ALL: [Ledger; 2] = [Ledger::Payable, Ledger::Receivable];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payable => "payable",
            Self::Receivable => "receivable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "payable" | "ap" => Some(Self::Payable),
            "receivable" | "ar" => Some(Self::Receivable),
            _ => None,
        }
    }

    /// Table holding bill headers for this ledger
    pub fn header_table(&self) -> &'static str {
        match self {
            Self::Payable => "ap_bill_header_h",
            Self::Receivable => "ar_bill_header_h",
        }
    }

    /// Table holding bill lines for this ledger
    pub fn lines_table(&self) -> &'static str {
        match self {
            Self::Payable => "ap_bill_lines_h",
            Self::Receivable => "ar_bill_lines_h",
        }
    }
}

/// A bill header record.
///
/// Owns zero or more [`BillLine`]s through `bill_hdr_id`; deleting a header
/// deletes its lines. Amounts suffixed `_lc` are in the organisation's local
/// currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillHeader {
    pub bill_hdr_id: Uuid,
    pub organisation_id: i32,
    /// Counterparty: vendor for payables, customer for receivables.
    pub vendor_id: i32,
    pub bill_number: String,
    pub bill_currency_code: i64,
    pub bill_amount: f64,
    pub bill_amount_lc: f64,
    pub bill_date: NaiveDate,
    pub bill_type: i64,
    pub description: String,
    pub payment_terms_id: i64,
    pub due_date: NaiveDate,
    pub payment_status: String,
    pub exchange_rate: f64,
    pub paid_amount_lc: f64,
    pub created_time: NaiveDate,
    pub created_by: String,
    pub last_update_date: NaiveDate,
    pub last_updated_by: String,
    pub account_id: i64,
}

impl BillHeader {
    /// Text fields paired with their column names, for length checks.
    pub fn text_fields(&self) -> [(&'static str, &str); 5] {
        [
            ("bill_number", &self.bill_number),
            ("description", &self.description),
            ("payment_status", &self.payment_status),
            ("created_by", &self.created_by),
            ("last_updated_by", &self.last_updated_by),
        ]
    }

    /// Amount still outstanding in local currency
    pub fn outstanding_lc(&self) -> f64 {
        self.bill_amount_lc - self.paid_amount_lc
    }
}

/// A single line item of a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillLine {
    pub bill_line_id: Uuid,
    pub bill_hdr_id: Uuid,
    pub item_description: String,
    pub quantity: f64,
    pub line_amount: f64,
    pub unit_price: f64,
    pub created_time: NaiveDate,
    pub created_by: String,
    pub last_update_date: NaiveDate,
    pub last_updated_by: String,
    pub item_id: i64,
    pub item: String,
    pub line_amount_lc: f64,
    pub line_status: String,
    pub account_id: i64,
}

impl BillLine {
    /// Text fields paired with their column names, for length checks.
    pub fn text_fields(&self) -> [(&'static str, &str); 5] {
        [
            ("item_description", &self.item_description),
            ("created_by", &self.created_by),
            ("last_updated_by", &self.last_updated_by),
            ("item", &self.item),
            ("line_status", &self.line_status),
        ]
    }
}
