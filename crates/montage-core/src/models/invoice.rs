//! Invoice domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MontageError, MontageResult};

/// Derived from `amount_paid` and `total_incl_tax`; never set by callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::PartiallyPaid => "PartiallyPaid",
            PaymentStatus::Paid => "Paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = MontageError;

    fn from_str(s: &str) -> MontageResult<Self> {
        super::parse_label(
            "payment status",
            s,
            &[
                ("Unpaid", PaymentStatus::Unpaid),
                ("PartiallyPaid", PaymentStatus::PartiallyPaid),
                ("Paid", PaymentStatus::Paid),
            ],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    /// The billed job; a job appears on at most one invoice.
    pub job_id: Uuid,
    pub job_reference: String,
    pub description_lines: Vec<String>,
    /// Rounded to cents at invoicing.
    pub unit_price_excl_tax: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub owner_account_id: Uuid,
    /// Globally unique and immutable once assigned.
    pub invoice_number: String,
    pub emission_date: NaiveDate,
    pub line_items: Vec<LineItem>,
    /// Informational.
    pub total_excl_tax: Decimal,
    /// Authoritative total used for payment status.
    pub total_incl_tax: Decimal,
    pub amount_paid: Decimal,
    pub payment_status: PaymentStatus,
    /// Optimistic lock counter, incremented on every write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A fully computed invoice ready to be persisted. Produced by
/// [`crate::ledger::build_invoice`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub owner_account_id: Uuid,
    pub invoice_number: String,
    pub emission_date: NaiveDate,
    pub line_items: Vec<LineItem>,
    pub total_excl_tax: Decimal,
    pub total_incl_tax: Decimal,
}

/// Request to issue an invoice for a shop's jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub owner_account_id: Uuid,
    pub invoice_number: String,
    /// Defaults to today (UTC).
    pub emission_date: Option<NaiveDate>,
    /// Jobs billed, in line-item order.
    pub job_ids: Vec<Uuid>,
}
