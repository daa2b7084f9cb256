//! Invoice construction and payment status.
//!
//! `amount_paid` is recorded as an absolute value: each payment update
//! replaces the previous figure rather than adding to it. Updates that
//! would lower the figure are rejected, since payments are never
//! retracted. Payment status is always derived, never stored from input.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{MontageError, MontageResult};
use crate::models::invoice::{CreateInvoice, Invoice, LineItem, PaymentStatus};
use crate::pricing::round_money;

/// Default tolerance under the total at which an invoice counts as paid.
pub const DEFAULT_PAYMENT_TOLERANCE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Derive the payment status of an invoice.
pub fn payment_status(
    amount_paid: Decimal,
    total_incl_tax: Decimal,
    tolerance: Decimal,
) -> PaymentStatus {
    if amount_paid >= total_incl_tax - tolerance {
        PaymentStatus::Paid
    } else if amount_paid > Decimal::ZERO {
        PaymentStatus::PartiallyPaid
    } else {
        PaymentStatus::Unpaid
    }
}

/// Set the invoice's paid amount and recompute its status.
pub fn record_payment(
    invoice: &mut Invoice,
    amount_paid: Decimal,
    tolerance: Decimal,
) -> MontageResult<PaymentStatus> {
    if amount_paid < Decimal::ZERO {
        return Err(MontageError::validation(format!(
            "paid amount cannot be negative, got {amount_paid}"
        )));
    }
    if amount_paid < invoice.amount_paid {
        return Err(MontageError::validation(format!(
            "paid amount cannot decrease from {} to {amount_paid}",
            invoice.amount_paid
        )));
    }
    invoice.amount_paid = amount_paid;
    invoice.payment_status = payment_status(amount_paid, invoice.total_incl_tax, tolerance);
    Ok(invoice.payment_status)
}

/// A billable line before rounding.
#[derive(Debug, Clone)]
pub struct BillableLine {
    pub job_id: Uuid,
    pub job_reference: String,
    pub description_lines: Vec<String>,
    /// Full-precision price excluding tax.
    pub price_excl_tax: Decimal,
}

/// Header fields of an invoice to build.
#[derive(Debug, Clone)]
pub struct InvoiceHeader {
    pub owner_account_id: Uuid,
    pub invoice_number: String,
    pub emission_date: NaiveDate,
}

/// Build the persisted form of an invoice.
///
/// Line prices are rounded to cents for presentation. Totals are computed
/// from the full-precision prices and rounded once at the end.
pub fn build_invoice(
    header: InvoiceHeader,
    lines: Vec<BillableLine>,
    vat_rate: Decimal,
) -> MontageResult<CreateInvoice> {
    if header.invoice_number.trim().is_empty() {
        return Err(MontageError::validation("invoice number must not be empty"));
    }
    if lines.is_empty() {
        return Err(MontageError::validation(
            "an invoice needs at least one line item",
        ));
    }
    if vat_rate < Decimal::ZERO {
        return Err(MontageError::validation("VAT rate cannot be negative"));
    }

    let total_excl: Decimal = lines.iter().map(|line| line.price_excl_tax).sum();
    let total_incl = total_excl + total_excl * vat_rate;

    let line_items = lines
        .into_iter()
        .map(|line| LineItem {
            job_id: line.job_id,
            job_reference: line.job_reference,
            description_lines: line.description_lines,
            unit_price_excl_tax: round_money(line.price_excl_tax),
        })
        .collect();

    Ok(CreateInvoice {
        owner_account_id: header.owner_account_id,
        invoice_number: header.invoice_number,
        emission_date: header.emission_date,
        line_items,
        total_excl_tax: round_money(total_excl),
        total_incl_tax: round_money(total_incl),
    })
}
