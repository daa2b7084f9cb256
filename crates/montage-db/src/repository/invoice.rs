//! SurrealDB implementation of [`InvoiceRepository`].
//!
//! Invoice numbers carry a UNIQUE index; creation is additionally
//! pre-checked so the common duplicate case reports a clean conflict.
//! Line items are stored as nested objects with string-encoded amounts.

use chrono::{DateTime, NaiveDate, Utc};
use montage_core::access::VisibleOwners;
use montage_core::error::{MontageError, MontageResult};
use montage_core::models::invoice::{CreateInvoice, Invoice, LineItem, PaymentStatus};
use montage_core::repository::{InvoiceRepository, PaginatedResult, Pagination};
use serde::{Deserialize, Serialize};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CountRow, owner_clause, parse_enum, parse_money, parse_uuid};
use crate::error::DbError;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, SurrealValue)]
struct InvoiceRow {
    owner_account_id: String,
    invoice_number: String,
    emission_date: String,
    line_items: serde_json::Value,
    total_excl_tax: String,
    total_incl_tax: String,
    amount_paid: String,
    payment_status: String,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct InvoiceRowWithId {
    record_id: String,
    owner_account_id: String,
    invoice_number: String,
    emission_date: String,
    line_items: serde_json::Value,
    total_excl_tax: String,
    total_incl_tax: String,
    amount_paid: String,
    payment_status: String,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Stored shape of a line item.
#[derive(Debug, Serialize, Deserialize)]
struct LineItemDoc {
    job_id: String,
    job_reference: String,
    description_lines: Vec<String>,
    unit_price_excl_tax: String,
}

fn encode_line_items(items: &[LineItem]) -> Result<serde_json::Value, DbError> {
    let docs: Vec<LineItemDoc> = items
        .iter()
        .map(|item| LineItemDoc {
            job_id: item.job_id.to_string(),
            job_reference: item.job_reference.clone(),
            description_lines: item.description_lines.clone(),
            unit_price_excl_tax: item.unit_price_excl_tax.to_string(),
        })
        .collect();
    serde_json::to_value(docs).map_err(|e| DbError::Query(format!("line items: {e}")))
}

fn decode_line_items(value: serde_json::Value) -> Result<Vec<LineItem>, DbError> {
    let docs: Vec<LineItemDoc> = serde_json::from_value(value)
        .map_err(|e| DbError::Decode(format!("line items: {e}")))?;
    docs.into_iter()
        .map(|doc| {
            Ok(LineItem {
                job_id: parse_uuid("billed job", &doc.job_id)?,
                unit_price_excl_tax: parse_money("unit price", &doc.unit_price_excl_tax)?,
                job_reference: doc.job_reference,
                description_lines: doc.description_lines,
            })
        })
        .collect()
}

impl InvoiceRow {
    fn into_invoice(self, id: Uuid) -> Result<Invoice, DbError> {
        let emission_date = NaiveDate::parse_from_str(&self.emission_date, DATE_FORMAT)
            .map_err(|e| DbError::Decode(format!("invalid emission date: {e}")))?;
        Ok(Invoice {
            id,
            owner_account_id: parse_uuid("owner", &self.owner_account_id)?,
            invoice_number: self.invoice_number,
            emission_date,
            line_items: decode_line_items(self.line_items)?,
            total_excl_tax: parse_money("total excl. tax", &self.total_excl_tax)?,
            total_incl_tax: parse_money("total incl. tax", &self.total_incl_tax)?,
            amount_paid: parse_money("paid", &self.amount_paid)?,
            payment_status: parse_enum(&self.payment_status)?,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl InvoiceRowWithId {
    fn try_into_invoice(self) -> Result<Invoice, DbError> {
        let id = parse_uuid("invoice", &self.record_id)?;
        InvoiceRow {
            owner_account_id: self.owner_account_id,
            invoice_number: self.invoice_number,
            emission_date: self.emission_date,
            line_items: self.line_items,
            total_excl_tax: self.total_excl_tax,
            total_incl_tax: self.total_incl_tax,
            amount_paid: self.amount_paid,
            payment_status: self.payment_status,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_invoice(id)
    }
}

/// SurrealDB implementation of the Invoice repository.
#[derive(Clone)]
pub struct SurrealInvoiceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealInvoiceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM invoice \
                 WHERE invoice_number = $invoice_number",
            )
            .bind(("invoice_number", invoice_number.to_string()))
            .await?;

        let rows: Vec<InvoiceRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(InvoiceRowWithId::try_into_invoice)
            .transpose()
    }
}

impl<C: Connection> InvoiceRepository for SurrealInvoiceRepository<C> {
    async fn create(&self, input: CreateInvoice) -> MontageResult<Invoice> {
        if self.find_by_number(&input.invoice_number).await?.is_some() {
            return Err(MontageError::Conflict {
                entity: "invoice".into(),
                reason: format!("invoice number {} already exists", input.invoice_number),
            });
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let line_items = encode_line_items(&input.line_items)?;

        let result = self
            .db
            .query(
                "CREATE type::record('invoice', $id) SET \
                 owner_account_id = $owner_account_id, \
                 invoice_number = $invoice_number, \
                 emission_date = $emission_date, \
                 line_items = $line_items, \
                 total_excl_tax = $total_excl_tax, \
                 total_incl_tax = $total_incl_tax, \
                 amount_paid = '0', payment_status = $payment_status, \
                 version = 1",
            )
            .bind(("id", id_str.clone()))
            .bind(("owner_account_id", input.owner_account_id.to_string()))
            .bind(("invoice_number", input.invoice_number))
            .bind((
                "emission_date",
                input.emission_date.format(DATE_FORMAT).to_string(),
            ))
            .bind(("line_items", line_items))
            .bind(("total_excl_tax", input.total_excl_tax.to_string()))
            .bind(("total_incl_tax", input.total_incl_tax.to_string()))
            .bind(("payment_status", PaymentStatus::Unpaid.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("invoice", e))?;

        let rows: Vec<InvoiceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "invoice".into(),
            id: id_str,
        })?;

        let invoice = row.into_invoice(id)?;
        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            owner = %invoice.owner_account_id,
            "Invoice created"
        );
        Ok(invoice)
    }

    async fn get_by_id(&self, id: Uuid) -> MontageResult<Invoice> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('invoice', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InvoiceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "invoice".into(),
            id: id_str,
        })?;

        Ok(row.into_invoice(id)?)
    }

    async fn get_by_number(&self, invoice_number: &str) -> MontageResult<Invoice> {
        self.find_by_number(invoice_number)
            .await?
            .ok_or_else(|| MontageError::NotFound {
                entity: "invoice".into(),
                id: format!("number={invoice_number}"),
            })
    }

    async fn number_billing_job(&self, job_id: Uuid) -> MontageResult<Option<String>> {
        let mut result = self
            .db
            .query(
                "SELECT VALUE invoice_number FROM invoice \
                 WHERE $job_id IN line_items.*.job_id LIMIT 1",
            )
            .bind(("job_id", job_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let numbers: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(numbers.into_iter().next())
    }

    async fn save_payment(&self, invoice: &Invoice) -> MontageResult<Invoice> {
        let id_str = invoice.id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('invoice', $id) SET \
                 amount_paid = $amount_paid, \
                 payment_status = $payment_status, \
                 version = version + 1, updated_at = time::now() \
                 WHERE version = $version",
            )
            .bind(("id", id_str.clone()))
            .bind(("amount_paid", invoice.amount_paid.to_string()))
            .bind((
                "payment_status",
                invoice.payment_status.as_str().to_string(),
            ))
            .bind(("version", invoice.version))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("invoice", e))?;

        let rows: Vec<InvoiceRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(row.into_invoice(invoice.id)?),
            None => {
                self.get_by_id(invoice.id).await?;
                debug!(
                    invoice_id = %invoice.id,
                    version = invoice.version,
                    "Stale invoice write rejected"
                );
                Err(DbError::stale("invoice", &id_str, invoice.version).into())
            }
        }
    }

    async fn delete(&self, id: Uuid) -> MontageResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("DELETE type::record('invoice', $id) RETURN BEFORE")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InvoiceRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(MontageError::NotFound {
                entity: "invoice".into(),
                id: id_str,
            });
        }

        info!(invoice_id = %id, "Invoice deleted");
        Ok(())
    }

    async fn list(
        &self,
        owners: &VisibleOwners,
        pagination: Pagination,
    ) -> MontageResult<PaginatedResult<Invoice>> {
        if owners.is_empty() {
            return Ok(PaginatedResult::empty(&pagination));
        }

        let owner_filter = owner_clause(owners);
        let where_clause = owner_filter
            .as_ref()
            .map(|(clause, _)| format!(" WHERE {clause}"))
            .unwrap_or_default();

        let count_query = format!("SELECT count() AS total FROM invoice{where_clause} GROUP ALL");
        let list_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM invoice{where_clause} \
             ORDER BY emission_date DESC, created_at DESC \
             LIMIT $limit START $offset"
        );

        let mut count_builder = self.db.query(&count_query);
        let mut builder = self
            .db
            .query(&list_query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some((_, ids)) = owner_filter {
            count_builder = count_builder.bind(("owners", ids.clone()));
            builder = builder.bind(("owners", ids));
        }

        let mut count_result = count_builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<InvoiceRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_invoice())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
