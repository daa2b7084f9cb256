//! Invoicing: issuing invoices for a shop's jobs and recording payments.

use std::collections::BTreeSet;

use chrono::Utc;
use montage_core::access;
use montage_core::error::{MontageError, MontageResult};
use montage_core::ledger::{self, BillableLine, InvoiceHeader};
use montage_core::models::account::{Account, Role};
use montage_core::models::invoice::{Invoice, IssueInvoice};
use montage_core::models::job::Job;
use montage_core::pricing::PriceCalculator;
use montage_core::repository::{
    AccountRepository, InvoiceRepository, JobRepository, PaginatedResult, Pagination,
};
use montage_core::workflow;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::account_service::lookup_shop;
use crate::config::ServiceConfig;

fn require_admin(actor: &Account, action: &str) -> MontageResult<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Client | Role::Manager => {
            warn!(actor = %actor.id, role = %actor.role, action, "Invoice action denied");
            Err(MontageError::forbidden(format!(
                "only administrators can {action}"
            )))
        }
    }
}

/// Invoice ledger service.
pub struct InvoiceService<A: AccountRepository, J: JobRepository, I: InvoiceRepository> {
    accounts: A,
    jobs: J,
    invoices: I,
    pricing: PriceCalculator,
    vat_rate: Decimal,
    payment_tolerance: Decimal,
}

impl<A: AccountRepository, J: JobRepository, I: InvoiceRepository> InvoiceService<A, J, I> {
    pub fn new(accounts: A, jobs: J, invoices: I, config: &ServiceConfig) -> Self {
        Self {
            accounts,
            jobs,
            invoices,
            pricing: PriceCalculator::new(config.price_table.clone()),
            vat_rate: config.vat_rate,
            payment_tolerance: config.payment_tolerance,
        }
    }

    /// Issue an invoice for a list of a shop's jobs.
    ///
    /// Only completed or shipped jobs are billable, each on a single
    /// invoice. Lines carry the price frozen when the job was completed,
    /// so no job is written here.
    pub async fn create_invoice(
        &self,
        actor: &Account,
        input: IssueInvoice,
    ) -> MontageResult<Invoice> {
        require_admin(actor, "issue invoices")?;

        // 1. Resolve the shop being billed.
        let shop = lookup_shop(&self.accounts, input.owner_account_id).await?;

        if input.job_ids.is_empty() {
            return Err(MontageError::validation(
                "an invoice needs at least one job",
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = input.job_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(MontageError::validation(format!(
                "job {dup} is listed twice"
            )));
        }

        // 2. Load every job and check it can be billed.
        let mut lines = Vec::with_capacity(input.job_ids.len());
        for job_id in &input.job_ids {
            let job = self.jobs.get_by_id(*job_id).await?;
            if job.owner_account_id != shop.id {
                return Err(MontageError::validation(format!(
                    "job {job_id} does not belong to shop {}",
                    shop.id
                )));
            }
            if !workflow::freezes_price(job.status) {
                return Err(MontageError::validation(format!(
                    "job {} cannot be invoiced at status {}",
                    job.reference, job.status
                )));
            }
            if let Some(number) = self.invoices.number_billing_job(job.id).await? {
                return Err(MontageError::validation(format!(
                    "job {} is already billed on invoice {number}",
                    job.reference
                )));
            }
            // Jobs completed before snapshots existed bill at today's price.
            let price = match job.price_snapshot {
                Some(price) => price,
                None => self.pricing.compute(&job.options, shop.pricing_tier),
            };
            lines.push(billable_line(job, price));
        }

        // 3. Build totals and persist.
        let header = InvoiceHeader {
            owner_account_id: shop.id,
            invoice_number: input.invoice_number.trim().to_string(),
            emission_date: input
                .emission_date
                .unwrap_or_else(|| Utc::now().date_naive()),
        };
        let draft = ledger::build_invoice(header, lines, self.vat_rate)?;
        // A taken number surfaces as a conflict from the unique index.
        let invoice = self.invoices.create(draft).await?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            actor = %actor.id,
            total_incl_tax = %invoice.total_incl_tax,
            lines = invoice.line_items.len(),
            "Invoice issued"
        );
        Ok(invoice)
    }

    /// Set the amount paid on an invoice. Administrators only.
    pub async fn record_payment(
        &self,
        actor: &Account,
        id: Uuid,
        amount_paid: Decimal,
    ) -> MontageResult<Invoice> {
        require_admin(actor, "record payments")?;

        let mut invoice = self.invoices.get_by_id(id).await?;
        let previous = invoice.amount_paid;
        ledger::record_payment(&mut invoice, amount_paid, self.payment_tolerance)?;

        let invoice = self.invoices.save_payment(&invoice).await?;
        info!(
            invoice_id = %invoice.id,
            actor = %actor.id,
            previous = %previous,
            amount_paid = %invoice.amount_paid,
            status = %invoice.payment_status,
            "Payment recorded"
        );
        Ok(invoice)
    }

    pub async fn get_invoice(&self, actor: &Account, id: Uuid) -> MontageResult<Invoice> {
        let invoice = self.invoices.get_by_id(id).await?;
        access::ensure_visible(actor, invoice.owner_account_id)?;
        Ok(invoice)
    }

    pub async fn get_invoice_by_number(
        &self,
        actor: &Account,
        invoice_number: &str,
    ) -> MontageResult<Invoice> {
        let invoice = self.invoices.get_by_number(invoice_number).await?;
        access::ensure_visible(actor, invoice.owner_account_id)?;
        Ok(invoice)
    }

    pub async fn list_invoices(
        &self,
        actor: &Account,
        pagination: Pagination,
    ) -> MontageResult<PaginatedResult<Invoice>> {
        let scope = access::visible_owners(actor);
        self.invoices.list(&scope, pagination).await
    }

    pub async fn delete_invoice(&self, actor: &Account, id: Uuid) -> MontageResult<()> {
        require_admin(actor, "delete invoices")?;
        self.invoices.delete(id).await?;
        info!(invoice_id = %id, actor = %actor.id, "Invoice deleted by request");
        Ok(())
    }
}

/// Line item for a job: frame description first, then its options.
fn billable_line(job: Job, price_excl_tax: Decimal) -> BillableLine {
    let Job {
        id,
        reference,
        frame_description,
        options,
        ..
    } = job;
    let mut description_lines = Vec::new();
    if !frame_description.trim().is_empty() {
        description_lines.push(frame_description);
    }
    description_lines.extend(options.describe());
    BillableLine {
        job_id: id,
        job_reference: reference,
        description_lines,
        price_excl_tax,
    }
}
