//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Job and invoice writes are
//! optimistic: `update`/`save_payment` only succeed when the stored
//! `version` still equals the one carried by the record, and fail with
//! [`MontageError::Conflict`](crate::error::MontageError::Conflict)
//! otherwise.

use uuid::Uuid;

use crate::access::VisibleOwners;
use crate::error::MontageResult;
use crate::models::{
    account::{Account, CreateAccount, UpdateAccount},
    invoice::{CreateInvoice, Invoice},
    job::{CreateJob, Job, JobFilter},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    pub fn empty(pagination: &Pagination) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            offset: pagination.offset,
            limit: pagination.limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Account directory
// ---------------------------------------------------------------------------

pub trait AccountRepository: Send + Sync {
    fn create(&self, input: CreateAccount) -> impl Future<Output = MontageResult<Account>> + Send;
    /// Fails with `NotFound` for unknown ids.
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MontageResult<Account>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateAccount,
    ) -> impl Future<Output = MontageResult<Account>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = MontageResult<PaginatedResult<Account>>> + Send;
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

pub trait JobRepository: Send + Sync {
    fn create(&self, input: CreateJob) -> impl Future<Output = MontageResult<Job>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MontageResult<Job>> + Send;
    /// Persist every mutable field of `job` if its version is current.
    /// Returns the stored job with the incremented version.
    fn update(&self, job: &Job) -> impl Future<Output = MontageResult<Job>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = MontageResult<()>> + Send;
    /// Jobs whose owner is within `owners`, newest first.
    fn list(
        &self,
        owners: &VisibleOwners,
        filter: JobFilter,
        pagination: Pagination,
    ) -> impl Future<Output = MontageResult<PaginatedResult<Job>>> + Send;
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

pub trait InvoiceRepository: Send + Sync {
    /// Fails with `Conflict` when the invoice number is already taken.
    fn create(&self, input: CreateInvoice) -> impl Future<Output = MontageResult<Invoice>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MontageResult<Invoice>> + Send;
    fn get_by_number(
        &self,
        invoice_number: &str,
    ) -> impl Future<Output = MontageResult<Invoice>> + Send;
    /// Number of the invoice that already bills `job_id`, if any.
    fn number_billing_job(
        &self,
        job_id: Uuid,
    ) -> impl Future<Output = MontageResult<Option<String>>> + Send;
    /// Persist `amount_paid` and `payment_status` if the version is current.
    fn save_payment(&self, invoice: &Invoice) -> impl Future<Output = MontageResult<Invoice>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = MontageResult<()>> + Send;
    /// Invoices whose owner is within `owners`, by emission date, newest first.
    fn list(
        &self,
        owners: &VisibleOwners,
        pagination: Pagination,
    ) -> impl Future<Output = MontageResult<PaginatedResult<Invoice>>> + Send;
}
