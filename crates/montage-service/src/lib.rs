//! Montage Service: the orchestration layer of the workshop portal.
//!
//! Combines access scoping, the status machine and pricing from
//! `montage-core` over the repository traits, and dispatches status
//! notifications to shops.

pub mod account_service;
pub mod config;
pub mod error;
pub mod invoice_service;
pub mod job_service;
pub mod notify;

pub use account_service::AccountService;
pub use config::ServiceConfig;
pub use error::NotifyError;
pub use invoice_service::InvoiceService;
pub use job_service::JobService;
pub use notify::{LogNotifier, NotificationDispatcher, Notifier};
