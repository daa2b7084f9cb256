//! Montage Core: domain types and decision rules for the finishing
//! workshop portal.
//!
//! The modules here are transport- and storage-agnostic:
//! - [`pricing`] maps a job's finishing options and a shop's tier to an amount
//! - [`workflow`] validates job status transitions
//! - [`access`] resolves which shops an account may see and what it may mutate
//! - [`ledger`] builds invoices and derives their payment status
//!
//! Persistence is abstracted behind the traits in [`repository`].

pub mod access;
pub mod error;
pub mod ledger;
pub mod models;
pub mod pricing;
pub mod repository;
pub mod workflow;

#[cfg(test)]
mod fixtures;

pub use error::{MontageError, MontageResult};
