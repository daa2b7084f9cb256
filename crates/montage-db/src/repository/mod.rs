//! SurrealDB repository implementations.

mod account;
mod invoice;
mod job;

pub use account::SurrealAccountRepository;
pub use invoice::SurrealInvoiceRepository;
pub use job::SurrealJobRepository;

use std::str::FromStr;

use montage_core::access::VisibleOwners;
use montage_core::error::MontageError;
use rust_decimal::Decimal;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(what: &str, s: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

fn parse_enum<T: FromStr<Err = MontageError>>(s: &str) -> Result<T, DbError> {
    s.parse().map_err(|e: MontageError| DbError::Decode(e.to_string()))
}

fn parse_money(what: &str, s: &str) -> Result<Decimal, DbError> {
    Decimal::from_str(s).map_err(|e| DbError::Decode(format!("invalid {what} amount {s:?}: {e}")))
}

fn uuid_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

/// `WHERE` fragment restricting `owner_account_id` to the visible owners,
/// with the value to bind as `$owners`. `None` means no restriction.
fn owner_clause(owners: &VisibleOwners) -> Option<(&'static str, Vec<String>)> {
    match owners {
        VisibleOwners::All => None,
        VisibleOwners::Only(ids) => Some((
            "owner_account_id IN $owners",
            ids.iter().map(Uuid::to_string).collect(),
        )),
    }
}
