//! SurrealDB implementation of [`AccountRepository`].

use chrono::{DateTime, Utc};
use montage_core::error::MontageResult;
use montage_core::models::account::{Account, CreateAccount, PricingTier, UpdateAccount};
use montage_core::repository::{AccountRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid, uuid_strings};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct AccountRow {
    name: String,
    email: String,
    role: String,
    pricing_tier: u32,
    assigned_shop_ids: Vec<String>,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AccountRowWithId {
    record_id: String,
    name: String,
    email: String,
    role: String,
    pricing_tier: u32,
    assigned_shop_ids: Vec<String>,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_tier(value: u32) -> Result<PricingTier, DbError> {
    u8::try_from(value)
        .ok()
        .and_then(|v| PricingTier::try_from(v).ok())
        .ok_or_else(|| DbError::Decode(format!("unknown pricing tier: {value}")))
}

impl AccountRow {
    fn into_account(self, id: Uuid) -> Result<Account, DbError> {
        let assigned_shop_ids = self
            .assigned_shop_ids
            .iter()
            .map(|s| parse_uuid("assigned shop", s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Account {
            id,
            name: self.name,
            email: self.email,
            role: parse_enum(&self.role)?,
            pricing_tier: parse_tier(self.pricing_tier)?,
            assigned_shop_ids,
            is_verified: self.is_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl AccountRowWithId {
    fn try_into_account(self) -> Result<Account, DbError> {
        let id = parse_uuid("account", &self.record_id)?;
        AccountRow {
            name: self.name,
            email: self.email,
            role: self.role,
            pricing_tier: self.pricing_tier,
            assigned_shop_ids: self.assigned_shop_ids,
            is_verified: self.is_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_account(id)
    }
}

/// SurrealDB implementation of the Account directory.
#[derive(Clone)]
pub struct SurrealAccountRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccountRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AccountRepository for SurrealAccountRepository<C> {
    async fn create(&self, input: CreateAccount) -> MontageResult<Account> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('account', $id) SET \
                 name = $name, email = $email, role = $role, \
                 pricing_tier = $pricing_tier, \
                 assigned_shop_ids = $assigned_shop_ids, \
                 is_verified = false",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("email", input.email))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("pricing_tier", u32::from(input.pricing_tier.as_u8())))
            .bind(("assigned_shop_ids", uuid_strings(&input.assigned_shop_ids)))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("account", e))?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "account".into(),
            id: id_str,
        })?;

        let account = row.into_account(id)?;
        info!(account_id = %account.id, role = %account.role, "Account created");
        Ok(account)
    }

    async fn get_by_id(&self, id: Uuid) -> MontageResult<Account> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('account', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "account".into(),
            id: id_str,
        })?;

        Ok(row.into_account(id)?)
    }

    async fn update(&self, id: Uuid, input: UpdateAccount) -> MontageResult<Account> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.pricing_tier.is_some() {
            sets.push("pricing_tier = $pricing_tier");
        }
        if input.assigned_shop_ids.is_some() {
            sets.push("assigned_shop_ids = $assigned_shop_ids");
        }
        if input.is_verified.is_some() {
            sets.push("is_verified = $is_verified");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('account', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(tier) = input.pricing_tier {
            builder = builder.bind(("pricing_tier", u32::from(tier.as_u8())));
        }
        if let Some(ref shops) = input.assigned_shop_ids {
            builder = builder.bind(("assigned_shop_ids", uuid_strings(shops)));
        }
        if let Some(is_verified) = input.is_verified {
            builder = builder.bind(("is_verified", is_verified));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("account", e))?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "account".into(),
            id: id_str,
        })?;

        Ok(row.into_account(id)?)
    }

    async fn list(&self, pagination: Pagination) -> MontageResult<PaginatedResult<Account>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM account GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM account \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_account())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
