//! SurrealDB implementation of [`JobRepository`].
//!
//! Writes after creation are conditional on the stored `version`; a
//! mismatch surfaces as a conflict instead of silently overwriting a
//! concurrent update.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use montage_core::access::VisibleOwners;
use montage_core::error::{MontageError, MontageResult};
use montage_core::models::job::{
    CreateJob, FinishingOptions, GlassOption, Job, JobFilter, JobStatus,
};
use montage_core::repository::{JobRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CountRow, owner_clause, parse_enum, parse_money, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct JobRow {
    owner_account_id: String,
    reference: String,
    frame_description: String,
    category: String,
    glass_options: Vec<String>,
    urgency: String,
    diamond_cut: String,
    engraving_count: u32,
    shape_change: bool,
    status: String,
    created_by_role: String,
    photo_ref: Option<String>,
    price_snapshot: Option<String>,
    version: u64,
    received_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct JobRowWithId {
    record_id: String,
    owner_account_id: String,
    reference: String,
    frame_description: String,
    category: String,
    glass_options: Vec<String>,
    urgency: String,
    diamond_cut: String,
    engraving_count: u32,
    shape_change: bool,
    status: String,
    created_by_role: String,
    photo_ref: Option<String>,
    price_snapshot: Option<String>,
    version: u64,
    received_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self, id: Uuid) -> Result<Job, DbError> {
        let glass_options: BTreeSet<GlassOption> = self
            .glass_options
            .iter()
            .map(|s| parse_enum(s))
            .collect::<Result<_, _>>()?;
        let engraving_count = u8::try_from(self.engraving_count)
            .map_err(|_| DbError::Decode(format!("engraving count {}", self.engraving_count)))?;
        let price_snapshot = self
            .price_snapshot
            .as_deref()
            .map(|s| parse_money("price snapshot", s))
            .transpose()?;

        Ok(Job {
            id,
            owner_account_id: parse_uuid("owner", &self.owner_account_id)?,
            reference: self.reference,
            frame_description: self.frame_description,
            options: FinishingOptions {
                category: parse_enum(&self.category)?,
                glass_options,
                urgency: parse_enum(&self.urgency)?,
                diamond_cut: parse_enum(&self.diamond_cut)?,
                engraving_count,
                shape_change: self.shape_change,
            },
            status: parse_enum(&self.status)?,
            created_by_role: parse_enum(&self.created_by_role)?,
            photo_ref: self.photo_ref,
            price_snapshot,
            version: self.version,
            received_at: self.received_at,
            updated_at: self.updated_at,
        })
    }
}

impl JobRowWithId {
    fn try_into_job(self) -> Result<Job, DbError> {
        let id = parse_uuid("job", &self.record_id)?;
        JobRow {
            owner_account_id: self.owner_account_id,
            reference: self.reference,
            frame_description: self.frame_description,
            category: self.category,
            glass_options: self.glass_options,
            urgency: self.urgency,
            diamond_cut: self.diamond_cut,
            engraving_count: self.engraving_count,
            shape_change: self.shape_change,
            status: self.status,
            created_by_role: self.created_by_role,
            photo_ref: self.photo_ref,
            price_snapshot: self.price_snapshot,
            version: self.version,
            received_at: self.received_at,
            updated_at: self.updated_at,
        }
        .into_job(id)
    }
}

fn glass_strings(options: &FinishingOptions) -> Vec<String> {
    options
        .glass_options
        .iter()
        .map(|o| o.as_str().to_string())
        .collect()
}

/// SurrealDB implementation of the Job repository.
#[derive(Clone)]
pub struct SurrealJobRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealJobRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> JobRepository for SurrealJobRepository<C> {
    async fn create(&self, input: CreateJob) -> MontageResult<Job> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let options = &input.options;

        let result = self
            .db
            .query(
                "CREATE type::record('job', $id) SET \
                 owner_account_id = $owner_account_id, \
                 reference = $reference, \
                 frame_description = $frame_description, \
                 category = $category, glass_options = $glass_options, \
                 urgency = $urgency, diamond_cut = $diamond_cut, \
                 engraving_count = $engraving_count, \
                 shape_change = $shape_change, \
                 status = $status, created_by_role = $created_by_role, \
                 photo_ref = $photo_ref, price_snapshot = NONE, \
                 version = 1",
            )
            .bind(("id", id_str.clone()))
            .bind(("owner_account_id", input.owner_account_id.to_string()))
            .bind(("reference", input.reference))
            .bind(("frame_description", input.frame_description))
            .bind(("category", options.category.as_str().to_string()))
            .bind(("glass_options", glass_strings(options)))
            .bind(("urgency", options.urgency.as_str().to_string()))
            .bind(("diamond_cut", options.diamond_cut.as_str().to_string()))
            .bind(("engraving_count", u32::from(options.engraving_count)))
            .bind(("shape_change", options.shape_change))
            .bind(("status", JobStatus::Pending.as_str().to_string()))
            .bind(("created_by_role", input.created_by_role.as_str().to_string()))
            .bind(("photo_ref", input.photo_ref))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("job", e))?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "job".into(),
            id: id_str,
        })?;

        let job = row.into_job(id)?;
        info!(job_id = %job.id, owner = %job.owner_account_id, "Job created");
        Ok(job)
    }

    async fn get_by_id(&self, id: Uuid) -> MontageResult<Job> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('job', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "job".into(),
            id: id_str,
        })?;

        Ok(row.into_job(id)?)
    }

    async fn update(&self, job: &Job) -> MontageResult<Job> {
        let id_str = job.id.to_string();
        let options = &job.options;

        let result = self
            .db
            .query(
                "UPDATE type::record('job', $id) SET \
                 reference = $reference, \
                 frame_description = $frame_description, \
                 category = $category, glass_options = $glass_options, \
                 urgency = $urgency, diamond_cut = $diamond_cut, \
                 engraving_count = $engraving_count, \
                 shape_change = $shape_change, status = $status, \
                 photo_ref = $photo_ref, price_snapshot = $price_snapshot, \
                 version = version + 1, updated_at = time::now() \
                 WHERE version = $version",
            )
            .bind(("id", id_str.clone()))
            .bind(("reference", job.reference.clone()))
            .bind(("frame_description", job.frame_description.clone()))
            .bind(("category", options.category.as_str().to_string()))
            .bind(("glass_options", glass_strings(options)))
            .bind(("urgency", options.urgency.as_str().to_string()))
            .bind(("diamond_cut", options.diamond_cut.as_str().to_string()))
            .bind(("engraving_count", u32::from(options.engraving_count)))
            .bind(("shape_change", options.shape_change))
            .bind(("status", job.status.as_str().to_string()))
            .bind(("photo_ref", job.photo_ref.clone()))
            .bind(("price_snapshot", job.price_snapshot.map(|p| p.to_string())))
            .bind(("version", job.version))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("job", e))?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(row.into_job(job.id)?),
            None => {
                // Either the record is gone or its version moved on.
                self.get_by_id(job.id).await?;
                debug!(job_id = %job.id, version = job.version, "Stale job write rejected");
                Err(DbError::stale("job", &id_str, job.version).into())
            }
        }
    }

    async fn delete(&self, id: Uuid) -> MontageResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("DELETE type::record('job', $id) RETURN BEFORE")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(MontageError::NotFound {
                entity: "job".into(),
                id: id_str,
            });
        }

        info!(job_id = %id, "Job deleted");
        Ok(())
    }

    async fn list(
        &self,
        owners: &VisibleOwners,
        filter: JobFilter,
        pagination: Pagination,
    ) -> MontageResult<PaginatedResult<Job>> {
        if owners.is_empty() {
            return Ok(PaginatedResult::empty(&pagination));
        }

        let owner_filter = owner_clause(owners);
        let mut conditions = Vec::new();
        if let Some((clause, _)) = &owner_filter {
            conditions.push(*clause);
        }
        if filter.status.is_some() {
            conditions.push("status = $status");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT count() AS total FROM job{where_clause} GROUP ALL");
        let list_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM job{where_clause} \
             ORDER BY received_at DESC \
             LIMIT $limit START $offset"
        );

        let owner_ids = owner_filter.map(|(_, ids)| ids);
        let status = filter.status.map(|s| s.as_str().to_string());

        let mut count_builder = self.db.query(&count_query);
        if let Some(ids) = owner_ids.clone() {
            count_builder = count_builder.bind(("owners", ids));
        }
        if let Some(status) = status.clone() {
            count_builder = count_builder.bind(("status", status));
        }
        let mut count_result = count_builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut builder = self
            .db
            .query(&list_query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(ids) = owner_ids {
            builder = builder.bind(("owners", ids));
        }
        if let Some(status) = status {
            builder = builder.bind(("status", status));
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<JobRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_job())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
