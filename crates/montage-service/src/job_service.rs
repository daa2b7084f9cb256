//! Job orchestration: create, read, edit, delete and status transitions.
//!
//! Every operation resolves the acting account's scope first. Writes go
//! through the repository's version check, so two concurrent updates of
//! the same job cannot both succeed.

use std::collections::HashMap;

use montage_core::access;
use montage_core::error::{MontageError, MontageResult};
use montage_core::models::account::{Account, PricingTier, Role};
use montage_core::models::job::{CreateJob, Job, JobFilter, JobStatus, JobView, NewJob, UpdateJob};
use montage_core::pricing::PriceCalculator;
use montage_core::repository::{AccountRepository, JobRepository, PaginatedResult, Pagination};
use montage_core::workflow::{self, TransitionOutcome};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::account_service::lookup_shop;
use crate::config::ServiceConfig;
use crate::notify::{NotificationDispatcher, Notifier};

/// Job orchestrator.
///
/// Generic over repository and notifier implementations so that the
/// service layer has no dependency on the database crate.
pub struct JobService<A: AccountRepository, J: JobRepository, N: Notifier> {
    accounts: A,
    jobs: J,
    notifications: NotificationDispatcher<N>,
    pricing: PriceCalculator,
}

impl<A: AccountRepository, J: JobRepository, N: Notifier> JobService<A, J, N> {
    pub fn new(accounts: A, jobs: J, notifier: N, config: &ServiceConfig) -> Self {
        Self {
            accounts,
            jobs,
            notifications: NotificationDispatcher::new(notifier),
            pricing: PriceCalculator::new(config.price_table.clone()),
        }
    }

    /// Submit a new job on behalf of a shop.
    ///
    /// A client always submits for itself. Managers and administrators
    /// must name the owning shop; a manager only one of its own shops.
    pub async fn create_job(&self, actor: &Account, input: NewJob) -> MontageResult<JobView> {
        input.options.validate()?;
        if input.reference.trim().is_empty() {
            return Err(MontageError::validation("job reference must not be empty"));
        }

        let owner = self.resolve_owner(actor, input.owner_account_id).await?;

        let job = self
            .jobs
            .create(CreateJob {
                owner_account_id: owner.id,
                reference: input.reference,
                frame_description: input.frame_description,
                options: input.options,
                created_by_role: actor.role,
                photo_ref: input.photo_ref,
            })
            .await?;

        let price = self.pricing.compute(&job.options, owner.pricing_tier);
        Ok(JobView { job, price })
    }

    pub async fn get_job(&self, actor: &Account, id: Uuid) -> MontageResult<JobView> {
        let job = self.jobs.get_by_id(id).await?;
        access::ensure_visible(actor, job.owner_account_id)?;
        self.view(job).await
    }

    /// List the jobs within the actor's scope, newest first.
    pub async fn list_jobs(
        &self,
        actor: &Account,
        filter: JobFilter,
        pagination: Pagination,
    ) -> MontageResult<PaginatedResult<JobView>> {
        let scope = access::visible_owners(actor);
        debug!(actor = %actor.id, role = %actor.role, scope = ?scope, "Resolved job scope");
        let page = self.jobs.list(&scope, filter, pagination).await?;

        // Owner tiers are looked up once per page.
        let mut tiers: HashMap<Uuid, PricingTier> = HashMap::new();
        if actor.is_client() {
            tiers.insert(actor.id, actor.pricing_tier);
        }

        let mut items = Vec::with_capacity(page.items.len());
        for job in page.items {
            let price = match job.price_snapshot {
                Some(price) => price,
                None => {
                    let tier = match tiers.get(&job.owner_account_id) {
                        Some(tier) => *tier,
                        None => {
                            let owner = self.accounts.get_by_id(job.owner_account_id).await?;
                            tiers.insert(owner.id, owner.pricing_tier);
                            owner.pricing_tier
                        }
                    };
                    self.pricing.compute(&job.options, tier)
                }
            };
            items.push(JobView { job, price });
        }

        Ok(PaginatedResult {
            items,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    /// Apply field changes to a job.
    ///
    /// A frozen price stays frozen whatever fields change.
    pub async fn edit_job(
        &self,
        actor: &Account,
        id: Uuid,
        changes: UpdateJob,
    ) -> MontageResult<JobView> {
        let mut job = self.jobs.get_by_id(id).await?;
        access::ensure_visible(actor, job.owner_account_id)?;

        if !access::can_mutate(actor, &job).can_edit {
            warn!(job_id = %id, actor = %actor.id, status = %job.status, "Job edit denied");
            return Err(MontageError::forbidden(format!(
                "job {id} can no longer be edited at status {}",
                job.status
            )));
        }

        changes.apply_to(&mut job);
        job.options.validate()?;
        if job.reference.trim().is_empty() {
            return Err(MontageError::validation("job reference must not be empty"));
        }

        let job = self.jobs.update(&job).await?;
        info!(job_id = %job.id, actor = %actor.id, version = job.version, "Job edited");
        self.view(job).await
    }

    pub async fn delete_job(&self, actor: &Account, id: Uuid) -> MontageResult<()> {
        let job = self.jobs.get_by_id(id).await?;
        access::ensure_visible(actor, job.owner_account_id)?;

        if !access::can_mutate(actor, &job).can_delete {
            warn!(job_id = %id, actor = %actor.id, status = %job.status, "Job deletion denied");
            return Err(MontageError::forbidden(match actor.role {
                Role::Manager => "managers cannot delete jobs".to_string(),
                Role::Client | Role::Admin => format!(
                    "job {id} can no longer be deleted at status {}",
                    job.status
                ),
            }));
        }

        self.jobs.delete(id).await?;
        info!(job_id = %id, actor = %actor.id, "Job deleted by request");
        Ok(())
    }

    /// Move a job forward to `target`.
    ///
    /// Re-submitting the current status returns the job untouched and
    /// sends nothing. On a change, the price is frozen when the job first
    /// reaches a billable status, the job is saved, and then the owner is
    /// notified once. Notification delivery never fails the transition.
    pub async fn transition(
        &self,
        actor: &Account,
        id: Uuid,
        target: JobStatus,
    ) -> MontageResult<JobView> {
        // 1. Shops never move jobs, whether or not the job exists.
        if actor.is_client() {
            warn!(job_id = %id, actor = %actor.id, "Status change by a shop denied");
            return Err(MontageError::forbidden(
                "shops cannot change the status of a job",
            ));
        }

        // 2. Load and scope.
        let mut job = self.jobs.get_by_id(id).await?;
        access::ensure_visible(actor, job.owner_account_id)?;

        // 3. Check the move against the status machine.
        let (from, to) = match workflow::transition(&mut job, target, actor)? {
            TransitionOutcome::Unchanged => return self.view(job).await,
            TransitionOutcome::Advanced { from, to } => (from, to),
        };

        // 4. Freeze the price on first arrival at a billable status.
        if workflow::freezes_price(to) && job.price_snapshot.is_none() {
            job.price_snapshot = Some(self.current_price(&job).await?);
        }

        // 5. Persist; a concurrent write surfaces as a conflict.
        let job = self.jobs.update(&job).await?;
        info!(
            job_id = %job.id,
            actor = %actor.id,
            from = %from,
            to = %to,
            "Job status changed"
        );

        // 6. Notify the owning shop without waiting on delivery.
        self.notifications
            .dispatch(job.owner_account_id, to, job.reference.clone());

        self.view(job).await
    }

    /// Work out which shop a new job belongs to.
    async fn resolve_owner(
        &self,
        actor: &Account,
        requested: Option<Uuid>,
    ) -> MontageResult<Account> {
        match actor.role {
            Role::Client => match requested {
                None => Ok(actor.clone()),
                Some(owner) if owner == actor.id => Ok(actor.clone()),
                Some(owner) => Err(MontageError::forbidden(format!(
                    "shop {} cannot submit jobs for shop {owner}",
                    actor.id
                ))),
            },
            Role::Manager => {
                let owner = requested.ok_or_else(|| {
                    MontageError::validation("a manager must choose the shop that owns the job")
                })?;
                if !actor.assigned_shop_ids.contains(&owner) {
                    warn!(
                        manager = %actor.id,
                        shop = %owner,
                        "Job creation for unassigned shop denied"
                    );
                    return Err(MontageError::forbidden(format!(
                        "shop {owner} is not assigned to manager {}",
                        actor.id
                    )));
                }
                lookup_shop(&self.accounts, owner).await
            }
            Role::Admin => {
                let owner = requested.ok_or_else(|| {
                    MontageError::validation(
                        "an administrator must choose the shop that owns the job",
                    )
                })?;
                lookup_shop(&self.accounts, owner).await
            }
        }
    }

    /// Price from the owner's current tier, ignoring any snapshot.
    async fn current_price(&self, job: &Job) -> MontageResult<Decimal> {
        let owner = self.accounts.get_by_id(job.owner_account_id).await?;
        Ok(self.pricing.compute(&job.options, owner.pricing_tier))
    }

    async fn view(&self, job: Job) -> MontageResult<JobView> {
        let price = match job.price_snapshot {
            Some(price) => price,
            None => self.current_price(&job).await?,
        };
        Ok(JobView { job, price })
    }
}
