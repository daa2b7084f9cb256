//! Integration tests for the job orchestrator using in-memory SurrealDB.

use std::collections::BTreeSet;
use std::time::Duration;

use montage_core::error::MontageError;
use montage_core::models::account::{Account, CreateAccount, PricingTier, Role};
use montage_core::models::job::{
    Category, FinishingOptions, GlassOption, JobFilter, JobStatus, NewJob, UpdateJob, Urgency,
};
use montage_core::pricing::PriceTable;
use montage_core::repository::{AccountRepository, Pagination};
use montage_db::repository::{SurrealAccountRepository, SurrealJobRepository};
use montage_service::{JobService, Notifier, NotifyError, ServiceConfig};
use rust_decimal::Decimal;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tokio::sync::mpsc;
use uuid::Uuid;

type Notification = (Uuid, String, String);

/// Forwards every notification to the test over a channel.
struct RecordingNotifier(mpsc::UnboundedSender<Notification>);

impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        account_id: Uuid,
        status_label: &str,
        job_reference: &str,
    ) -> Result<(), NotifyError> {
        self.0
            .send((account_id, status_label.into(), job_reference.into()))
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

struct FailingNotifier;

impl Notifier for FailingNotifier {
    async fn notify(&self, account_id: Uuid, _: &str, _: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Unreachable(account_id.to_string()))
    }
}

type Service<N> = JobService<SurrealAccountRepository<Db>, SurrealJobRepository<Db>, N>;

struct Harness {
    accounts: SurrealAccountRepository<Db>,
    service: Service<RecordingNotifier>,
    notifications: mpsc::UnboundedReceiver<Notification>,
}

async fn connect() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    montage_db::run_migrations(&db).await.unwrap();
    db
}

async fn setup() -> Harness {
    let db = connect().await;
    let accounts = SurrealAccountRepository::new(db.clone());
    let (tx, rx) = mpsc::unbounded_channel();
    let service = JobService::new(
        SurrealAccountRepository::new(db.clone()),
        SurrealJobRepository::new(db),
        RecordingNotifier(tx),
        &ServiceConfig::default(),
    );
    Harness {
        accounts,
        service,
        notifications: rx,
    }
}

async fn create_account(
    accounts: &SurrealAccountRepository<Db>,
    role: Role,
    pricing_tier: PricingTier,
    assigned_shop_ids: Vec<Uuid>,
) -> Account {
    accounts
        .create(CreateAccount {
            name: format!("{role} account"),
            email: format!("{}@example.com", Uuid::new_v4()),
            role,
            pricing_tier,
            assigned_shop_ids,
        })
        .await
        .unwrap()
}

impl Harness {
    async fn shop(&self, tier: PricingTier) -> Account {
        create_account(&self.accounts, Role::Client, tier, Vec::new()).await
    }

    async fn manager_of(&self, shops: &[Uuid]) -> Account {
        create_account(
            &self.accounts,
            Role::Manager,
            PricingTier::Standard,
            shops.to_vec(),
        )
        .await
    }

    async fn admin(&self) -> Account {
        create_account(&self.accounts, Role::Admin, PricingTier::Standard, Vec::new()).await
    }

    async fn next_notification(&mut self) -> Notification {
        tokio::time::timeout(Duration::from_secs(2), self.notifications.recv())
            .await
            .expect("no notification dispatched")
            .expect("notification channel closed")
    }

    async fn assert_no_notification(&mut self) {
        let pending =
            tokio::time::timeout(Duration::from_millis(100), self.notifications.recv()).await;
        assert!(pending.is_err(), "unexpected notification: {pending:?}");
    }
}

fn new_job(owner: Option<Uuid>, reference: &str, options: FinishingOptions) -> NewJob {
    NewJob {
        owner_account_id: owner,
        reference: reference.into(),
        frame_description: "Acetate full rim, tortoise".into(),
        options,
        photo_ref: None,
    }
}

fn eur(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[tokio::test]
async fn shop_job_is_completed_by_its_manager() {
    let mut h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let manager = h.manager_of(&[shop.id]).await;

    // Plain rimmed job costs exactly the category base.
    let created = h
        .service
        .create_job(&shop, new_job(None, "CMD-100", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap();
    assert_eq!(created.job.owner_account_id, shop.id);
    assert_eq!(created.job.status, JobStatus::Pending);
    assert_eq!(created.job.created_by_role, Role::Client);
    assert_eq!(created.price, PriceTable::default().category.rimmed.standard);

    // The shop cannot move its own job.
    let err = h
        .service
        .transition(&shop, created.job.id, JobStatus::Received)
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Forbidden { .. }));

    // The manager skips straight to Completed.
    let completed = h
        .service
        .transition(&manager, created.job.id, JobStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.job.status, JobStatus::Completed);
    assert_eq!(completed.job.version, created.job.version + 1);

    let (recipient, label, reference) = h.next_notification().await;
    assert_eq!(recipient, shop.id);
    assert_eq!(label, "completed");
    assert_eq!(reference, "CMD-100");
    h.assert_no_notification().await;
}

#[tokio::test]
async fn resubmitting_the_current_status_changes_nothing() {
    let mut h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let admin = h.admin().await;
    let job = h
        .service
        .create_job(&shop, new_job(None, "CMD-101", FinishingOptions::basic(Category::Drilled)))
        .await
        .unwrap()
        .job;

    let received = h
        .service
        .transition(&admin, job.id, JobStatus::Received)
        .await
        .unwrap();
    h.next_notification().await;

    let again = h
        .service
        .transition(&admin, job.id, JobStatus::Received)
        .await
        .unwrap();
    assert_eq!(again.job.version, received.job.version);
    h.assert_no_notification().await;
}

#[tokio::test]
async fn backward_moves_fail() {
    let mut h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let admin = h.admin().await;
    let job = h
        .service
        .create_job(&shop, new_job(None, "CMD-102", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap()
        .job;

    h.service
        .transition(&admin, job.id, JobStatus::Shipped)
        .await
        .unwrap();
    h.next_notification().await;

    let err = h
        .service
        .transition(&admin, job.id, JobStatus::InProgress)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MontageError::InvalidTransition {
            from: JobStatus::Shipped,
            to: JobStatus::InProgress,
        }
    ));
    h.assert_no_notification().await;
}

#[tokio::test]
async fn notifier_failure_does_not_fail_the_transition() {
    let db = connect().await;
    let accounts = SurrealAccountRepository::new(db.clone());
    let service: Service<FailingNotifier> = JobService::new(
        SurrealAccountRepository::new(db.clone()),
        SurrealJobRepository::new(db),
        FailingNotifier,
        &ServiceConfig::default(),
    );
    let shop = create_account(&accounts, Role::Client, PricingTier::Standard, Vec::new()).await;
    let admin = create_account(&accounts, Role::Admin, PricingTier::Standard, Vec::new()).await;

    let job = service
        .create_job(&shop, new_job(None, "CMD-103", FinishingOptions::basic(Category::HalfRim)))
        .await
        .unwrap()
        .job;
    let moved = service
        .transition(&admin, job.id, JobStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(moved.job.status, JobStatus::InProgress);

    let stored = service.get_job(&admin, job.id).await.unwrap();
    assert_eq!(stored.job.status, JobStatus::InProgress);
}

#[tokio::test]
async fn managers_create_only_for_assigned_shops() {
    let h = setup().await;
    let assigned = h.shop(PricingTier::Standard).await;
    let other = h.shop(PricingTier::Standard).await;
    let manager = h.manager_of(&[assigned.id]).await;
    let options = FinishingOptions::basic(Category::Rimmed);

    let created = h
        .service
        .create_job(&manager, new_job(Some(assigned.id), "CMD-200", options.clone()))
        .await
        .unwrap();
    assert_eq!(created.job.owner_account_id, assigned.id);
    assert_eq!(created.job.created_by_role, Role::Manager);

    let err = h
        .service
        .create_job(&manager, new_job(Some(other.id), "CMD-201", options.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Forbidden { .. }));

    let err = h
        .service
        .create_job(&manager, new_job(None, "CMD-202", options))
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation { .. }));
}

#[tokio::test]
async fn shops_create_only_for_themselves() {
    let h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let other = h.shop(PricingTier::Standard).await;
    let options = FinishingOptions::basic(Category::Rimmed);

    let own = h
        .service
        .create_job(&shop, new_job(Some(shop.id), "CMD-210", options.clone()))
        .await
        .unwrap();
    assert_eq!(own.job.owner_account_id, shop.id);

    let err = h
        .service
        .create_job(&shop, new_job(Some(other.id), "CMD-211", options))
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Forbidden { .. }));
}

#[tokio::test]
async fn owners_must_be_known_shops() {
    let h = setup().await;
    let admin = h.admin().await;
    let manager = h.manager_of(&[]).await;
    let options = FinishingOptions::basic(Category::Rimmed);

    let err = h
        .service
        .create_job(&admin, new_job(Some(Uuid::new_v4()), "CMD-220", options.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation { .. }));

    let err = h
        .service
        .create_job(&admin, new_job(Some(manager.id), "CMD-221", options))
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation { .. }));
}

#[tokio::test]
async fn malformed_jobs_are_rejected() {
    let h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;

    let mut options = FinishingOptions::basic(Category::Rimmed);
    options.engraving_count = 3;
    let err = h
        .service
        .create_job(&shop, new_job(None, "CMD-230", options))
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation { .. }));

    let err = h
        .service
        .create_job(&shop, new_job(None, "  ", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation { .. }));
}

#[tokio::test]
async fn prices_follow_the_owner_tier() {
    let h = setup().await;
    let preferred = h.shop(PricingTier::Preferential).await;
    let admin = h.admin().await;

    let plain = h
        .service
        .create_job(&preferred, new_job(None, "CMD-300", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap();
    assert_eq!(plain.price, eur(1000));

    // (12.00 + 5.00 + 9.00) * 1.30 for a standard shop.
    let standard = h.shop(PricingTier::Standard).await;
    let options = FinishingOptions {
        glass_options: BTreeSet::from([GlassOption::Gradient]),
        urgency: Urgency::Urgent24h,
        engraving_count: 1,
        ..FinishingOptions::basic(Category::Rimmed)
    };
    let rushed = h
        .service
        .create_job(&admin, new_job(Some(standard.id), "CMD-301", options))
        .await
        .unwrap();
    assert_eq!(rushed.price, eur(3380));

    let fetched = h.service.get_job(&standard, rushed.job.id).await.unwrap();
    assert_eq!(fetched.price, rushed.price);
}

#[tokio::test]
async fn completion_freezes_the_price() {
    let mut h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let manager = h.manager_of(&[shop.id]).await;

    let job = h
        .service
        .create_job(&shop, new_job(None, "CMD-310", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap()
        .job;
    assert!(job.price_snapshot.is_none());

    let in_progress = h
        .service
        .transition(&manager, job.id, JobStatus::InProgress)
        .await
        .unwrap();
    assert!(in_progress.job.price_snapshot.is_none());

    let completed = h
        .service
        .transition(&manager, job.id, JobStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.job.price_snapshot, Some(eur(1200)));
    h.next_notification().await;
    h.next_notification().await;

    // Managers may still correct the job; the price does not move.
    let edited = h
        .service
        .edit_job(
            &manager,
            job.id,
            UpdateJob {
                engraving_count: Some(2),
                shape_change: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.job.options.engraving_count, 2);
    assert_eq!(edited.job.price_snapshot, Some(eur(1200)));
    assert_eq!(edited.price, eur(1200));

    let shipped = h
        .service
        .transition(&manager, job.id, JobStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(shipped.price, eur(1200));
}

#[tokio::test]
async fn edit_rights_depend_on_role_and_status() {
    let h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let admin = h.admin().await;

    let job = h
        .service
        .create_job(&shop, new_job(None, "CMD-400", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap()
        .job;

    let edited = h
        .service
        .edit_job(
            &shop,
            job.id,
            UpdateJob {
                category: Some(Category::Drilled),
                photo_ref: Some(Some("photos/cmd-400.jpg".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.job.options.category, Category::Drilled);
    assert_eq!(edited.job.photo_ref.as_deref(), Some("photos/cmd-400.jpg"));
    assert_eq!(edited.price, eur(2200));

    h.service
        .transition(&admin, job.id, JobStatus::InProgress)
        .await
        .unwrap();

    let err = h
        .service
        .edit_job(
            &shop,
            job.id,
            UpdateJob {
                reference: Some("CMD-400b".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Forbidden { .. }));

    let err = h
        .service
        .edit_job(
            &admin,
            job.id,
            UpdateJob {
                engraving_count: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation { .. }));
}

#[tokio::test]
async fn managers_never_delete() {
    let h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let manager = h.manager_of(&[shop.id]).await;

    let job = h
        .service
        .create_job(&shop, new_job(None, "CMD-410", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap()
        .job;

    let err = h.service.delete_job(&manager, job.id).await.unwrap_err();
    assert!(matches!(err, MontageError::Forbidden { .. }));

    h.service.delete_job(&shop, job.id).await.unwrap();
    let err = h.service.get_job(&shop, job.id).await.unwrap_err();
    assert!(matches!(err, MontageError::NotFound { .. }));
}

#[tokio::test]
async fn jobs_in_production_cannot_be_deleted() {
    let h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let admin = h.admin().await;

    let early = h
        .service
        .create_job(&shop, new_job(None, "CMD-420", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap()
        .job;
    let late = h
        .service
        .create_job(&shop, new_job(None, "CMD-421", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap()
        .job;

    h.service
        .transition(&admin, early.id, JobStatus::Received)
        .await
        .unwrap();
    h.service
        .transition(&admin, late.id, JobStatus::InProgress)
        .await
        .unwrap();

    h.service.delete_job(&admin, early.id).await.unwrap();

    for actor in [&shop, &admin] {
        let err = h.service.delete_job(actor, late.id).await.unwrap_err();
        assert!(matches!(err, MontageError::Forbidden { .. }));
    }
}

#[tokio::test]
async fn listing_is_scoped_to_visible_owners() {
    let h = setup().await;
    let shop_a = h.shop(PricingTier::Standard).await;
    let shop_b = h.shop(PricingTier::Preferential).await;
    let manager = h.manager_of(&[shop_a.id]).await;
    let idle_manager = h.manager_of(&[]).await;
    let admin = h.admin().await;

    for (shop, reference) in [(&shop_a, "A-1"), (&shop_a, "A-2"), (&shop_b, "B-1")] {
        h.service
            .create_job(shop, new_job(None, reference, FinishingOptions::basic(Category::Rimmed)))
            .await
            .unwrap();
    }

    let page = h
        .service
        .list_jobs(&manager, JobFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|v| v.job.owner_account_id == shop_a.id));

    let page = h
        .service
        .list_jobs(&shop_b, JobFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].price, eur(1000));

    let page = h
        .service
        .list_jobs(&admin, JobFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 3);

    let page = h
        .service
        .list_jobs(&idle_manager, JobFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn listing_filters_by_status() {
    let h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let admin = h.admin().await;

    let first = h
        .service
        .create_job(&shop, new_job(None, "CMD-500", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap()
        .job;
    h.service
        .create_job(&shop, new_job(None, "CMD-501", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap();
    h.service
        .transition(&admin, first.id, JobStatus::Received)
        .await
        .unwrap();

    let page = h
        .service
        .list_jobs(
            &shop,
            JobFilter {
                status: Some(JobStatus::Received),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].job.id, first.id);
}

#[tokio::test]
async fn out_of_scope_jobs_are_forbidden() {
    let h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let stranger = h.shop(PricingTier::Standard).await;
    let unassigned = h.manager_of(&[stranger.id]).await;

    let job = h
        .service
        .create_job(&shop, new_job(None, "CMD-600", FinishingOptions::basic(Category::Rimmed)))
        .await
        .unwrap()
        .job;

    let err = h.service.get_job(&stranger, job.id).await.unwrap_err();
    assert!(matches!(err, MontageError::Forbidden { .. }));

    let err = h
        .service
        .transition(&unassigned, job.id, JobStatus::Received)
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Forbidden { .. }));

    let err = h.service.get_job(&shop, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, MontageError::NotFound { .. }));
}

#[tokio::test]
async fn shops_cannot_move_even_unknown_jobs() {
    let mut h = setup().await;
    let shop = h.shop(PricingTier::Standard).await;
    let admin = h.admin().await;

    let err = h
        .service
        .transition(&shop, Uuid::new_v4(), JobStatus::Received)
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Forbidden { .. }));

    let err = h
        .service
        .transition(&admin, Uuid::new_v4(), JobStatus::Received)
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::NotFound { .. }));
    h.assert_no_notification().await;
}
