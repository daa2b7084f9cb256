//! Builders shared by unit tests.

use chrono::Utc;
use uuid::Uuid;

use crate::models::account::{Account, PricingTier, Role};
use crate::models::job::{Category, FinishingOptions, Job, JobStatus};

pub fn account(role: Role) -> Account {
    Account {
        id: Uuid::new_v4(),
        name: format!("{role} account"),
        email: "test@example.com".into(),
        role,
        pricing_tier: PricingTier::Standard,
        assigned_shop_ids: Vec::new(),
        is_verified: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn job_for(owner: Uuid, status: JobStatus) -> Job {
    Job {
        id: Uuid::new_v4(),
        owner_account_id: owner,
        reference: "REF-1".into(),
        frame_description: "acetate full rim".into(),
        options: FinishingOptions::basic(Category::Rimmed),
        status,
        created_by_role: Role::Client,
        photo_ref: None,
        price_snapshot: None,
        version: 1,
        received_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn job(status: JobStatus) -> Job {
    job_for(Uuid::new_v4(), status)
}
