//! Job (finishing order) domain model.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::Role;
use crate::error::{MontageError, MontageResult};

/// Production status of a job. Variants are declared in workflow order,
/// so the derived `Ord` is the forward progression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobStatus {
    Pending,
    Received,
    InProgress,
    Completed,
    Shipped,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Received,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Shipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Received => "Received",
            JobStatus::InProgress => "InProgress",
            JobStatus::Completed => "Completed",
            JobStatus::Shipped => "Shipped",
        }
    }

    /// Human-readable label used in shop notifications.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Received => "received",
            JobStatus::InProgress => "in progress",
            JobStatus::Completed => "completed",
            JobStatus::Shipped => "shipped",
        }
    }

    /// `Pending` and `Received`: the job has not entered production yet.
    pub fn is_early(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Received)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = MontageError;

    fn from_str(s: &str) -> MontageResult<Self> {
        let variants = JobStatus::ALL.map(|status| (status.as_str(), status));
        super::parse_label("job status", s, &variants)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Rimmed,
    Drilled,
    HalfRim,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Rimmed => "Rimmed",
            Category::Drilled => "Drilled",
            Category::HalfRim => "HalfRim",
        }
    }
}

impl FromStr for Category {
    type Err = MontageError;

    fn from_str(s: &str) -> MontageResult<Self> {
        super::parse_label(
            "category",
            s,
            &[
                ("Rimmed", Category::Rimmed),
                ("Drilled", Category::Drilled),
                ("HalfRim", Category::HalfRim),
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GlassOption {
    FourSeason,
    Gradient,
    StockLens,
}

impl GlassOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlassOption::FourSeason => "FourSeason",
            GlassOption::Gradient => "Gradient",
            GlassOption::StockLens => "StockLens",
        }
    }
}

impl FromStr for GlassOption {
    type Err = MontageError;

    fn from_str(s: &str) -> MontageResult<Self> {
        super::parse_label(
            "glass option",
            s,
            &[
                ("FourSeason", GlassOption::FourSeason),
                ("Gradient", GlassOption::Gradient),
                ("StockLens", GlassOption::StockLens),
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Urgency {
    #[default]
    Standard,
    Urgent48h,
    Urgent24h,
    Urgent3h,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Standard => "Standard",
            Urgency::Urgent48h => "Urgent48h",
            Urgency::Urgent24h => "Urgent24h",
            Urgency::Urgent3h => "Urgent3h",
        }
    }
}

impl FromStr for Urgency {
    type Err = MontageError;

    fn from_str(s: &str) -> MontageResult<Self> {
        super::parse_label(
            "urgency",
            s,
            &[
                ("Standard", Urgency::Standard),
                ("Urgent48h", Urgency::Urgent48h),
                ("Urgent24h", Urgency::Urgent24h),
                ("Urgent3h", Urgency::Urgent3h),
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum DiamondCut {
    #[default]
    Standard,
    SmoothFacet,
    DiamondIce,
    TwinkleFacet,
}

impl DiamondCut {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiamondCut::Standard => "Standard",
            DiamondCut::SmoothFacet => "SmoothFacet",
            DiamondCut::DiamondIce => "DiamondIce",
            DiamondCut::TwinkleFacet => "TwinkleFacet",
        }
    }
}

impl FromStr for DiamondCut {
    type Err = MontageError;

    fn from_str(s: &str) -> MontageResult<Self> {
        super::parse_label(
            "diamond cut",
            s,
            &[
                ("Standard", DiamondCut::Standard),
                ("SmoothFacet", DiamondCut::SmoothFacet),
                ("DiamondIce", DiamondCut::DiamondIce),
                ("TwinkleFacet", DiamondCut::TwinkleFacet),
            ],
        )
    }
}

pub const MAX_ENGRAVINGS: u8 = 2;

/// The priced configuration of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinishingOptions {
    pub category: Category,
    /// A set: the same option listed twice is priced once.
    pub glass_options: BTreeSet<GlassOption>,
    pub urgency: Urgency,
    pub diamond_cut: DiamondCut,
    pub engraving_count: u8,
    pub shape_change: bool,
}

impl FinishingOptions {
    /// Plain options for a category: no glass treatment, standard
    /// urgency and cut, no engraving, no shape change.
    pub fn basic(category: Category) -> Self {
        Self {
            category,
            glass_options: BTreeSet::new(),
            urgency: Urgency::Standard,
            diamond_cut: DiamondCut::Standard,
            engraving_count: 0,
            shape_change: false,
        }
    }

    pub fn validate(&self) -> MontageResult<()> {
        if self.engraving_count > MAX_ENGRAVINGS {
            return Err(MontageError::validation(format!(
                "engraving count must be between 0 and {MAX_ENGRAVINGS}, got {}",
                self.engraving_count
            )));
        }
        Ok(())
    }

    /// Description lines printed under an invoice line item.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![format!("Category: {}", self.category.as_str())];
        if self.diamond_cut != DiamondCut::Standard {
            lines.push(format!("Diamond cut: {}", self.diamond_cut.as_str()));
        }
        if self.engraving_count > 0 {
            lines.push(format!("Engravings: {}", self.engraving_count));
        }
        for option in &self.glass_options {
            lines.push(format!("Glass: {}", option.as_str()));
        }
        if self.shape_change {
            lines.push("Shape change".to_string());
        }
        if self.urgency != Urgency::Standard {
            lines.push(format!("Urgency: {}", self.urgency.as_str()));
        }
        lines
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Always a client (shop) account.
    pub owner_account_id: Uuid,
    /// Shop-assigned reference; not unique.
    pub reference: String,
    pub frame_description: String,
    pub options: FinishingOptions,
    pub status: JobStatus,
    /// Audit trail only; never used for access decisions.
    pub created_by_role: Role,
    /// Opaque reference to the photo held by the photo store.
    pub photo_ref: Option<String>,
    /// Full-precision price frozen when the job first reached `Completed`.
    pub price_snapshot: Option<Decimal>,
    /// Optimistic lock counter, incremented on every write.
    pub version: u64,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to persist a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub owner_account_id: Uuid,
    pub reference: String,
    pub frame_description: String,
    pub options: FinishingOptions,
    pub created_by_role: Role,
    pub photo_ref: Option<String>,
}

/// A job submission as received from a shop or a manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Required for managers and administrators; a client may omit it or
    /// name itself.
    pub owner_account_id: Option<Uuid>,
    pub reference: String,
    pub frame_description: String,
    pub options: FinishingOptions,
    pub photo_ref: Option<String>,
}

/// Fields that can be edited on an existing job.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateJob {
    pub reference: Option<String>,
    pub frame_description: Option<String>,
    pub category: Option<Category>,
    pub glass_options: Option<BTreeSet<GlassOption>>,
    pub urgency: Option<Urgency>,
    pub diamond_cut: Option<DiamondCut>,
    pub engraving_count: Option<u8>,
    pub shape_change: Option<bool>,
    /// `Some(Some(ref))` = set, `Some(None)` = clear, `None` = no change.
    pub photo_ref: Option<Option<String>>,
}

impl UpdateJob {
    /// Apply the edit onto a copy of the job's fields. Status, owner and
    /// price snapshot are never touched here.
    pub fn apply_to(self, job: &mut Job) {
        if let Some(reference) = self.reference {
            job.reference = reference;
        }
        if let Some(frame_description) = self.frame_description {
            job.frame_description = frame_description;
        }
        if let Some(category) = self.category {
            job.options.category = category;
        }
        if let Some(glass_options) = self.glass_options {
            job.options.glass_options = glass_options;
        }
        if let Some(urgency) = self.urgency {
            job.options.urgency = urgency;
        }
        if let Some(diamond_cut) = self.diamond_cut {
            job.options.diamond_cut = diamond_cut;
        }
        if let Some(engraving_count) = self.engraving_count {
            job.options.engraving_count = engraving_count;
        }
        if let Some(shape_change) = self.shape_change {
            job.options.shape_change = shape_change;
        }
        if let Some(photo_ref) = self.photo_ref {
            job.photo_ref = photo_ref;
        }
    }
}

/// Optional list filters on top of owner scoping.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
}

/// A job together with its display price.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job: Job,
    /// Full precision; round with [`crate::pricing::round_money`] for display.
    pub price: Decimal,
}
