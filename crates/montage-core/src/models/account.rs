//! Account domain model.
//!
//! An account is a shop (client), a regional manager supervising a set of
//! shops, or a workshop administrator. Accounts are never deleted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MontageError, MontageResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::Manager => "Manager",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MontageError;

    fn from_str(s: &str) -> MontageResult<Self> {
        super::parse_label(
            "role",
            s,
            &[
                ("Client", Role::Client),
                ("Manager", Role::Manager),
                ("Admin", Role::Admin),
            ],
        )
    }
}

/// Pricing category of a shop. Tier 2 is the preferential (volume) rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum PricingTier {
    #[default]
    Standard,
    Preferential,
}

impl PricingTier {
    pub fn as_u8(self) -> u8 {
        match self {
            PricingTier::Standard => 1,
            PricingTier::Preferential => 2,
        }
    }
}

impl TryFrom<u8> for PricingTier {
    type Error = MontageError;

    fn try_from(value: u8) -> MontageResult<Self> {
        match value {
            1 => Ok(PricingTier::Standard),
            2 => Ok(PricingTier::Preferential),
            other => Err(MontageError::validation(format!(
                "pricing tier must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<PricingTier> for u8 {
    fn from(tier: PricingTier) -> Self {
        tier.as_u8()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub pricing_tier: PricingTier,
    /// Shops supervised by a manager, in assignment order. Empty for
    /// clients and administrators.
    pub assigned_shop_ids: Vec<Uuid>,
    /// Owned by the credential layer; carried for completeness.
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub pricing_tier: PricingTier,
    pub assigned_shop_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAccount {
    pub name: Option<String>,
    pub email: Option<String>,
    pub pricing_tier: Option<PricingTier>,
    pub assigned_shop_ids: Option<Vec<Uuid>>,
    pub is_verified: Option<bool>,
}
