//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs, dates and money amounts are stored as strings. Enums are stored
//! as strings with ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    /// Tables the migration defines or alters, for the log.
    tables: &'static [&'static str],
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "portal_tables",
    tables: &["account", "job", "invoice"],
    sql: SCHEMA_V1,
}];

/// Schema version before and after a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaVersion {
    pub previous: u32,
    pub current: u32,
}

impl SchemaVersion {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Highest migration version this build knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Accounts (shops, managers, administrators)
-- =======================================================================
DEFINE TABLE account SCHEMAFULL;
DEFINE FIELD name ON TABLE account TYPE string;
DEFINE FIELD email ON TABLE account TYPE string;
DEFINE FIELD role ON TABLE account TYPE string \
    ASSERT $value IN ['Client', 'Manager', 'Admin'];
DEFINE FIELD pricing_tier ON TABLE account TYPE int \
    ASSERT $value IN [1, 2];
DEFINE FIELD assigned_shop_ids ON TABLE account TYPE array<string> \
    DEFAULT [];
DEFINE FIELD is_verified ON TABLE account TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE account TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE account TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_account_email ON TABLE account \
    COLUMNS email UNIQUE;

-- =======================================================================
-- Jobs (owned by a shop account)
-- =======================================================================
DEFINE TABLE job SCHEMAFULL;
DEFINE FIELD owner_account_id ON TABLE job TYPE string;
DEFINE FIELD reference ON TABLE job TYPE string;
DEFINE FIELD frame_description ON TABLE job TYPE string;
DEFINE FIELD category ON TABLE job TYPE string \
    ASSERT $value IN ['Rimmed', 'Drilled', 'HalfRim'];
DEFINE FIELD glass_options ON TABLE job TYPE array<string> DEFAULT [];
DEFINE FIELD urgency ON TABLE job TYPE string \
    ASSERT $value IN ['Standard', 'Urgent48h', 'Urgent24h', 'Urgent3h'];
DEFINE FIELD diamond_cut ON TABLE job TYPE string \
    ASSERT $value IN ['Standard', 'SmoothFacet', 'DiamondIce', \
    'TwinkleFacet'];
DEFINE FIELD engraving_count ON TABLE job TYPE int \
    ASSERT $value >= 0 AND $value <= 2;
DEFINE FIELD shape_change ON TABLE job TYPE bool DEFAULT false;
DEFINE FIELD status ON TABLE job TYPE string \
    ASSERT $value IN ['Pending', 'Received', 'InProgress', 'Completed', \
    'Shipped'];
DEFINE FIELD created_by_role ON TABLE job TYPE string \
    ASSERT $value IN ['Client', 'Manager', 'Admin'];
DEFINE FIELD photo_ref ON TABLE job TYPE option<string>;
DEFINE FIELD price_snapshot ON TABLE job TYPE option<string>;
DEFINE FIELD version ON TABLE job TYPE int DEFAULT 1;
DEFINE FIELD received_at ON TABLE job TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE job TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_job_owner ON TABLE job COLUMNS owner_account_id;
DEFINE INDEX idx_job_owner_status ON TABLE job \
    COLUMNS owner_account_id, status;

-- =======================================================================
-- Invoices (owned by a shop account)
-- =======================================================================
DEFINE TABLE invoice SCHEMAFULL;
DEFINE FIELD owner_account_id ON TABLE invoice TYPE string;
DEFINE FIELD invoice_number ON TABLE invoice TYPE string;
DEFINE FIELD emission_date ON TABLE invoice TYPE string;
DEFINE FIELD line_items ON TABLE invoice TYPE array<object> DEFAULT [];
DEFINE FIELD line_items.*.job_id ON TABLE invoice TYPE string;
DEFINE FIELD line_items.*.job_reference ON TABLE invoice TYPE string;
DEFINE FIELD line_items.*.description_lines ON TABLE invoice \
    TYPE array<string>;
DEFINE FIELD line_items.*.unit_price_excl_tax ON TABLE invoice \
    TYPE string;
DEFINE FIELD total_excl_tax ON TABLE invoice TYPE string;
DEFINE FIELD total_incl_tax ON TABLE invoice TYPE string;
DEFINE FIELD amount_paid ON TABLE invoice TYPE string DEFAULT '0';
DEFINE FIELD payment_status ON TABLE invoice TYPE string \
    ASSERT $value IN ['Unpaid', 'PartiallyPaid', 'Paid'];
DEFINE FIELD version ON TABLE invoice TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE invoice TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE invoice TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_invoice_number ON TABLE invoice \
    COLUMNS invoice_number UNIQUE;
DEFINE INDEX idx_invoice_owner ON TABLE invoice \
    COLUMNS owner_account_id;
";

/// Bring the database up to [`latest_version`].
///
/// A database recorded at a newer version than this build knows is
/// refused rather than silently run against an unknown schema.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<SchemaVersion, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let previous = records.first().map(|m| m.version).unwrap_or(0);

    if previous > latest_version() {
        return Err(DbError::Migration(format!(
            "database is at schema v{previous}, this build only knows v{}",
            latest_version()
        )));
    }

    let mut current = previous;
    for migration in MIGRATIONS.iter().filter(|m| m.version > previous) {
        info!(
            version = migration.version,
            name = migration.name,
            tables = ?migration.tables,
            "Applying portal migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!("v{} '{}': {e}", migration.version, migration.name))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!("cannot record v{}: {e}", migration.version))
            })?;
        current = migration.version;
    }

    Ok(SchemaVersion { previous, current })
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
