//! Service configuration.

use montage_core::ledger::DEFAULT_PAYMENT_TOLERANCE;
use montage_core::pricing::PriceTable;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration shared by the job and invoice services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Workshop tariff used for every price computation.
    pub price_table: PriceTable,
    /// VAT applied to invoice totals (default: 0.20).
    pub vat_rate: Decimal,
    /// Shortfall under the tax-inclusive total still counted as paid
    /// (default: 0.10).
    pub payment_tolerance: Decimal,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            price_table: PriceTable::default(),
            vat_rate: Decimal::new(20, 2),
            payment_tolerance: DEFAULT_PAYMENT_TOLERANCE,
        }
    }
}
