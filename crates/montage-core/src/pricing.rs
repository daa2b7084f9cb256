//! Job pricing.
//!
//! A job's price is the sum of tier-dependent costs for its category,
//! diamond cut, engravings, glass options and shape change, plus an
//! urgency surcharge applied once to that whole subtotal.
//!
//! All intermediate sums keep full decimal precision. Rounding to cents
//! happens only through [`round_money`], at display or invoicing time.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::account::PricingTier;
use crate::models::job::{Category, DiamondCut, FinishingOptions, GlassOption, Urgency};

/// A cost cell with one value per pricing tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierRates {
    pub standard: Decimal,
    pub preferential: Decimal,
}

impl TierRates {
    pub const fn new(standard: Decimal, preferential: Decimal) -> Self {
        Self {
            standard,
            preferential,
        }
    }

    pub fn for_tier(&self, tier: PricingTier) -> Decimal {
        match tier {
            PricingTier::Standard => self.standard,
            PricingTier::Preferential => self.preferential,
        }
    }

    fn preferential_not_above_standard(&self) -> bool {
        self.preferential <= self.standard
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryCosts {
    pub rimmed: TierRates,
    pub drilled: TierRates,
    pub half_rim: TierRates,
}

/// Costs of the premium cuts. `DiamondCut::Standard` is free.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiamondCutCosts {
    pub smooth_facet: TierRates,
    pub diamond_ice: TierRates,
    pub twinkle_facet: TierRates,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlassCosts {
    pub four_season: TierRates,
    pub gradient: TierRates,
    pub stock_lens: TierRates,
}

/// Surcharge fractions per urgency level. `Urgency::Standard` has none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrgencyRates {
    pub urgent_48h: Decimal,
    pub urgent_24h: Decimal,
    pub urgent_3h: Decimal,
}

/// The workshop tariff. Immutable once handed to a [`PriceCalculator`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceTable {
    pub category: CategoryCosts,
    pub diamond_cut: DiamondCutCosts,
    pub engraving_unit: TierRates,
    pub glass: GlassCosts,
    pub shape_change: TierRates,
    pub urgency: UrgencyRates,
}

const fn eur(cents: i64) -> Decimal {
    Decimal::from_parts(cents as u32, 0, 0, false, 2)
}

const fn rates(standard_cents: i64, preferential_cents: i64) -> TierRates {
    TierRates::new(eur(standard_cents), eur(preferential_cents))
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            category: CategoryCosts {
                rimmed: rates(1200, 1000),
                drilled: rates(2200, 1800),
                half_rim: rates(1600, 1350),
            },
            diamond_cut: DiamondCutCosts {
                smooth_facet: rates(800, 650),
                diamond_ice: rates(1200, 1000),
                twinkle_facet: rates(1500, 1250),
            },
            engraving_unit: rates(500, 400),
            glass: GlassCosts {
                four_season: rates(600, 500),
                gradient: rates(900, 750),
                stock_lens: rates(400, 300),
            },
            shape_change: rates(700, 600),
            urgency: UrgencyRates {
                urgent_48h: eur(20),
                urgent_24h: eur(30),
                urgent_3h: eur(50),
            },
        }
    }
}

impl PriceTable {
    pub fn category_cost(&self, category: Category, tier: PricingTier) -> Decimal {
        match category {
            Category::Rimmed => self.category.rimmed.for_tier(tier),
            Category::Drilled => self.category.drilled.for_tier(tier),
            Category::HalfRim => self.category.half_rim.for_tier(tier),
        }
    }

    pub fn diamond_cut_cost(&self, cut: DiamondCut, tier: PricingTier) -> Decimal {
        match cut {
            DiamondCut::Standard => Decimal::ZERO,
            DiamondCut::SmoothFacet => self.diamond_cut.smooth_facet.for_tier(tier),
            DiamondCut::DiamondIce => self.diamond_cut.diamond_ice.for_tier(tier),
            DiamondCut::TwinkleFacet => self.diamond_cut.twinkle_facet.for_tier(tier),
        }
    }

    pub fn glass_cost(&self, option: GlassOption, tier: PricingTier) -> Decimal {
        match option {
            GlassOption::FourSeason => self.glass.four_season.for_tier(tier),
            GlassOption::Gradient => self.glass.gradient.for_tier(tier),
            GlassOption::StockLens => self.glass.stock_lens.for_tier(tier),
        }
    }

    pub fn urgency_rate(&self, urgency: Urgency) -> Decimal {
        match urgency {
            Urgency::Standard => Decimal::ZERO,
            Urgency::Urgent48h => self.urgency.urgent_48h,
            Urgency::Urgent24h => self.urgency.urgent_24h,
            Urgency::Urgent3h => self.urgency.urgent_3h,
        }
    }

    /// True when every preferential cell is at most its standard
    /// counterpart, which makes tier 2 never dearer than tier 1.
    pub fn is_preferential_monotone(&self) -> bool {
        [
            self.category.rimmed,
            self.category.drilled,
            self.category.half_rim,
            self.diamond_cut.smooth_facet,
            self.diamond_cut.diamond_ice,
            self.diamond_cut.twinkle_facet,
            self.engraving_unit,
            self.glass.four_season,
            self.glass.gradient,
            self.glass.stock_lens,
            self.shape_change,
        ]
        .iter()
        .all(TierRates::preferential_not_above_standard)
    }
}

/// Computes job prices from an injected [`PriceTable`].
#[derive(Debug, Clone, Default)]
pub struct PriceCalculator {
    table: PriceTable,
}

impl PriceCalculator {
    pub fn new(table: PriceTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }

    /// Sum of all option costs before the urgency surcharge.
    pub fn subtotal(&self, options: &FinishingOptions, tier: PricingTier) -> Decimal {
        let table = &self.table;
        let mut subtotal = table.category_cost(options.category, tier);
        subtotal += table.diamond_cut_cost(options.diamond_cut, tier);
        subtotal += table.engraving_unit.for_tier(tier) * Decimal::from(options.engraving_count);
        for option in &options.glass_options {
            subtotal += table.glass_cost(*option, tier);
        }
        if options.shape_change {
            subtotal += table.shape_change.for_tier(tier);
        }
        subtotal
    }

    /// Full-precision price: subtotal plus the urgency surcharge on it.
    pub fn compute(&self, options: &FinishingOptions, tier: PricingTier) -> Decimal {
        let subtotal = self.subtotal(options, tier);
        subtotal + subtotal * self.table.urgency_rate(options.urgency)
    }
}

/// Round an amount to cents, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
