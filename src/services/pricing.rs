use serde::Deserialize;
use std::collections::HashMap;

use crate::config::PricingConfig;
use crate::models::{SeatRef, SeatTier};

/// Prices in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TierPrices {
    pub standard: i64,
    pub vip: i64,
}

/// Seat price lookup: rows from `vip_from_row` onwards are VIP.
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    vip_from_row: char,
    default: TierPrices,
    tiers: HashMap<String, TierPrices>,
}

impl PricingPolicy {
    pub fn new(vip_from_row: char, default: TierPrices) -> Self {
        Self {
            vip_from_row: vip_from_row.to_ascii_uppercase(),
            default,
            tiers: HashMap::new(),
        }
    }

    pub fn with_tier(mut self, key: impl Into<String>, prices: TierPrices) -> Self {
        self.tiers.insert(key.into(), prices);
        self
    }

    pub fn from_config(config: &PricingConfig) -> Self {
        let mut policy = Self::new(
            config.vip_from_row,
            TierPrices {
                standard: config.standard,
                vip: config.vip,
            },
        );
        for (key, prices) in &config.tiers {
            policy.tiers.insert(key.clone(), *prices);
        }
        policy
    }

    pub fn tier_of(&self, seat: &SeatRef) -> SeatTier {
        debug_assert!(seat.row.is_ascii_uppercase(), "invalid row {:?}", seat.row);
        if seat.row >= self.vip_from_row {
            SeatTier::Vip
        } else {
            SeatTier::Standard
        }
    }

    pub fn price_of(&self, price_key: &str, seat: &SeatRef) -> i64 {
        let prices = self.tiers.get(price_key).unwrap_or(&self.default);
        match self.tier_of(seat) {
            SeatTier::Standard => prices.standard,
            SeatTier::Vip => prices.vip,
        }
    }

    pub fn total_of<'a>(&self, price_key: &str, seats: impl IntoIterator<Item = &'a SeatRef>) -> i64 {
        seats
            .into_iter()
            .map(|seat| self.price_of(price_key, seat))
            .sum()
    }
}
