//! Factory: a worker makes a product.
//!
//! Each instance has a fixed accident odds and longevity cost. An accident
//! kills the worker outright; otherwise the worker pays the longevity cost.

use rand::rngs::SmallRng;
use rand::Rng;

use super::{can_proceed, take, Bindings, Role, Work, WorkError};
use crate::config::ActivityConfig;
use crate::resource::{ordered, Product};
use crate::storage::StorageKind;

/// Per-instance factory parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Factory {
    /// Out of ten
    pub accident_odds: u8,
    pub longevity_cost: u8,
}

impl Factory {
    pub fn generate(config: &ActivityConfig, rng: &mut SmallRng) -> Self {
        let (lo, hi) = ordered(config.factory_accident_odds);
        let accident_odds = rng.gen_range(lo..=hi);
        let (lo, hi) = ordered(config.factory_longevity_cost);
        let longevity_cost = rng.gen_range(lo..=hi);
        Self {
            accident_odds,
            longevity_cost,
        }
    }

    pub(crate) fn work(&self, ports: &Bindings, rng: &mut SmallRng) -> Result<Work, WorkError> {
        let barack_in = ports.port(Role::Input, StorageKind::Barack)?;
        let barack_out = ports.port(Role::Output, StorageKind::Barack)?;
        let warehouse_out = ports.port(Role::Output, StorageKind::Warehouse)?;

        if !can_proceed(barack_in) {
            return Ok(Work::Short(vec![barack_in.clone()]));
        }
        let Some(mut worker) = take(barack_in).and_then(|r| r.into_worker()) else {
            return Ok(Work::Short(vec![barack_in.clone()]));
        };

        if rng.gen_range(1..=10u8) <= self.accident_odds {
            worker.kill();
        } else {
            worker.change_vitality(-i32::from(self.longevity_cost));
        }

        if !worker.is_alive() {
            tracing::debug!("factory accident at {}", barack_in.id());
            return Ok(Work::NoYield);
        }

        warehouse_out.store(Product.into())?;
        barack_out.store(worker.into())?;
        Ok(Work::Yielded)
    }
}
