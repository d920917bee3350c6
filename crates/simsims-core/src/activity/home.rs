//! Home: consumes one product, then either raises a new worker from a
//! pair or heals a single worker.

use rand::rngs::SmallRng;
use rand::Rng;

use super::{can_proceed, take, Bindings, Role, Work, WorkError};
use crate::config::ActivityConfig;
use crate::resource::Worker;
use crate::storage::StorageKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Home {
    /// Probability that a visit attempts reproduction
    pub reproduction_chance: f64,
    /// Vitality restored when no reproduction happens
    pub healing: u8,
    /// Vitality range of a newborn worker
    pub newborn_vitality: [u8; 2],
}

impl Home {
    pub fn from_config(config: &ActivityConfig) -> Self {
        Self {
            reproduction_chance: config.reproduction_chance,
            healing: config.healing,
            newborn_vitality: config.worker_vitality,
        }
    }

    pub(crate) fn work(&self, ports: &Bindings, rng: &mut SmallRng) -> Result<Work, WorkError> {
        let warehouse_in = ports.port(Role::Input, StorageKind::Warehouse)?;
        let barack_in = ports.port(Role::Input, StorageKind::Barack)?;
        let barack_out = ports.port(Role::Output, StorageKind::Barack)?;

        let needed = || vec![warehouse_in.clone(), barack_in.clone()];
        if !can_proceed(warehouse_in) || !can_proceed(barack_in) {
            return Ok(Work::Short(needed()));
        }
        let Some(product) = take(warehouse_in) else {
            return Ok(Work::Short(needed()));
        };

        let chance = self.reproduction_chance.clamp(0.0, 1.0);
        if rng.gen_bool(chance) && barack_in.len() >= 2 {
            let pair = barack_in.take_up_to(2);
            if pair.len() == 2 {
                for parent in pair {
                    barack_out.store(parent)?;
                }
                barack_out.store(Worker::random(rng, self.newborn_vitality).into())?;
                return Ok(Work::Yielded);
            }
            // Lost the second parent to a concurrent activity.
            for parent in pair.into_iter().rev() {
                barack_in.put_back(parent);
            }
        }

        let Some(mut worker) = take(barack_in).and_then(|r| r.into_worker()) else {
            warehouse_in.put_back(product);
            return Ok(Work::Short(needed()));
        };
        worker.change_vitality(i32::from(self.healing));
        barack_out.store(worker.into())?;
        Ok(Work::NoYield)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{Profile, RunOutcome};
    use super::*;
    use crate::resource::Product;

    fn home(reproduction_chance: f64) -> Profile {
        Profile::Home(Home {
            reproduction_chance,
            healing: 5,
            newborn_vitality: [60, 60],
        })
    }

    #[test]
    fn test_heals_without_reproduction() {
        let barack = place(1, StorageKind::Barack);
        let warehouse = place(2, StorageKind::Warehouse);
        barack
            .preload([Worker::with_vitality(20).into(), Worker::with_vitality(40).into()])
            .unwrap();
        warehouse.preload([Product.into()]).unwrap();
        let activity = wired(home(0.0), &[&barack, &warehouse], &[&barack]);
        let coordinator = RecordingCoordinator::default();

        assert_eq!(activity.run_once(&coordinator), RunOutcome::NoYield);
        assert_eq!(barack.worker_vitalities(), vec![40, 25]);
        assert!(warehouse.is_empty());
        assert_eq!(coordinator.decay_count(), 0);
    }

    #[test]
    fn test_pair_raises_newborn() {
        let barack = place(1, StorageKind::Barack);
        let warehouse = place(2, StorageKind::Warehouse);
        barack
            .preload([Worker::with_vitality(20).into(), Worker::with_vitality(40).into()])
            .unwrap();
        warehouse.preload([Product.into()]).unwrap();
        let activity = wired(home(1.0), &[&barack, &warehouse], &[&barack]);
        let coordinator = RecordingCoordinator::default();

        assert_eq!(activity.run_once(&coordinator), RunOutcome::Succeeded);
        assert_eq!(barack.worker_vitalities(), vec![20, 40, 60]);
        assert_eq!(coordinator.decay_count(), 1);
    }

    #[test]
    fn test_single_worker_heals_even_when_coin_favors_reproduction() {
        let barack = place(1, StorageKind::Barack);
        let warehouse = place(2, StorageKind::Warehouse);
        barack.preload([Worker::with_vitality(50).into()]).unwrap();
        warehouse.preload([Product.into()]).unwrap();
        let activity = wired(home(1.0), &[&barack, &warehouse], &[&barack]);

        assert_eq!(activity.run_once(&RecordingCoordinator::default()), RunOutcome::NoYield);
        assert_eq!(barack.worker_vitalities(), vec![55]);
    }

    #[test]
    fn test_no_product_reports_shortage() {
        let barack = place(1, StorageKind::Barack);
        let warehouse = place(2, StorageKind::Warehouse);
        barack.preload([Worker::with_vitality(50).into()]).unwrap();
        let activity = wired(home(0.0), &[&barack, &warehouse], &[&barack]);
        let coordinator = RecordingCoordinator::default();

        assert_eq!(activity.run_once(&coordinator), RunOutcome::Shortage);
        assert_eq!(coordinator.shortage_ids(), vec![vec![warehouse.id(), barack.id()]]);
        assert_eq!(barack.worker_vitalities(), vec![50]);
    }
}
