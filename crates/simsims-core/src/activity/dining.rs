//! Dining: a worker eats one food unit.
//!
//! Vitality changes by the food quality minus a fixed offset, so poor food
//! can still hurt.

use super::{can_proceed, take, Bindings, Role, Work, WorkError};
use crate::config::ActivityConfig;
use crate::storage::StorageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dining {
    pub quality_offset: i32,
}

impl Dining {
    pub fn from_config(config: &ActivityConfig) -> Self {
        Self {
            quality_offset: config.dining_quality_offset,
        }
    }

    pub(crate) fn work(&self, ports: &Bindings) -> Result<Work, WorkError> {
        let barack_in = ports.port(Role::Input, StorageKind::Barack)?;
        let barn_in = ports.port(Role::Input, StorageKind::Barn)?;
        let barack_out = ports.port(Role::Output, StorageKind::Barack)?;

        let needed = || vec![barack_in.clone(), barn_in.clone()];
        if !can_proceed(barack_in) || !can_proceed(barn_in) {
            return Ok(Work::Short(needed()));
        }

        let Some(mut worker) = take(barack_in).and_then(|r| r.into_worker()) else {
            return Ok(Work::Short(needed()));
        };
        let Some(food) = take(barn_in).and_then(|r| r.into_food()) else {
            barack_in.put_back(worker.into());
            return Ok(Work::Short(needed()));
        };

        worker.change_vitality(i32::from(food.quality()) - self.quality_offset);
        barack_out.store(worker.into())?;
        Ok(Work::Yielded)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{ActivityKind, Profile, RunOutcome};
    use super::*;
    use crate::resource::{Food, Worker};
    use crate::sync::lock;

    fn dining() -> Profile {
        Profile::Dining(Dining { quality_offset: 6 })
    }

    #[test]
    fn test_meal_restores_vitality() {
        let barack = place(1, StorageKind::Barack);
        let barn = place(2, StorageKind::Barn);
        barack.preload([Worker::with_vitality(30).into()]).unwrap();
        barn.preload([Food::with_quality(50).into()]).unwrap();
        let activity = wired(dining(), &[&barack, &barn], &[&barack]);
        let coordinator = RecordingCoordinator::default();

        assert_eq!(activity.run_once(&coordinator), RunOutcome::Succeeded);
        assert_eq!(barack.worker_vitalities(), vec![74]);
        assert!(barn.is_empty());
        assert_eq!(*lock(&coordinator.decays), vec![ActivityKind::Dining]);
    }

    #[test]
    fn test_vitality_capped_at_hundred() {
        let barack = place(1, StorageKind::Barack);
        let barn = place(2, StorageKind::Barn);
        barack.preload([Worker::with_vitality(90).into()]).unwrap();
        barn.preload([Food::with_quality(100).into()]).unwrap();
        let activity = wired(dining(), &[&barack, &barn], &[&barack]);

        activity.run_once(&RecordingCoordinator::default());
        assert_eq!(barack.worker_vitalities(), vec![100]);
    }

    #[test]
    fn test_no_food_reports_both_inputs() {
        let barack = place(1, StorageKind::Barack);
        let barn = place(2, StorageKind::Barn);
        barack.preload([Worker::with_vitality(30).into()]).unwrap();
        let activity = wired(dining(), &[&barack, &barn], &[&barack]);
        let coordinator = RecordingCoordinator::default();

        assert_eq!(activity.run_once(&coordinator), RunOutcome::Shortage);
        assert_eq!(coordinator.shortage_ids(), vec![vec![barack.id(), barn.id()]]);
        assert_eq!(barack.worker_vitalities(), vec![30]);
    }
}
