//! Fields: a worker harvests food, at the risk of injury.

use rand::rngs::SmallRng;
use rand::Rng;

use super::{can_proceed, take, Bindings, Role, Work, WorkError};
use crate::config::ActivityConfig;
use crate::resource::{ordered, Food};
use crate::storage::StorageKind;

/// Per-instance fields parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    /// Out of ten
    pub accident_odds: u8,
    /// Vitality lost on an accident, drawn per accident
    pub injury: [u8; 2],
    /// Quality of harvested food, drawn per harvest
    pub harvest_quality: [u8; 2],
}

impl Fields {
    pub fn generate(config: &ActivityConfig, rng: &mut SmallRng) -> Self {
        let (lo, hi) = ordered(config.fields_accident_odds);
        Self {
            accident_odds: rng.gen_range(lo..=hi),
            injury: config.fields_injury,
            harvest_quality: config.harvest_quality,
        }
    }

    pub(crate) fn work(&self, ports: &Bindings, rng: &mut SmallRng) -> Result<Work, WorkError> {
        let barack_in = ports.port(Role::Input, StorageKind::Barack)?;
        let barack_out = ports.port(Role::Output, StorageKind::Barack)?;
        let barn_out = ports.port(Role::Output, StorageKind::Barn)?;

        if !can_proceed(barack_in) {
            return Ok(Work::Short(vec![barack_in.clone()]));
        }
        let Some(mut worker) = take(barack_in).and_then(|r| r.into_worker()) else {
            return Ok(Work::Short(vec![barack_in.clone()]));
        };

        if rng.gen_range(1..=10u8) <= self.accident_odds {
            let (lo, hi) = ordered(self.injury);
            worker.change_vitality(-i32::from(rng.gen_range(lo..=hi)));
        }

        if !worker.is_alive() {
            tracing::debug!("fatal injury in the fields at {}", barack_in.id());
            return Ok(Work::NoYield);
        }

        barn_out.store(Food::random(rng, self.harvest_quality).into())?;
        barack_out.store(worker.into())?;
        Ok(Work::Yielded)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{Profile, RunOutcome};
    use super::*;
    use crate::resource::Worker;

    fn fields(accident_odds: u8, injury: u8, quality: u8) -> Profile {
        Profile::Fields(Fields {
            accident_odds,
            injury: [injury, injury],
            harvest_quality: [quality, quality],
        })
    }

    #[test]
    fn test_safe_harvest() {
        let barack = place(1, StorageKind::Barack);
        let barn = place(2, StorageKind::Barn);
        barack.preload([Worker::with_vitality(30).into()]).unwrap();
        let activity = wired(fields(0, 50, 70), &[&barack], &[&barack, &barn]);
        let coordinator = RecordingCoordinator::default();

        assert_eq!(activity.run_once(&coordinator), RunOutcome::Succeeded);
        assert_eq!(barack.worker_vitalities(), vec![30]);
        assert_eq!(barn.contents(), vec![Food::with_quality(70).into()]);
    }

    #[test]
    fn test_injury_reduces_vitality() {
        let barack = place(1, StorageKind::Barack);
        let barn = place(2, StorageKind::Barn);
        barack.preload([Worker::with_vitality(80).into()]).unwrap();
        let activity = wired(fields(10, 25, 50), &[&barack], &[&barack, &barn]);
        let coordinator = RecordingCoordinator::default();

        assert_eq!(activity.run_once(&coordinator), RunOutcome::Succeeded);
        assert_eq!(barack.worker_vitalities(), vec![55]);
        assert_eq!(barn.len(), 1);
    }

    #[test]
    fn test_fatal_injury_yields_nothing() {
        let barack = place(1, StorageKind::Barack);
        let barn = place(2, StorageKind::Barn);
        barack.preload([Worker::with_vitality(20).into()]).unwrap();
        let activity = wired(fields(10, 70, 50), &[&barack], &[&barack, &barn]);
        let coordinator = RecordingCoordinator::default();

        assert_eq!(activity.run_once(&coordinator), RunOutcome::NoYield);
        assert!(barack.is_empty());
        assert!(barn.is_empty());
        assert_eq!(coordinator.decay_count(), 0);
    }
}
