//! Resource variants circulating through the world.
//!
//! Resources are plain values: they move between storages and activities
//! by ownership and carry no behavior beyond their own invariants.

use rand::Rng;
use simsims_events::ResourceKind;

/// Upper bound of worker vitality.
pub const MAX_VITALITY: u8 = 100;
/// Upper bound of food quality.
pub const MAX_QUALITY: u8 = 100;

/// A worker. Alive while vitality is above zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Worker {
    vitality: u8,
}

impl Worker {
    /// Creates a worker with the given vitality, clamped to `[0, 100]`.
    pub fn with_vitality(vitality: i32) -> Self {
        Self {
            vitality: clamp_vitality(vitality),
        }
    }

    /// Creates a worker with vitality drawn uniformly from `range`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, range: [u8; 2]) -> Self {
        let (lo, hi) = ordered(range);
        Self::with_vitality(rng.gen_range(lo..=hi) as i32)
    }

    pub fn vitality(&self) -> u8 {
        self.vitality
    }

    pub fn is_alive(&self) -> bool {
        self.vitality > 0
    }

    /// Applies a vitality change; the result is clamped to `[0, 100]`.
    pub fn change_vitality(&mut self, delta: i32) {
        self.vitality = clamp_vitality(self.vitality as i32 + delta);
    }

    /// Fatal accident.
    pub fn kill(&mut self) {
        self.vitality = 0;
    }
}

fn clamp_vitality(value: i32) -> u8 {
    value.clamp(0, MAX_VITALITY as i32) as u8
}

/// A food unit. Quality is fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Food {
    quality: u8,
}

impl Food {
    /// Creates food of the given quality, capped at 100.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.min(MAX_QUALITY),
        }
    }

    /// Creates food with quality drawn uniformly from `range`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, range: [u8; 2]) -> Self {
        let (lo, hi) = ordered(range);
        Self::with_quality(rng.gen_range(lo..=hi))
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

/// A manufactured product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Product;

/// Any resource a storage can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Worker(Worker),
    Food(Food),
    Product(Product),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Worker(_) => ResourceKind::Worker,
            Resource::Food(_) => ResourceKind::Food,
            Resource::Product(_) => ResourceKind::Product,
        }
    }

    /// Only workers can die; every other resource counts as living.
    pub fn is_alive(&self) -> bool {
        match self {
            Resource::Worker(w) => w.is_alive(),
            _ => true,
        }
    }

    pub fn into_worker(self) -> Option<Worker> {
        match self {
            Resource::Worker(w) => Some(w),
            _ => None,
        }
    }

    pub fn into_food(self) -> Option<Food> {
        match self {
            Resource::Food(f) => Some(f),
            _ => None,
        }
    }
}

impl From<Worker> for Resource {
    fn from(w: Worker) -> Self {
        Resource::Worker(w)
    }
}

impl From<Food> for Resource {
    fn from(f: Food) -> Self {
        Resource::Food(f)
    }
}

impl From<Product> for Resource {
    fn from(p: Product) -> Self {
        Resource::Product(p)
    }
}

/// Normalizes a `[lo, hi]` pair so `lo <= hi`.
pub(crate) fn ordered<T: PartialOrd + Copy>(range: [T; 2]) -> (T, T) {
    if range[0] <= range[1] {
        (range[0], range[1])
    } else {
        (range[1], range[0])
    }
}
