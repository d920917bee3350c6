//! Core of simsims: a self-balancing world of storages and activities.
//!
//! # Modules
//!
//! - [`resource`]: Workers, food and products
//! - [`storage`]: Storage instances (Barack, Warehouse, Barn)
//! - [`activity`]: Activity kinds and their unit of work
//! - [`dispatch`]: Concurrency cap and cycle barrier
//! - [`world`]: The coordinator: dispatch, rebalancing, census
//! - [`config`]: TOML configuration

pub mod activity;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod resource;
pub mod storage;
pub mod world;

mod sync;

pub use activity::{Activity, ActivityId, ActivityKind, Coordinator, Profile, Role, RunOutcome, ShortageEvent};
pub use config::{default_config_toml, ConfigError, SimsimsConfig};
pub use dispatch::{DispatchStats, Dispatcher};
pub use error::{BindingError, StorageError, WorldError};
pub use resource::{Food, Product, Resource, Worker};
pub use storage::{OverflowHandler, Storage, StorageId, StorageKind};
pub use world::{CycleOutcome, PriorityTable, World, WorldBuilder};
