//! Storage locations ("places").
//!
//! A storage is a bounded container for one resource variant with a fixed
//! retrieval discipline. Its capacity is soft: a store into an instance
//! holding more than `capacity` units first hands the instance to the
//! coordinator's [`OverflowHandler`], which rebalances synchronously, and
//! then appends anyway. Contents of one instance are guarded by their own
//! lock; different instances never coordinate.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use simsims_events::ResourceKind;

use crate::error::StorageError;
use crate::resource::Resource;
use crate::sync::lock;

/// Default soft capacity of a storage instance.
pub const DEFAULT_CAPACITY: usize = 20;

/// Concrete storage kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Holds workers, first in first out; never counts the dead
    Barack,
    /// Holds products, last in first out
    Warehouse,
    /// Holds food, first in first out
    Barn,
}

/// Order in which a storage hands out its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    Fifo,
    Lifo,
}

impl StorageKind {
    /// Every storage kind, in registration order.
    pub const ALL: [StorageKind; 3] = [StorageKind::Barack, StorageKind::Warehouse, StorageKind::Barn];

    /// The resource variant this kind accepts.
    pub fn holds(self) -> ResourceKind {
        match self {
            StorageKind::Barack => ResourceKind::Worker,
            StorageKind::Warehouse => ResourceKind::Product,
            StorageKind::Barn => ResourceKind::Food,
        }
    }

    /// The storage kind accepting a resource variant.
    pub fn for_resource(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Worker => StorageKind::Barack,
            ResourceKind::Product => StorageKind::Warehouse,
            ResourceKind::Food => StorageKind::Barn,
        }
    }

    pub fn discipline(self) -> Discipline {
        match self {
            StorageKind::Warehouse => Discipline::Lifo,
            StorageKind::Barack | StorageKind::Barn => Discipline::Fifo,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StorageKind::Barack => "Barack",
            StorageKind::Warehouse => "Warehouse",
            StorageKind::Barn => "Barn",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of a storage instance, unique within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageId(pub u64);

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "place_{:04}", self.0)
    }
}

/// Receives instances whose store found them over capacity.
pub trait OverflowHandler: Send + Sync {
    /// Rebalances the given instances before the pending store appends.
    fn overflowing_resource(&self, places: &[Arc<Storage>]);
}

/// A storage instance.
pub struct Storage {
    id: StorageId,
    kind: StorageKind,
    capacity: usize,
    contents: Mutex<VecDeque<Resource>>,
    overflow: Option<Weak<dyn OverflowHandler>>,
}

impl Storage {
    /// Creates an empty instance that resolves no overflow.
    pub fn new(id: StorageId, kind: StorageKind, capacity: usize) -> Self {
        Self {
            id,
            kind,
            capacity,
            contents: Mutex::new(VecDeque::new()),
            overflow: None,
        }
    }

    /// Creates an empty instance that reports overflow to `handler`.
    pub fn with_overflow_handler(
        id: StorageId,
        kind: StorageKind,
        capacity: usize,
        handler: Weak<dyn OverflowHandler>,
    ) -> Self {
        Self {
            overflow: Some(handler),
            ..Self::new(id, kind, capacity)
        }
    }

    pub fn id(&self) -> StorageId {
        self.id
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live count of the contents. A Barack discards its dead first.
    pub fn len(&self) -> usize {
        let mut contents = lock(&self.contents);
        self.purge_dead(&mut contents);
        contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Units that fit before the instance reaches capacity.
    pub fn headroom(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }

    /// Stores a resource, resolving overflow first when over capacity.
    ///
    /// A dead worker stored into a Barack is discarded.
    pub fn store(self: &Arc<Self>, resource: Resource) -> Result<(), StorageError> {
        self.check_accepts(&resource)?;

        if self.len() > self.capacity {
            if let Some(handler) = self.overflow.as_ref().and_then(Weak::upgrade) {
                handler.overflowing_resource(std::slice::from_ref(self));
            }
        }

        let mut contents = lock(&self.contents);
        if resource.is_alive() {
            contents.push_back(resource);
        } else {
            tracing::trace!("{} {} discards a dead worker", self.kind, self.id);
        }
        self.purge_dead(&mut contents);
        Ok(())
    }

    /// Removes the next resource per the kind's discipline.
    pub fn retrieve(&self) -> Result<Resource, StorageError> {
        let mut contents = lock(&self.contents);
        self.purge_dead(&mut contents);
        self.pop(&mut contents).ok_or(StorageError::EmptyStorage {
            id: self.id,
            kind: self.kind,
        })
    }

    /// Fills the instance without consulting the overflow handler.
    ///
    /// Used to seed topologies. Returns how many units were kept.
    pub fn preload<I>(&self, resources: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = Resource>,
    {
        let mut contents = lock(&self.contents);
        let before = contents.len();
        for resource in resources {
            self.check_accepts(&resource)?;
            if resource.is_alive() {
                contents.push_back(resource);
            }
        }
        Ok(contents.len() - before)
    }

    /// Copy of the current contents in storage order.
    pub fn contents(&self) -> Vec<Resource> {
        let mut contents = lock(&self.contents);
        self.purge_dead(&mut contents);
        contents.iter().copied().collect()
    }

    /// Vitality of every worker held, in storage order.
    pub fn worker_vitalities(&self) -> Vec<u8> {
        self.contents()
            .into_iter()
            .filter_map(Resource::into_worker)
            .map(|w| w.vitality())
            .collect()
    }

    /// Takes up to `count` units in retrieval order, for restocking.
    pub(crate) fn take_up_to(&self, count: usize) -> Vec<Resource> {
        let mut contents = lock(&self.contents);
        self.purge_dead(&mut contents);
        let mut taken = Vec::with_capacity(count.min(contents.len()));
        while taken.len() < count {
            match self.pop(&mut contents) {
                Some(resource) => taken.push(resource),
                None => break,
            }
        }
        taken
    }

    /// Appends restocked units without consulting the overflow handler.
    pub(crate) fn absorb(&self, resources: Vec<Resource>) {
        let mut contents = lock(&self.contents);
        contents.extend(resources.into_iter().filter(Resource::is_alive));
    }

    /// Returns a unit an activity retrieved but could not use, so it is
    /// the next one handed out again.
    pub(crate) fn put_back(&self, resource: Resource) {
        if !resource.is_alive() {
            return;
        }
        let mut contents = lock(&self.contents);
        match self.kind.discipline() {
            Discipline::Fifo => contents.push_front(resource),
            Discipline::Lifo => contents.push_back(resource),
        }
    }

    fn pop(&self, contents: &mut VecDeque<Resource>) -> Option<Resource> {
        match self.kind.discipline() {
            Discipline::Fifo => contents.pop_front(),
            Discipline::Lifo => contents.pop_back(),
        }
    }

    fn purge_dead(&self, contents: &mut VecDeque<Resource>) {
        if self.kind == StorageKind::Barack {
            contents.retain(Resource::is_alive);
        }
    }

    fn check_accepts(&self, resource: &Resource) -> Result<(), StorageError> {
        let expected = self.kind.holds();
        if resource.kind() == expected {
            Ok(())
        } else {
            Err(StorageError::MismatchedResource {
                id: self.id,
                kind: self.kind,
                expected,
                found: resource.kind(),
            })
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("capacity", &self.capacity)
            .field("len", &lock(&self.contents).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Food, Product, Worker};

    fn storage(kind: StorageKind) -> Arc<Storage> {
        Arc::new(Storage::new(StorageId(1), kind, DEFAULT_CAPACITY))
    }

    #[test]
    fn test_kind_mapping() {
        for kind in StorageKind::ALL {
            assert_eq!(StorageKind::for_resource(kind.holds()), kind);
        }
        assert_eq!(StorageKind::Warehouse.discipline(), Discipline::Lifo);
        assert_eq!(StorageKind::Barn.discipline(), Discipline::Fifo);
    }

    #[test]
    fn test_barn_is_fifo() {
        let barn = storage(StorageKind::Barn);
        for quality in [30, 40, 50] {
            barn.store(Food::with_quality(quality).into()).unwrap();
        }

        let first = barn.retrieve().unwrap().into_food().unwrap();
        assert_eq!(first.quality(), 30);
    }

    #[test]
    fn test_barack_is_fifo() {
        let barack = storage(StorageKind::Barack);
        barack.store(Worker::with_vitality(10).into()).unwrap();
        barack.store(Worker::with_vitality(90).into()).unwrap();

        let first = barack.retrieve().unwrap().into_worker().unwrap();
        assert_eq!(first.vitality(), 10);
    }

    #[test]
    fn test_warehouse_is_lifo() {
        let warehouse = storage(StorageKind::Warehouse);
        warehouse.store(Product.into()).unwrap();
        warehouse.store(Product.into()).unwrap();
        assert_eq!(warehouse.len(), 2);

        warehouse.retrieve().unwrap();
        assert_eq!(warehouse.len(), 1);
    }

    #[test]
    fn test_retrieve_empty_fails() {
        let warehouse = storage(StorageKind::Warehouse);
        assert_eq!(
            warehouse.retrieve(),
            Err(StorageError::EmptyStorage {
                id: StorageId(1),
                kind: StorageKind::Warehouse
            })
        );
        assert_eq!(warehouse.len(), 0);
    }

    #[test]
    fn test_mismatched_resource_rejected() {
        let barn = storage(StorageKind::Barn);
        let err = barn.store(Product.into()).unwrap_err();
        assert!(matches!(err, StorageError::MismatchedResource { .. }));
        assert!(barn.is_empty());
    }

    #[test]
    fn test_barack_never_counts_dead_workers() {
        let barack = storage(StorageKind::Barack);
        barack.store(Worker::with_vitality(0).into()).unwrap();
        barack.store(Worker::with_vitality(20).into()).unwrap();
        assert_eq!(barack.len(), 1);

        barack.preload([Worker::with_vitality(0).into()]).unwrap();
        assert_eq!(barack.len(), 1);
        assert_eq!(barack.worker_vitalities(), vec![20]);
    }

    #[test]
    fn test_put_back_restores_retrieval_order() {
        let barack = storage(StorageKind::Barack);
        barack
            .preload([Worker::with_vitality(10).into(), Worker::with_vitality(20).into()])
            .unwrap();

        let first = barack.retrieve().unwrap();
        barack.put_back(first);
        assert_eq!(barack.worker_vitalities(), vec![10, 20]);

        let warehouse = storage(StorageKind::Warehouse);
        warehouse.preload([Product.into(), Product.into()]).unwrap();
        let top = warehouse.retrieve().unwrap();
        warehouse.put_back(top);
        assert_eq!(warehouse.len(), 2);
    }

    #[test]
    fn test_take_up_to_stops_when_empty() {
        let barn = storage(StorageKind::Barn);
        barn.preload((0..3).map(|q| Food::with_quality(q * 10 + 20).into()))
            .unwrap();

        let taken = barn.take_up_to(10);
        assert_eq!(taken.len(), 3);
        assert!(barn.is_empty());

        barn.absorb(taken);
        assert_eq!(barn.len(), 3);
    }

    #[test]
    fn test_detached_store_over_capacity_still_appends() {
        let warehouse = Arc::new(Storage::new(StorageId(9), StorageKind::Warehouse, 2));
        for _ in 0..5 {
            warehouse.store(Product.into()).unwrap();
        }
        assert_eq!(warehouse.len(), 5);
        assert_eq!(warehouse.headroom(), 0);
    }

    struct CountingHandler {
        calls: Mutex<Vec<StorageId>>,
    }

    impl OverflowHandler for CountingHandler {
        fn overflowing_resource(&self, places: &[Arc<Storage>]) {
            lock(&self.calls).extend(places.iter().map(|p| p.id()));
        }
    }

    #[test]
    fn test_overflow_handler_called_only_above_capacity() {
        let handler = Arc::new(CountingHandler {
            calls: Mutex::new(Vec::new()),
        });
        let weak: Weak<dyn OverflowHandler> = Arc::downgrade(&handler) as Weak<dyn OverflowHandler>;
        let barn = Arc::new(Storage::with_overflow_handler(
            StorageId(4),
            StorageKind::Barn,
            2,
            weak,
        ));

        // lengths before each store: 0, 1, 2, 3 -> only the last exceeds 2
        for _ in 0..4 {
            barn.store(Food::with_quality(50).into()).unwrap();
        }

        assert_eq!(*lock(&handler.calls), vec![StorageId(4)]);
        assert_eq!(barn.len(), 4);
    }
}
