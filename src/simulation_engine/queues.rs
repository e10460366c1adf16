//! Thread-safe store of the eight movement-class FIFOs.
//!
//! A single mutex guards all eight queues so that a snapshot always shows one
//! point in time across every class. Nothing here sleeps or awaits while the
//! lock is held.

use crate::global_variables::MOVEMENT_CLASS_COUNT;
use crate::simulation_engine::movements::{classify, MovementClass};
use crate::simulation_engine::vehicles::VehicleRecord;
use log::{debug, error, warn};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

type Queues = [VecDeque<VehicleRecord>; MOVEMENT_CLASS_COUNT];

/// The store lock was poisoned by a panic in another thread. The queues can no
/// longer be trusted, so the scheduler treats this as fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFault {
    operation: &'static str,
}

impl fmt::Display for StoreFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "movement queue store lock poisoned during {}", self.operation)
    }
}

impl Error for StoreFault {}

/// Point-in-time copy of some or all of the movement queues.
/// Changing it has no effect on the store.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    queues: [Option<Vec<VehicleRecord>>; MOVEMENT_CLASS_COUNT],
}

impl QueueSnapshot {
    /// The copied queue for `class`, or `None` if it was not part of the snapshot.
    pub fn queue(&self, class: MovementClass) -> Option<&[VehicleRecord]> {
        self.queues[class.index()].as_deref()
    }

    /// Length of the copied queue; classes outside the snapshot count as empty.
    pub fn len(&self, class: MovementClass) -> usize {
        self.queue(class).map_or(0, <[VehicleRecord]>::len)
    }

    pub fn lengths(&self) -> [usize; MOVEMENT_CLASS_COUNT] {
        let mut lengths = [0; MOVEMENT_CLASS_COUNT];
        for class in MovementClass::ALL {
            lengths[class.index()] = self.len(class);
        }
        lengths
    }

    /// True when every captured queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().flatten().all(Vec::is_empty)
    }
}

pub struct MovementQueueStore {
    queues: Mutex<Queues>,
    arrivals: Notify,
}

impl Default for MovementQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementQueueStore {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(std::array::from_fn(|_| VecDeque::new())),
            arrivals: Notify::new(),
        }
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, Queues>, StoreFault> {
        self.queues.lock().map_err(|_| StoreFault { operation })
    }

    /// Queues a vehicle behind the others of its movement class.
    ///
    /// Vehicles whose movement needs no signal are accepted without being
    /// queued. Returns `false` only when the store is faulted, in which case
    /// nothing was appended.
    pub fn insert(&self, record: VehicleRecord) -> bool {
        let class = match classify(record.from_road, record.to_road) {
            Some(class) => class,
            None => {
                debug!(
                    "Vehicle {} ({}->{}) needs no signal, passing.",
                    record.id, record.from_road.0, record.to_road.0
                );
                return true;
            }
        };
        match self.lock("insert") {
            Ok(mut queues) => queues[class.index()].push_back(record),
            Err(fault) => {
                error!("Dropping arrival: {}", fault);
                return false;
            }
        }
        self.arrivals.notify_one();
        true
    }

    /// Copies all eight queues atomically.
    pub fn snapshot(&self) -> Result<QueueSnapshot, StoreFault> {
        self.snapshot_of(&MovementClass::ALL)
    }

    /// Copies only the requested queues, atomically with respect to each other.
    pub fn snapshot_of(&self, classes: &[MovementClass]) -> Result<QueueSnapshot, StoreFault> {
        let queues = self.lock("snapshot")?;
        let mut snapshot = QueueSnapshot::default();
        for class in classes {
            snapshot.queues[class.index()] = Some(queues[class.index()].iter().cloned().collect());
        }
        Ok(snapshot)
    }

    /// Removes the `count` oldest vehicles of `class` and returns them.
    ///
    /// Draining 0 leaves the queue untouched. Counts beyond the queue length
    /// are clamped to it.
    pub fn drain(
        &self,
        class: MovementClass,
        count: usize,
    ) -> Result<Vec<VehicleRecord>, StoreFault> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut queues = self.lock("drain")?;
        let queue = &mut queues[class.index()];
        if count > queue.len() {
            warn!(
                "Asked to drain {} vehicles from queue {} holding {}; clamping.",
                count,
                class,
                queue.len()
            );
        }
        let n = count.min(queue.len());
        Ok(queue.drain(..n).collect())
    }

    pub fn sizes(&self) -> Result<[usize; MOVEMENT_CLASS_COUNT], StoreFault> {
        let queues = self.lock("sizes")?;
        Ok(std::array::from_fn(|i| queues[i].len()))
    }

    /// Pulsed after every successful enqueue. A pulse sent while nobody is
    /// waiting is kept for the next waiter.
    pub fn arrival_signal(&self) -> &Notify {
        &self.arrivals
    }
}
