use crate::shared_data::{ArrivalReport, VehicleId};
use std::time::{Duration, Instant};

/// One of the four roads meeting at the intersection, labeled 0-3.
/// Labels outside that range can be reported; they simply never classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoadId(pub u8);

/// A vehicle waiting to cross the intersection.
#[derive(Debug, Clone)]
pub struct VehicleRecord {
    /// Identifier from the arrival report. Not checked for uniqueness.
    pub id: VehicleId,
    /// Road the vehicle approaches from.
    pub from_road: RoadId,
    /// Road the vehicle leaves on.
    pub to_road: RoadId,
    /// When the record was accepted into a queue.
    pub arrived_at: Instant,
    /// Priority hint (e.g., higher for urgent vehicles). Carried but not used by any policy.
    pub weight: i32,
}

impl VehicleRecord {
    /// Creates a record stamped with the current instant.
    pub fn new(id: VehicleId, from_road: RoadId, to_road: RoadId, weight: i32) -> Self {
        Self {
            id,
            from_road,
            to_road,
            arrived_at: Instant::now(),
            weight,
        }
    }

    /// Builds a record from a wire report, stamping the arrival time.
    pub fn from_report(report: ArrivalReport) -> Self {
        Self::new(
            report.id,
            RoadId(report.from_road),
            RoadId(report.to_road),
            report.weight,
        )
    }

    /// Time spent waiting as of `now`.
    pub fn waited(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.arrived_at)
    }
}

/// Mean waiting time of a batch of vehicles that just passed.
pub fn average_wait(passed: &[VehicleRecord], now: Instant) -> Duration {
    if passed.is_empty() {
        return Duration::ZERO;
    }
    let total: Duration = passed.iter().map(|v| v.waited(now)).sum();
    total / passed.len() as u32
}
