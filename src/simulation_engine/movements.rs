use crate::global_variables::{MOVEMENT_CLASS_COUNT, ROAD_COUNT};
use crate::simulation_engine::vehicles::RoadId;
use std::fmt;

/// Index of one of the eight arbitrated movements, always in `0..8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MovementClass(u8);

/// Whether a movement crosses straight over or turns left across traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementKind {
    Straight,
    LeftTurn,
}

/// Movements that need a signal: (from, to, class).
/// Right turns (e.g. 0 -> 1) and U-turns are absent and pass freely.
const MOVEMENT_TABLE: [(u8, u8, u8); MOVEMENT_CLASS_COUNT] = [
    (0, 2, 0),
    (0, 3, 1),
    (1, 3, 2),
    (1, 0, 3),
    (2, 0, 4),
    (2, 1, 5),
    (3, 1, 6),
    (3, 2, 7),
];

/// Opposing movements that can share a green window.
const DEFAULT_PHASE_CYCLE: [(u8, u8); 4] = [(0, 4), (1, 5), (2, 6), (3, 7)];

impl MovementClass {
    pub const ALL: [MovementClass; MOVEMENT_CLASS_COUNT] = [
        MovementClass(0),
        MovementClass(1),
        MovementClass(2),
        MovementClass(3),
        MovementClass(4),
        MovementClass(5),
        MovementClass(6),
        MovementClass(7),
    ];

    /// Returns `None` for indices outside `0..8`.
    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < MOVEMENT_CLASS_COUNT {
            Some(MovementClass(index))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// The (from, to) roads this class arbitrates.
    pub fn roads(self) -> (RoadId, RoadId) {
        let (from, to, _) = MOVEMENT_TABLE[self.index()];
        (RoadId(from), RoadId(to))
    }

    pub fn kind(self) -> MovementKind {
        let (from, to) = self.roads();
        if (to.0 + ROAD_COUNT - from.0) % ROAD_COUNT == 2 {
            MovementKind::Straight
        } else {
            MovementKind::LeftTurn
        }
    }
}

impl fmt::Display for MovementClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (from, to) = self.roads();
        write!(f, "{} ({}->{})", self.0, from.0, to.0)
    }
}

/// Maps a (from, to) road pair to the movement class that must wait for a
/// signal, or `None` when the vehicle can pass without arbitration.
pub fn classify(from: RoadId, to: RoadId) -> Option<MovementClass> {
    MOVEMENT_TABLE
        .iter()
        .find(|&&(f, t, _)| f == from.0 && t == to.0)
        .map(|&(_, _, class)| MovementClass(class))
}

/// The fixed-phase cycle used when no other is configured.
pub fn default_phase_cycle() -> Vec<(MovementClass, MovementClass)> {
    DEFAULT_PHASE_CYCLE
        .iter()
        .map(|&(a, b)| (MovementClass(a), MovementClass(b)))
        .collect()
}
