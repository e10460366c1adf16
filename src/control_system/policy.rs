//! Scheduling policies.
//!
//! Both variants are pull based: the scheduler hands them a fresh snapshot and
//! the current instant, and they answer with one [`Decision`]. The variant is
//! chosen once at startup.

use crate::config::{PolicyKind, SchedulerConfig, SignalTiming};
use crate::control_system::traffic_light_controller::FixedPhasePolicy;
use crate::global_variables::MOVEMENT_CLASS_COUNT;
use crate::simulation_engine::movements::MovementClass;
use crate::simulation_engine::queues::QueueSnapshot;
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::time::{Duration, Instant};

/// Permission for `count` vehicles of `class` to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub class: MovementClass,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No queue is eligible; look again after `hold` or on the next arrival.
    Idle { hold: Duration },
    /// Drain the granted vehicles, then wait `hold` for them to clear.
    Admit { grants: Vec<Grant>, hold: Duration },
    /// Open a green window for these classes.
    Green { classes: Vec<MovementClass> },
    /// Close the current window; nobody moves for `hold`.
    Yellow { hold: Duration },
}

/// First class holding the strictly longest queue, with its length.
/// `None` when every queue is empty.
pub fn select_longest(
    lengths: &[usize; MOVEMENT_CLASS_COUNT],
) -> Option<(MovementClass, usize)> {
    let mut best: Option<(MovementClass, usize)> = None;
    let mut best_len = 0;
    for class in MovementClass::ALL {
        let len = lengths[class.index()];
        if len > best_len {
            best_len = len;
            best = Some((class, len));
        }
    }
    best
}

/// Serves the longest queue with a random batch, pacing by batch size.
#[derive(Debug)]
pub struct GreedyPolicy {
    timing: SignalTiming,
    rng: SmallRng,
}

impl GreedyPolicy {
    pub fn new(timing: SignalTiming) -> Self {
        Self {
            timing,
            rng: SmallRng::from_rng(&mut rand::rng()),
        }
    }

    /// Deterministic batch sizes, for tests and benchmarks.
    pub fn with_seed(timing: SignalTiming, seed: u64) -> Self {
        Self {
            timing,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn decide(&mut self, snapshot: &QueueSnapshot) -> Decision {
        let (class, len) = match select_longest(&snapshot.lengths()) {
            Some(selected) => selected,
            None => {
                return Decision::Idle {
                    hold: self.timing.poll_interval,
                }
            }
        };
        let count = self.rng.random_range(1..=len);
        info!("Let traffic queue {} pass {} of {} vehicles.", class, count, len);
        Decision::Admit {
            grants: vec![Grant { class, count }],
            hold: self.hold_for(class, count),
        }
    }

    /// `base_pass + count * per_vehicle`, saturating at `Duration::MAX`.
    pub fn hold_for(&self, class: MovementClass, count: usize) -> Duration {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.timing
            .base_pass(class.kind())
            .saturating_add(self.timing.per_vehicle.saturating_mul(count))
    }
}

pub enum SchedulingPolicy {
    Greedy(GreedyPolicy),
    FixedPhase(FixedPhasePolicy),
}

impl SchedulingPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, Box<dyn Error>> {
        let timing = config.timing()?;
        Ok(match config.policy {
            PolicyKind::Greedy => SchedulingPolicy::Greedy(GreedyPolicy::new(timing)),
            PolicyKind::FixedPhase => {
                SchedulingPolicy::FixedPhase(FixedPhasePolicy::new(config.phase_cycle()?, timing)?)
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchedulingPolicy::Greedy(_) => "smart",
            SchedulingPolicy::FixedPhase(_) => "normal",
        }
    }

    /// Queues the next `decide` call needs in its snapshot.
    pub fn scope(&self) -> Vec<MovementClass> {
        match self {
            SchedulingPolicy::Greedy(_) => MovementClass::ALL.to_vec(),
            SchedulingPolicy::FixedPhase(policy) => policy.scope(),
        }
    }

    pub fn decide(&mut self, snapshot: &QueueSnapshot, now: Instant) -> Decision {
        match self {
            SchedulingPolicy::Greedy(policy) => policy.decide(snapshot),
            SchedulingPolicy::FixedPhase(policy) => policy.decide(snapshot, now),
        }
    }
}
