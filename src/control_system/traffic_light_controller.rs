use crate::config::SignalTiming;
use crate::control_system::policy::{Decision, Grant};
use crate::global_variables::MAX_DURATION_SECS;
use crate::shared_data::SignalChange;
use crate::simulation_engine::movements::MovementClass;
use crate::simulation_engine::queues::QueueSnapshot;
use log::{debug, info, warn};
use std::error::Error;
use std::time::{Duration, Instant};

/// What the signal heads currently show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalState {
    /// Nothing granted yet.
    AllRed,
    /// These movement classes may proceed.
    Green(Vec<MovementClass>),
    /// Transition between green windows; nobody proceeds.
    Yellow,
}

impl SignalState {
    pub fn is_green(&self, class: MovementClass) -> bool {
        match self {
            SignalState::Green(classes) => classes.contains(&class),
            _ => false,
        }
    }

    pub fn to_change(&self, timestamp: u64) -> SignalChange {
        let green = match self {
            SignalState::Green(classes) => classes.iter().map(|c| c.as_u8()).collect(),
            _ => Vec::new(),
        };
        SignalChange {
            timestamp,
            green,
            yellow: *self == SignalState::Yellow,
        }
    }
}

/// Cycles a fixed list of non-conflicting class pairs, giving each a green
/// window of constant length followed by a yellow transition.
///
/// The phase index is advanced before each window opens, so the very first
/// window serves `phases[1]` (or `phases[0]` when there is only one phase).
#[derive(Debug)]
pub struct FixedPhasePolicy {
    phases: Vec<(MovementClass, MovementClass)>,
    current_phase_index: usize,
    window_end: Option<Instant>,
    timing: SignalTiming,
}

impl FixedPhasePolicy {
    pub fn new(
        phases: Vec<(MovementClass, MovementClass)>,
        timing: SignalTiming,
    ) -> Result<Self, Box<dyn Error>> {
        if phases.is_empty() {
            return Err("fixed-phase policy needs at least one phase".into());
        }
        Ok(Self {
            phases,
            current_phase_index: 0,
            window_end: None,
            timing,
        })
    }

    pub fn current_phase_index(&self) -> usize {
        self.current_phase_index
    }

    pub fn current_phase(&self) -> (MovementClass, MovementClass) {
        self.phases[self.current_phase_index]
    }

    pub fn window_open(&self) -> bool {
        self.window_end.is_some()
    }

    /// Queues the next decision needs to see: the active pair while a window
    /// is open, nothing otherwise.
    pub fn scope(&self) -> Vec<MovementClass> {
        if self.window_open() {
            let (a, b) = self.current_phase();
            vec![a, b]
        } else {
            Vec::new()
        }
    }

    pub fn decide(&mut self, snapshot: &QueueSnapshot, now: Instant) -> Decision {
        let end = match self.window_end {
            None => return self.open_window(now),
            Some(end) => end,
        };
        if now >= end {
            self.window_end = None;
            info!("Phase {} closed, yellow.", self.current_phase_index);
            return Decision::Yellow {
                hold: self.timing.yellow,
            };
        }

        let remaining = end - now;
        let (a, b) = self.current_phase();
        let grants: Vec<Grant> = [a, b]
            .into_iter()
            .filter(|&class| snapshot.len(class) > 0)
            .map(|class| Grant { class, count: 1 })
            .collect();
        if grants.is_empty() {
            return Decision::Idle {
                hold: self.timing.poll_interval.min(remaining),
            };
        }
        Decision::Admit {
            grants,
            hold: self.timing.per_vehicle.min(remaining),
        }
    }

    fn open_window(&mut self, now: Instant) -> Decision {
        self.current_phase_index = (self.current_phase_index + 1) % self.phases.len();
        self.window_end = Some(window_end(now, self.timing.green));
        let (a, b) = self.current_phase();
        info!(
            "Switching to phase {}: queues {} and {} are passing.",
            self.current_phase_index, a, b
        );
        debug!("Green window of {:?}", self.timing.green);
        Decision::Green {
            classes: vec![a, b],
        }
    }
}

// Window ends that overflow the clock are capped at the longest configurable duration.
fn window_end(now: Instant, green: Duration) -> Instant {
    match now.checked_add(green) {
        Some(end) => end,
        None => {
            warn!("Green window of {:?} overflows the clock, capping it.", green);
            now.checked_add(Duration::from_secs_f64(MAX_DURATION_SECS))
                .unwrap_or(now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_engine::movements::default_phase_cycle;
    use crate::simulation_engine::queues::MovementQueueStore;
    use crate::simulation_engine::vehicles::{RoadId, VehicleRecord};
    use crate::shared_data::VehicleId;

    fn class(index: u8) -> MovementClass {
        MovementClass::new(index).unwrap()
    }

    fn policy() -> FixedPhasePolicy {
        FixedPhasePolicy::new(default_phase_cycle(), SignalTiming::default()).unwrap()
    }

    #[test]
    fn first_window_serves_second_phase() {
        let mut policy = policy();
        assert_eq!(policy.current_phase_index(), 0);
        let decision = policy.decide(&QueueSnapshot::default(), Instant::now());
        assert_eq!(
            decision,
            Decision::Green {
                classes: vec![class(1), class(5)]
            }
        );
        assert_eq!(policy.current_phase_index(), 1);
        assert_eq!(policy.scope(), vec![class(1), class(5)]);
    }

    #[test]
    fn empty_pair_polls_within_window() {
        let mut policy = policy();
        let start = Instant::now();
        policy.decide(&QueueSnapshot::default(), start);
        let late = start + Duration::from_millis(2950);
        assert_eq!(
            policy.decide(&QueueSnapshot::default(), late),
            Decision::Idle {
                hold: Duration::from_millis(50)
            }
        );
        assert_eq!(
            policy.decide(&QueueSnapshot::default(), start),
            Decision::Idle {
                hold: SignalTiming::default().poll_interval
            }
        );
    }

    #[test]
    fn admits_one_vehicle_per_non_empty_queue() {
        let store = MovementQueueStore::new();
        for id in 0..3 {
            store.insert(VehicleRecord::new(VehicleId::Number(id), RoadId(0), RoadId(3), 0));
        }
        let mut policy = policy();
        let start = Instant::now();
        policy.decide(&QueueSnapshot::default(), start);
        let snapshot = store.snapshot_of(&policy.scope()).unwrap();
        assert_eq!(
            policy.decide(&snapshot, start),
            Decision::Admit {
                grants: vec![Grant {
                    class: class(1),
                    count: 1
                }],
                hold: SignalTiming::default().per_vehicle,
            }
        );
    }

    #[test]
    fn window_expiry_turns_yellow_then_advances() {
        let mut policy = policy();
        let start = Instant::now();
        policy.decide(&QueueSnapshot::default(), start);
        let expired = start + Duration::from_secs(3);
        assert_eq!(
            policy.decide(&QueueSnapshot::default(), expired),
            Decision::Yellow {
                hold: SignalTiming::default().yellow
            }
        );
        assert!(!policy.window_open());
        assert!(policy.scope().is_empty());
        assert_eq!(
            policy.decide(&QueueSnapshot::default(), expired),
            Decision::Green {
                classes: vec![class(2), class(6)]
            }
        );
    }

    #[test]
    fn one_cycle_gives_every_pair_one_window() {
        let mut policy = policy();
        let mut now = Instant::now();
        let mut served = Vec::new();
        for _ in 0..4 {
            if let Decision::Green { classes } = policy.decide(&QueueSnapshot::default(), now) {
                served.push((classes[0], classes[1]));
            }
            now += Duration::from_secs(3);
            assert!(matches!(
                policy.decide(&QueueSnapshot::default(), now),
                Decision::Yellow { .. }
            ));
        }
        let mut expected = default_phase_cycle();
        expected.rotate_left(1);
        assert_eq!(served, expected);
    }

    #[test]
    fn huge_green_window_does_not_overflow() {
        let timing = SignalTiming {
            green: Duration::MAX,
            ..SignalTiming::default()
        };
        let mut policy = FixedPhasePolicy::new(default_phase_cycle(), timing).unwrap();
        let start = Instant::now();
        assert!(matches!(
            policy.decide(&QueueSnapshot::default(), start),
            Decision::Green { .. }
        ));
        assert!(policy.window_open());
        assert!(matches!(
            policy.decide(&QueueSnapshot::default(), start + Duration::from_secs(60)),
            Decision::Idle { .. }
        ));
    }

    #[test]
    fn rejects_empty_cycle() {
        assert!(FixedPhasePolicy::new(Vec::new(), SignalTiming::default()).is_err());
    }

    #[test]
    fn signal_change_reports_green_and_yellow() {
        let green = SignalState::Green(vec![class(0), class(4)]);
        assert!(green.is_green(class(4)));
        assert!(!green.is_green(class(1)));
        assert_eq!(
            green.to_change(5),
            SignalChange {
                timestamp: 5,
                green: vec![0, 4],
                yellow: false
            }
        );
        assert!(SignalState::Yellow.to_change(6).yellow);
        assert!(SignalState::AllRed.to_change(7).green.is_empty());
    }
}
