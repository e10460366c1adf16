// scheduler.rs
//
// The control loop: snapshot, decide, drain, notify, pace. Sleeps happen
// only after the store lock has been released.

use crate::control_system::observers::TrafficObserver;
use crate::control_system::policy::{Decision, SchedulingPolicy};
use crate::control_system::traffic_light_controller::SignalState;
use crate::global_variables::MOVEMENT_CLASS_COUNT;
use crate::simulation_engine::queues::{MovementQueueStore, StoreFault};
use crate::simulation_engine::vehicles::average_wait;
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};

/// How the loop waits after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Wait up to this long, or until the next arrival.
    Idle(Duration),
    /// Wait exactly this long.
    Hold(Duration),
}

pub struct Scheduler {
    store: Arc<MovementQueueStore>,
    policy: SchedulingPolicy,
    observers: Vec<Arc<dyn TrafficObserver>>,
    signal: SignalState,
    last_lengths: Option<[usize; MOVEMENT_CLASS_COUNT]>,
    total_passed: u64,
}

impl Scheduler {
    pub fn new(store: Arc<MovementQueueStore>, policy: SchedulingPolicy) -> Self {
        Self {
            store,
            policy,
            observers: Vec::new(),
            signal: SignalState::AllRed,
            last_lengths: None,
            total_passed: 0,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TrafficObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn signal(&self) -> &SignalState {
        &self.signal
    }

    /// Vehicles drained since start.
    pub fn total_passed(&self) -> u64 {
        self.total_passed
    }

    /// Runs one decision at `now` and applies it. Returns how long to wait
    /// before the next step.
    pub fn step(&mut self, now: Instant) -> Result<Pause, StoreFault> {
        let scope = self.policy.scope();
        let snapshot = self.store.snapshot_of(&scope)?;
        let pause = match self.policy.decide(&snapshot, now) {
            Decision::Idle { hold } => Pause::Idle(hold),
            Decision::Admit { grants, hold } => {
                if !grants.iter().all(|g| self.signal.is_green(g.class)) {
                    self.set_signal(SignalState::Green(grants.iter().map(|g| g.class).collect()));
                }
                for grant in &grants {
                    let passed = self.store.drain(grant.class, grant.count)?;
                    self.total_passed += passed.len() as u64;
                    debug!(
                        "Queue {} passed {} vehicle(s), average wait {:.2}s.",
                        grant.class,
                        passed.len(),
                        average_wait(&passed, now).as_secs_f64()
                    );
                }
                Pause::Hold(hold)
            }
            Decision::Green { classes } => {
                self.set_signal(SignalState::Green(classes));
                Pause::Hold(Duration::ZERO)
            }
            Decision::Yellow { hold } => {
                info!("Yellow. Total vehicles passed: {}", self.total_passed);
                self.set_signal(SignalState::Yellow);
                Pause::Hold(hold)
            }
        };
        self.publish_lengths()?;
        Ok(pause)
    }

    /// Drives the policy for as long as the store stays healthy.
    pub async fn run(mut self) -> Result<(), StoreFault> {
        info!("{} traffic scheduler running.", self.policy.name());
        loop {
            let pause = self.step(Instant::now())?;
            self.wait(pause).await;
        }
    }

    async fn wait(&self, pause: Pause) {
        match pause {
            Pause::Hold(hold) => sleep(hold).await,
            Pause::Idle(hold) => {
                // Elapsed simply means nothing arrived in time.
                let _ = timeout(hold, self.store.arrival_signal().notified()).await;
            }
        }
    }

    fn set_signal(&mut self, signal: SignalState) {
        for observer in &self.observers {
            observer.on_signal(&signal);
        }
        self.signal = signal;
    }

    fn publish_lengths(&mut self) -> Result<(), StoreFault> {
        let lengths = self.store.sizes()?;
        if self.last_lengths == Some(lengths) {
            return Ok(());
        }
        debug!("Traffic queue sizes: {:?}", lengths);
        for observer in &self.observers {
            observer.on_queue_lengths(lengths);
        }
        self.last_lengths = Some(lengths);
        Ok(())
    }
}
