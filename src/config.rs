//! Scheduler configuration.
//!
//! Every field defaults to the constants in `global_variables`, so a config
//! file only needs to list what it overrides:
//!
//! ```json
//! { "policy": "smart", "green_duration_secs": 5.0 }
//! ```

use crate::global_variables::{
    AMQP_URL, GREEN_DURATION_SECS, LEFT_TURN_PASS_SECS, MAX_DURATION_SECS, PER_VEHICLE_SECS,
    POLL_INTERVAL_SECS, STRAIGHT_PASS_SECS, YELLOW_DURATION_SECS,
};
use crate::simulation_engine::movements::{default_phase_cycle, MovementClass, MovementKind};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Which scheduling policy drives the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyKind {
    /// Longest queue first, random batch size.
    #[serde(rename = "smart")]
    Greedy,
    /// Fixed cycle of green windows over paired movements.
    #[serde(rename = "normal")]
    FixedPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub policy: PolicyKind,
    pub green_duration_secs: f64,
    pub yellow_duration_secs: f64,
    pub straight_pass_secs: f64,
    pub left_turn_pass_secs: f64,
    pub per_vehicle_secs: f64,
    pub poll_interval_secs: f64,
    /// Pairs of movement classes sharing a green window, in cycle order.
    pub phase_cycle: Vec<(u8, u8)>,
    pub amqp_url: String,
    /// Publish queue lengths and signal changes to RabbitMQ.
    pub publish_updates: bool,
    /// Generate random arrivals in-process instead of consuming them from RabbitMQ.
    pub demo_arrivals: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::FixedPhase,
            green_duration_secs: GREEN_DURATION_SECS,
            yellow_duration_secs: YELLOW_DURATION_SECS,
            straight_pass_secs: STRAIGHT_PASS_SECS,
            left_turn_pass_secs: LEFT_TURN_PASS_SECS,
            per_vehicle_secs: PER_VEHICLE_SECS,
            poll_interval_secs: POLL_INTERVAL_SECS,
            phase_cycle: default_phase_cycle()
                .into_iter()
                .map(|(a, b)| (a.as_u8(), b.as_u8()))
                .collect(),
            amqp_url: AMQP_URL.to_string(),
            publish_updates: true,
            demo_arrivals: false,
        }
    }
}

/// Durations used by both policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalTiming {
    pub green: Duration,
    pub yellow: Duration,
    pub straight_pass: Duration,
    pub left_turn_pass: Duration,
    pub per_vehicle: Duration,
    pub poll_interval: Duration,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            green: Duration::from_secs_f64(GREEN_DURATION_SECS),
            yellow: Duration::from_secs_f64(YELLOW_DURATION_SECS),
            straight_pass: Duration::from_secs_f64(STRAIGHT_PASS_SECS),
            left_turn_pass: Duration::from_secs_f64(LEFT_TURN_PASS_SECS),
            per_vehicle: Duration::from_secs_f64(PER_VEHICLE_SECS),
            poll_interval: Duration::from_secs_f64(POLL_INTERVAL_SECS),
        }
    }
}

impl SignalTiming {
    /// Time for the first vehicle of a movement to clear the intersection.
    pub fn base_pass(&self, kind: MovementKind) -> Duration {
        match kind {
            MovementKind::Straight => self.straight_pass,
            MovementKind::LeftTurn => self.left_turn_pass,
        }
    }
}

impl SchedulerConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, Box<dyn Error>> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        for (name, value) in self.durations() {
            if !value.is_finite() || !(0.0..=MAX_DURATION_SECS).contains(&value) {
                return Err(format!(
                    "{} must be between 0 and {} seconds, got {}",
                    name, MAX_DURATION_SECS, value
                )
                .into());
            }
        }
        self.phase_cycle()?;
        Ok(())
    }

    fn durations(&self) -> [(&'static str, f64); 6] {
        [
            ("green_duration_secs", self.green_duration_secs),
            ("yellow_duration_secs", self.yellow_duration_secs),
            ("straight_pass_secs", self.straight_pass_secs),
            ("left_turn_pass_secs", self.left_turn_pass_secs),
            ("per_vehicle_secs", self.per_vehicle_secs),
            ("poll_interval_secs", self.poll_interval_secs),
        ]
    }

    pub fn timing(&self) -> Result<SignalTiming, Box<dyn Error>> {
        let seconds = |name: &str, value: f64| -> Result<Duration, Box<dyn Error>> {
            Duration::try_from_secs_f64(value)
                .map_err(|e| format!("{} = {} is not a valid duration: {}", name, value, e).into())
        };
        Ok(SignalTiming {
            green: seconds("green_duration_secs", self.green_duration_secs)?,
            yellow: seconds("yellow_duration_secs", self.yellow_duration_secs)?,
            straight_pass: seconds("straight_pass_secs", self.straight_pass_secs)?,
            left_turn_pass: seconds("left_turn_pass_secs", self.left_turn_pass_secs)?,
            per_vehicle: seconds("per_vehicle_secs", self.per_vehicle_secs)?,
            poll_interval: seconds("poll_interval_secs", self.poll_interval_secs)?,
        })
    }

    /// The configured cycle as movement classes.
    pub fn phase_cycle(&self) -> Result<Vec<(MovementClass, MovementClass)>, Box<dyn Error>> {
        if self.phase_cycle.is_empty() {
            return Err("phase_cycle must list at least one pair".into());
        }
        self.phase_cycle
            .iter()
            .map(|&(a, b)| -> Result<(MovementClass, MovementClass), Box<dyn Error>> {
                let first = MovementClass::new(a)
                    .ok_or_else(|| format!("unknown movement class {} in phase_cycle", a))?;
                let second = MovementClass::new(b)
                    .ok_or_else(|| format!("unknown movement class {} in phase_cycle", b))?;
                if first == second {
                    return Err(format!("phase ({}, {}) pairs a class with itself", a, b).into());
                }
                Ok((first, second))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_timings() {
        let config = SchedulerConfig::default();
        assert_eq!(config.policy, PolicyKind::FixedPhase);
        assert_eq!(config.phase_cycle, vec![(0, 4), (1, 5), (2, 6), (3, 7)]);
        let timing = config.timing().unwrap();
        assert_eq!(timing, SignalTiming::default());
        assert_eq!(timing.green, Duration::from_secs(3));
        assert_eq!(timing.per_vehicle, Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides_only_listed_fields() {
        let config =
            SchedulerConfig::from_json_str(r#"{"policy": "smart", "green_duration_secs": 5}"#)
                .unwrap();
        assert_eq!(config.policy, PolicyKind::Greedy);
        assert_eq!(config.green_duration_secs, 5.0);
        assert_eq!(config.yellow_duration_secs, YELLOW_DURATION_SECS);
        assert_eq!(config.amqp_url, AMQP_URL);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(SchedulerConfig::from_json_str(r#"{"policy": "fastest"}"#).is_err());
        assert!(SchedulerConfig::from_json_str(r#"{"poll_interval_secs": -1}"#).is_err());
        assert!(SchedulerConfig::from_json_str(r#"{"phase_cycle": []}"#).is_err());
        assert!(SchedulerConfig::from_json_str(r#"{"phase_cycle": [[0, 8]]}"#).is_err());
        assert!(SchedulerConfig::from_json_str(r#"{"phase_cycle": [[3, 3]]}"#).is_err());
        assert!(SchedulerConfig::from_json_str(r#"{"green": 3}"#).is_err());
    }

    #[test]
    fn rejects_durations_too_large_for_the_clock() {
        for json in [
            r#"{"green_duration_secs": 1e30}"#,
            r#"{"green_duration_secs": 1e18}"#,
            r#"{"per_vehicle_secs": 86401}"#,
        ] {
            assert!(SchedulerConfig::from_json_str(json).is_err(), "{}", json);
        }
        let config = SchedulerConfig::from_json_str(r#"{"yellow_duration_secs": 86400}"#).unwrap();
        assert_eq!(config.timing().unwrap().yellow, Duration::from_secs(86_400));
    }

    #[test]
    fn timing_reports_unconvertible_values() {
        let config = SchedulerConfig {
            green_duration_secs: 1e30,
            ..SchedulerConfig::default()
        };
        let err = config.timing().unwrap_err();
        assert!(err.to_string().starts_with("green_duration_secs"));
    }

    #[test]
    fn base_pass_follows_movement_kind() {
        let timing = SignalTiming {
            straight_pass: Duration::from_millis(300),
            left_turn_pass: Duration::from_millis(500),
            ..SignalTiming::default()
        };
        assert_eq!(timing.base_pass(MovementKind::Straight), Duration::from_millis(300));
        assert_eq!(timing.base_pass(MovementKind::LeftTurn), Duration::from_millis(500));
    }
}
