// src/shared_data.rs

use crate::global_variables::MOVEMENT_CLASS_COUNT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Vehicle identifier as reported by the sender. Either form is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VehicleId {
    Number(u64),
    Text(String),
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VehicleId::Number(n) => write!(f, "{}", n),
            VehicleId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Arrival report published on the `vehicle_arrivals` queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalReport {
    pub id: VehicleId,
    pub from_road: u8,
    pub to_road: u8,
    #[serde(default)]
    pub weight: i32,
}

/// Backlog of every movement class after a scheduler step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueLengthUpdate {
    pub timestamp: u64,
    pub lengths: [usize; MOVEMENT_CLASS_COUNT],
}

/// Signal change published whenever the granted classes change.
/// An empty `green` with `yellow == false` means all red.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalChange {
    pub timestamp: u64,
    pub green: Vec<u8>,
    pub yellow: bool,
}

/// Milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrival_report_accepts_numeric_and_text_ids() {
        let numeric: ArrivalReport =
            serde_json::from_str(r#"{"id": 42, "from_road": 0, "to_road": 2, "weight": 3}"#)
                .unwrap();
        assert_eq!(numeric.id, VehicleId::Number(42));
        assert_eq!(numeric.weight, 3);

        let text: ArrivalReport =
            serde_json::from_str(r#"{"id": "car-7", "from_road": 3, "to_road": 1}"#).unwrap();
        assert_eq!(text.id, VehicleId::Text("car-7".to_string()));
        assert_eq!(text.weight, 0);
        assert_eq!(text.id.to_string(), "car-7");
    }

    #[test]
    fn arrival_report_rejects_missing_roads() {
        let parsed = serde_json::from_str::<ArrivalReport>(r#"{"id": 1, "from_road": 0}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn queue_length_update_serializes_as_plain_array() {
        let update = QueueLengthUpdate {
            timestamp: 10,
            lengths: [0, 0, 3, 0, 0, 0, 0, 0],
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"timestamp":10,"lengths":[0,0,3,0,0,0,0,0]}"#);
    }
}
