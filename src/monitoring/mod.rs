pub mod dashboard;
pub mod traffic_monitoring_system;
