// control_system/mod.rs
pub mod observers;
pub mod policy;
pub mod scheduler;
pub mod traffic_light_controller;
