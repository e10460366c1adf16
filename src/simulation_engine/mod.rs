// simulation_engine/mod.rs
pub mod arrivals;
pub mod movements;
pub mod queues;
pub mod vehicles;
