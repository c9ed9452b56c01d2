pub mod enemies;
pub mod level;
pub mod telemetry;
