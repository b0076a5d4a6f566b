pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod search;

pub use connection::{connect, connect_with_settings, DbPool, PoolSettings};
pub use fixtures::{SeedResult, ShowroomSeedDataset, VerificationResult};
