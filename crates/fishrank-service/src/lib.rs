#![forbid(unsafe_code)]

pub mod memory;
pub mod repositories;
pub mod service;

pub use repositories::{StoreError, StoreResult};
pub use service::{Dependencies, Error, RankingService};
