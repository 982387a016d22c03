#![forbid(unsafe_code)]

pub mod calculator;
pub mod catch;
pub mod national;
pub mod ranking;
pub mod tournament;

pub use catch::{Catch, CatchStatus, ValidCatch};
pub use ranking::{BiggestFishRecord, RankedParticipant, TournamentResult};
pub use tournament::{Modality, Tournament, TournamentStatus};

/// Rounds to a fixed number of decimal places, matching how persisted
/// scores are stored.
pub fn round_dp(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
