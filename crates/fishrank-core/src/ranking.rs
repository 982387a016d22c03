use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tournament::TournamentStatus;

/// One of the catches counting toward a participant's quota average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCatch {
    pub catch_id: String,
    pub size_cm: f64,
    pub species_name: String,
}

/// A participant's computed standing within one tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedParticipant {
    pub user_id: String,
    /// 1-based, contiguous over the whole ranking.
    pub position: u32,
    /// Mean of the top `quota` catch sizes, 0 when the quota is unmet.
    pub average_size: f64,
    pub biggest_single_fish_size: f64,
    pub number_of_valid_catches: u32,
    pub top_catches: Vec<TopCatch>,
    pub met_minimum_quota: bool,
}

/// Record of the biggest fish in a tournament, overall or per species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiggestFishRecord {
    pub user_id: String,
    pub species_name: String,
    pub size_cm: f64,
    pub catch_id: String,
    pub catch_date: DateTime<Utc>,
}

/// The per-tournament results document. Always recomputed from scratch and
/// written as a full overwrite, never patched incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentResult {
    pub tournament_id: String,
    pub tournament_name: String,
    pub status: TournamentStatus,
    pub min_fish_size: f64,
    pub minimum_fish_count: String,
    pub ranking: Vec<RankedParticipant>,
    pub biggest_fish_overall: Option<BiggestFishRecord>,
    pub biggest_fish_by_species: BTreeMap<String, BiggestFishRecord>,
    /// Distinct users with at least one approved catch.
    pub participant_count: u32,
    pub ranked_participant_count: u32,
    pub total_catch_count: u32,
    pub approved_catch_count: u32,
    pub pending_catch_count: u32,
    pub rejected_catch_count: u32,
    pub replaced_catch_count: u32,
    /// Absent until the tournament is finalized.
    pub tournament_weight: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

/// Summary of a top-10 finish handed to the national aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Top10Result {
    pub user_id: String,
    pub tournament_id: String,
    pub position: u32,
    pub total_ranked_participants: u32,
}

/// Record of a user's biggest fish within one tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentBiggestFish {
    pub catch_id: String,
    pub species_name: String,
    pub size_cm: f64,
    pub catch_date: DateTime<Utc>,
}

/// Per-user statistics within a single tournament, recomputed on every live
/// pass from the quota-clean approved catches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTournamentStats {
    pub tournament_id: String,
    pub tournament_name: String,
    pub user_id: String,
    pub approved_catch_count: u32,
    pub total_approved_catch_cm: f64,
    pub biggest_fish: Option<TournamentBiggestFish>,
    pub met_minimum_quota: bool,
    pub last_updated: DateTime<Utc>,
}
