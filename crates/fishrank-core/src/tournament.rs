use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

/// Lifecycle of a tournament. Live ranking only runs while registration is
/// open or closed; finalization walks Closed -> Finalizing ->
/// FinalizedRanked, with RankingFailed as the failure marker from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    RegistrationOpen,
    RegistrationClosed,
    Closed,
    Finalizing,
    FinalizedRanked,
    RankingFailed,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown tournament status `{0}`")]
pub struct StatusParseError(String);

impl std::str::FromStr for TournamentStatus {
    type Err = StatusParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "REGISTRATION_OPEN" => Ok(TournamentStatus::RegistrationOpen),
            "REGISTRATION_CLOSED" => Ok(TournamentStatus::RegistrationClosed),
            "CLOSED" => Ok(TournamentStatus::Closed),
            "FINALIZING" => Ok(TournamentStatus::Finalizing),
            "FINALIZED_RANKED" => Ok(TournamentStatus::FinalizedRanked),
            "RANKING_FAILED" => Ok(TournamentStatus::RankingFailed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::RegistrationOpen => "REGISTRATION_OPEN",
            TournamentStatus::RegistrationClosed => "REGISTRATION_CLOSED",
            TournamentStatus::Closed => "CLOSED",
            TournamentStatus::Finalizing => "FINALIZING",
            TournamentStatus::FinalizedRanked => "FINALIZED_RANKED",
            TournamentStatus::RankingFailed => "RANKING_FAILED",
        }
    }

    /// Whether a live ranking pass may run in this state.
    pub fn allows_live_update(&self) -> bool {
        matches!(
            self,
            TournamentStatus::RegistrationOpen | TournamentStatus::RegistrationClosed
        )
    }

    /// Allowed moves in the tournament state machine. Registration states
    /// toggle freely and close; finalization is linear; the failure marker
    /// is reachable from anywhere and can be retried into Finalizing.
    pub fn can_transition_to(&self, next: TournamentStatus) -> bool {
        use TournamentStatus::*;

        if next == RankingFailed {
            return *self != RankingFailed;
        }

        match self {
            RegistrationOpen => matches!(next, RegistrationClosed | Closed),
            RegistrationClosed => matches!(next, RegistrationOpen | Closed),
            Closed => matches!(next, Finalizing),
            Finalizing => matches!(next, FinalizedRanked),
            FinalizedRanked => false,
            RankingFailed => matches!(next, Finalizing),
        }
    }
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fishing category a tournament is ranked under. Also keys the national
/// ranking segments, so the string forms are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Kayak,
    Boat,
    Beach,
    Pond,
    Bank,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Kayak => "kayak",
            Modality::Boat => "boat",
            Modality::Beach => "beach",
            Modality::Pond => "pond",
            Modality::Bank => "bank",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tournament definition document. Created and mutated by organizers
/// through surfaces outside this crate; ranking only ever reads the rules
/// and advances the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Minimum ranked fish size in cm, kept as entered by the organizer.
    /// Use [`numeric_min_fish_size`] to interpret it.
    pub min_fish_size: String,
    /// Quota rule as entered: "1", "3" or "5". Use [`numeric_quota`].
    pub minimum_fish_count: String,
    pub modality: Modality,
    pub status: TournamentStatus,
    pub organizer_id: String,
    pub is_official: bool,
    pub allowed_species: Vec<String>,
}

/// Interprets the organizer-entered minimum fish size. Anything that does
/// not parse as a non-negative finite number falls back to 0 with a warning.
pub fn numeric_min_fish_size(tournament: &Tournament) -> f64 {
    match tournament.min_fish_size.trim().parse::<f64>() {
        Ok(size) if size.is_finite() && size >= 0.0 => size,
        _ => {
            warn!(
                "[{}] invalid min_fish_size `{}`, defaulting to 0",
                tournament.id, tournament.min_fish_size
            );
            0.0
        }
    }
}

/// Interprets the organizer-entered quota rule. Only "1", "3" and "5" are
/// recognized; anything else falls back to 1 with a warning.
pub fn numeric_quota(tournament: &Tournament) -> usize {
    match tournament.minimum_fish_count.trim() {
        "1" => 1,
        "3" => 3,
        "5" => 5,
        other => {
            warn!(
                "[{}] unrecognized minimum_fish_count `{other}`, defaulting to 1",
                tournament.id
            );
            1
        }
    }
}
