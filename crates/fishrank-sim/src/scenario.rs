//! Scenario files describe a season to replay: tournament definitions and
//! the catch submissions made during them, in RON.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use fishrank_core::{Catch, CatchStatus, Modality, Tournament, TournamentStatus};

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub tournaments: Vec<TournamentSeed>,
    pub catches: Vec<CatchSeed>,
}

#[derive(Debug, Deserialize)]
pub struct TournamentSeed {
    pub id: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub min_fish_size: String,
    pub minimum_fish_count: String,
    pub modality: Modality,
    pub organizer_id: String,
    #[serde(default)]
    pub is_official: bool,
}

impl TournamentSeed {
    /// Seeded tournaments always start with registration open; the
    /// simulation drives the rest of the lifecycle.
    pub fn into_tournament(self) -> Tournament {
        Tournament {
            id: self.id,
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
            min_fish_size: self.min_fish_size,
            minimum_fish_count: self.minimum_fish_count,
            modality: self.modality,
            status: TournamentStatus::RegistrationOpen,
            organizer_id: self.organizer_id,
            is_official: self.is_official,
            allowed_species: vec![],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CatchSeed {
    pub id: String,
    pub tournament_id: String,
    pub user_id: String,
    pub species_name: String,
    pub length_cm: f64,
    #[serde(default)]
    pub size_adjustment: Option<f64>,
    pub status: CatchStatus,
    pub catch_date: DateTime<Utc>,
}

impl CatchSeed {
    pub fn into_catch(self) -> Catch {
        Catch {
            id: self.id,
            tournament_id: self.tournament_id,
            user_id: self.user_id,
            species_name: self.species_name,
            length_cm: self.length_cm,
            size_adjustment: self.size_adjustment,
            status: self.status,
            catch_date: self.catch_date,
            submitted_at: self.catch_date,
            validated_at: None,
            rejection_reason: None,
            replaced_because_of: None,
        }
    }
}
