//! Contracts for the persistence collaborators the ranking service drives.
//! Backends live elsewhere; in-memory implementations for tests and the
//! simulator are in [`crate::memory`].

use async_trait::async_trait;
use fishrank_core::national::{NationalRankingEntry, NationalRankingSegment, SegmentId, UserStats};
use fishrank_core::ranking::{TournamentResult, UserTournamentStats};
use fishrank_core::{Catch, CatchStatus, Tournament, TournamentStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TournamentRepository: Send + Sync {
    async fn get(&self, tournament_id: &str) -> StoreResult<Option<Tournament>>;
    async fn set_status(&self, tournament_id: &str, status: TournamentStatus) -> StoreResult<()>;
}

#[async_trait]
pub trait CatchRepository: Send + Sync {
    async fn all_for_tournament(&self, tournament_id: &str) -> StoreResult<Vec<Catch>>;
    async fn approved_for_tournament(&self, tournament_id: &str) -> StoreResult<Vec<Catch>>;
}

/// Write side of the catch collection, used for moderation and quota
/// demotions.
#[async_trait]
pub trait CatchUpdater: Send + Sync {
    async fn set_status(&self, catch_id: &str, status: CatchStatus) -> StoreResult<()>;

    /// Demotes a catch to `Replaced`, recording which catch pushed it over
    /// the quota.
    async fn mark_replaced(&self, catch_id: &str, caused_by: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait TournamentResultsRepository: Send + Sync {
    async fn get(&self, tournament_id: &str) -> StoreResult<Option<TournamentResult>>;
    async fn save_or_update(&self, result: &TournamentResult) -> StoreResult<()>;
    async fn update_status(&self, tournament_id: &str, status: TournamentStatus)
        -> StoreResult<()>;
    async fn delete(&self, tournament_id: &str) -> StoreResult<()>;
}

/// Keyed by (user, tournament).
#[async_trait]
pub trait UserTournamentStatsRepository: Send + Sync {
    async fn save_or_update(&self, stats: &UserTournamentStats) -> StoreResult<()>;
}

#[async_trait]
pub trait UserCareerStatsRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> StoreResult<Option<UserStats>>;
    async fn save_or_update(&self, stats: &UserStats) -> StoreResult<()>;

    /// Creates the career document with zeroed counters and returns it.
    async fn initialize(&self, user_id: &str) -> StoreResult<UserStats>;
}

#[async_trait]
pub trait NationalRankingRepository: Send + Sync {
    async fn get_all(&self) -> StoreResult<Vec<NationalRankingEntry>>;
    async fn get_by_user(&self, user_id: &str) -> StoreResult<Option<NationalRankingEntry>>;
    async fn save_or_update(&self, entry: &NationalRankingEntry) -> StoreResult<()>;

    /// Bulk overwrite of the whole ranking set, in ranked order.
    async fn save_all(&self, entries: &[NationalRankingEntry]) -> StoreResult<()>;
}

#[async_trait]
pub trait NationalSegmentRepository: Send + Sync {
    async fn get(&self, segment_id: &SegmentId) -> StoreResult<Option<NationalRankingSegment>>;
    async fn save_or_update(&self, segment: &NationalRankingSegment) -> StoreResult<()>;
    async fn delete(&self, segment_id: &SegmentId) -> StoreResult<()>;
}
