//! In-memory implementations of the repository contracts, used by the test
//! suites and the simulator. Documents live in `RwLock`ed maps and every
//! write is a full overwrite, mirroring how the service treats its stores.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fishrank_core::national::{NationalRankingEntry, NationalRankingSegment, SegmentId, UserStats};
use fishrank_core::ranking::{TournamentResult, UserTournamentStats};
use fishrank_core::{Catch, CatchStatus, Tournament, TournamentStatus};
use tokio::sync::RwLock;

use crate::repositories::{
    CatchRepository, CatchUpdater, NationalRankingRepository, NationalSegmentRepository,
    StoreError, StoreResult, TournamentRepository, TournamentResultsRepository,
    UserCareerStatsRepository, UserTournamentStatsRepository,
};

/// One store backing every repository contract, so a single `Arc` can be
/// handed to the service as all of its collaborators.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tournaments: Arc<RwLock<HashMap<String, Tournament>>>,
    catches: Arc<RwLock<HashMap<String, Catch>>>,
    results: Arc<RwLock<HashMap<String, TournamentResult>>>,
    user_tournament_stats: Arc<RwLock<HashMap<(String, String), UserTournamentStats>>>,
    career_stats: Arc<RwLock<HashMap<String, UserStats>>>,
    national_entries: Arc<RwLock<HashMap<String, NationalRankingEntry>>>,
    national_order: Arc<RwLock<Vec<String>>>,
    segments: Arc<RwLock<HashMap<String, NationalRankingSegment>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_tournament(&self, tournament: Tournament) {
        self.tournaments
            .write()
            .await
            .insert(tournament.id.clone(), tournament);
    }

    pub async fn insert_catch(&self, submitted: Catch) {
        self.catches.write().await.insert(submitted.id.clone(), submitted);
    }

    pub async fn catch_by_id(&self, catch_id: &str) -> Option<Catch> {
        self.catches.read().await.get(catch_id).cloned()
    }

    pub async fn user_tournament_stats(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Option<UserTournamentStats> {
        self.user_tournament_stats
            .read()
            .await
            .get(&(user_id.to_string(), tournament_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl TournamentRepository for MemoryStore {
    async fn get(&self, tournament_id: &str) -> StoreResult<Option<Tournament>> {
        Ok(self.tournaments.read().await.get(tournament_id).cloned())
    }

    async fn set_status(&self, tournament_id: &str, status: TournamentStatus) -> StoreResult<()> {
        let mut tournaments = self.tournaments.write().await;
        let tournament = tournaments
            .get_mut(tournament_id)
            .ok_or_else(|| StoreError::NotFound(format!("tournament {tournament_id}")))?;
        tournament.status = status;
        Ok(())
    }
}

#[async_trait]
impl CatchRepository for MemoryStore {
    async fn all_for_tournament(&self, tournament_id: &str) -> StoreResult<Vec<Catch>> {
        let mut catches: Vec<Catch> = self
            .catches
            .read()
            .await
            .values()
            .filter(|c| c.tournament_id == tournament_id)
            .cloned()
            .collect();
        // deterministic order for map-backed storage
        catches.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(catches)
    }

    async fn approved_for_tournament(&self, tournament_id: &str) -> StoreResult<Vec<Catch>> {
        let mut catches = self.all_for_tournament(tournament_id).await?;
        catches.retain(|c| c.status == CatchStatus::Approved);
        Ok(catches)
    }
}

#[async_trait]
impl CatchUpdater for MemoryStore {
    async fn set_status(&self, catch_id: &str, status: CatchStatus) -> StoreResult<()> {
        let mut catches = self.catches.write().await;
        let submitted = catches
            .get_mut(catch_id)
            .ok_or_else(|| StoreError::NotFound(format!("catch {catch_id}")))?;
        submitted.status = status;
        Ok(())
    }

    async fn mark_replaced(&self, catch_id: &str, caused_by: &str) -> StoreResult<()> {
        let mut catches = self.catches.write().await;
        let submitted = catches
            .get_mut(catch_id)
            .ok_or_else(|| StoreError::NotFound(format!("catch {catch_id}")))?;
        submitted.status = CatchStatus::Replaced;
        submitted.replaced_because_of = Some(caused_by.to_string());
        Ok(())
    }
}

#[async_trait]
impl TournamentResultsRepository for MemoryStore {
    async fn get(&self, tournament_id: &str) -> StoreResult<Option<TournamentResult>> {
        Ok(self.results.read().await.get(tournament_id).cloned())
    }

    async fn save_or_update(&self, result: &TournamentResult) -> StoreResult<()> {
        self.results
            .write()
            .await
            .insert(result.tournament_id.clone(), result.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        tournament_id: &str,
        status: TournamentStatus,
    ) -> StoreResult<()> {
        let mut results = self.results.write().await;
        let result = results
            .get_mut(tournament_id)
            .ok_or_else(|| StoreError::NotFound(format!("results for {tournament_id}")))?;
        result.status = status;
        result.last_updated = Utc::now();
        Ok(())
    }

    async fn delete(&self, tournament_id: &str) -> StoreResult<()> {
        self.results.write().await.remove(tournament_id);
        Ok(())
    }
}

#[async_trait]
impl UserTournamentStatsRepository for MemoryStore {
    async fn save_or_update(&self, stats: &UserTournamentStats) -> StoreResult<()> {
        self.user_tournament_stats.write().await.insert(
            (stats.user_id.clone(), stats.tournament_id.clone()),
            stats.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl UserCareerStatsRepository for MemoryStore {
    async fn get(&self, user_id: &str) -> StoreResult<Option<UserStats>> {
        Ok(self.career_stats.read().await.get(user_id).cloned())
    }

    async fn save_or_update(&self, stats: &UserStats) -> StoreResult<()> {
        self.career_stats
            .write()
            .await
            .insert(stats.user_id.clone(), stats.clone());
        Ok(())
    }

    async fn initialize(&self, user_id: &str) -> StoreResult<UserStats> {
        let stats = UserStats::zeroed(user_id, Utc::now());
        self.career_stats
            .write()
            .await
            .insert(user_id.to_string(), stats.clone());
        Ok(stats)
    }
}

#[async_trait]
impl NationalRankingRepository for MemoryStore {
    async fn get_all(&self) -> StoreResult<Vec<NationalRankingEntry>> {
        let entries = self.national_entries.read().await;
        let order = self.national_order.read().await;

        let mut all: Vec<NationalRankingEntry> = order
            .iter()
            .filter_map(|user_id| entries.get(user_id).cloned())
            .collect();
        // entries merged since the last bulk save come after the ordered set
        for (user_id, entry) in entries.iter() {
            if !order.contains(user_id) {
                all.push(entry.clone());
            }
        }
        Ok(all)
    }

    async fn get_by_user(&self, user_id: &str) -> StoreResult<Option<NationalRankingEntry>> {
        Ok(self.national_entries.read().await.get(user_id).cloned())
    }

    async fn save_or_update(&self, entry: &NationalRankingEntry) -> StoreResult<()> {
        self.national_entries
            .write()
            .await
            .insert(entry.user_id.clone(), entry.clone());
        Ok(())
    }

    async fn save_all(&self, entries: &[NationalRankingEntry]) -> StoreResult<()> {
        let mut stored = self.national_entries.write().await;
        let mut order = self.national_order.write().await;
        stored.clear();
        order.clear();
        for entry in entries {
            order.push(entry.user_id.clone());
            stored.insert(entry.user_id.clone(), entry.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl NationalSegmentRepository for MemoryStore {
    async fn get(&self, segment_id: &SegmentId) -> StoreResult<Option<NationalRankingSegment>> {
        Ok(self.segments.read().await.get(&segment_id.to_string()).cloned())
    }

    async fn save_or_update(&self, segment: &NationalRankingSegment) -> StoreResult<()> {
        self.segments
            .write()
            .await
            .insert(segment.id.to_string(), segment.clone());
        Ok(())
    }

    async fn delete(&self, segment_id: &SegmentId) -> StoreResult<()> {
        self.segments.write().await.remove(&segment_id.to_string());
        Ok(())
    }
}
