//! Orchestrates ranking passes over the repository collaborators: live
//! leaderboard updates while a tournament runs, quota enforcement, the
//! finalization state machine, and the national/career aggregation that
//! follows it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};

use fishrank_core::calculator;
use fishrank_core::national::{
    calculate_base_national_points, calculate_tournament_weight, sort_national_entries,
    BiggestFishOfYearRecord, CareerBiggestFish, NationalRankingEntry, NationalRankingSegment,
    SegmentId, SegmentKind, MAX_SEGMENT_ENTRIES,
};
use fishrank_core::ranking::{
    Top10Result, TournamentBiggestFish, UserTournamentStats,
};
use fishrank_core::round_dp;
use fishrank_core::tournament::{numeric_min_fish_size, numeric_quota};
use fishrank_core::{
    BiggestFishRecord, Catch, CatchStatus, Tournament, TournamentResult, TournamentStatus,
    ValidCatch,
};

use crate::repositories::{
    CatchRepository, CatchUpdater, NationalRankingRepository, NationalSegmentRepository,
    StoreError, TournamentRepository, TournamentResultsRepository, UserCareerStatsRepository,
    UserTournamentStatsRepository,
};

/// Demotion cause recorded when no triggering catch is known.
pub const QUOTA_EXCEEDED_CAUSE: &str = "quota_exceeded";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not find tournament {0}")]
    TournamentNotFound(String),

    #[error("no results recorded for tournament {0}")]
    ResultsNotFound(String),

    #[error("store operation failed")]
    Store(#[from] StoreError),
}

/// Collaborators the service needs. All of them are required.
pub struct Dependencies {
    pub tournaments: Arc<dyn TournamentRepository>,
    pub catches: Arc<dyn CatchRepository>,
    pub catch_updater: Arc<dyn CatchUpdater>,
    pub results: Arc<dyn TournamentResultsRepository>,
    pub user_tournament_stats: Arc<dyn UserTournamentStatsRepository>,
    pub career_stats: Arc<dyn UserCareerStatsRepository>,
    pub national_ranking: Arc<dyn NationalRankingRepository>,
    pub national_segments: Arc<dyn NationalSegmentRepository>,
}

pub struct RankingService {
    tournaments: Arc<dyn TournamentRepository>,
    catches: Arc<dyn CatchRepository>,
    catch_updater: Arc<dyn CatchUpdater>,
    results: Arc<dyn TournamentResultsRepository>,
    user_tournament_stats: Arc<dyn UserTournamentStatsRepository>,
    career_stats: Arc<dyn UserCareerStatsRepository>,
    national_ranking: Arc<dyn NationalRankingRepository>,
    national_segments: Arc<dyn NationalSegmentRepository>,
}

impl RankingService {
    pub fn new(deps: Dependencies) -> Self {
        Self {
            tournaments: deps.tournaments,
            catches: deps.catches,
            catch_updater: deps.catch_updater,
            results: deps.results,
            user_tournament_stats: deps.user_tournament_stats,
            career_stats: deps.career_stats,
            national_ranking: deps.national_ranking,
            national_segments: deps.national_segments,
        }
    }

    /// Recomputes the live leaderboard of one tournament from scratch.
    ///
    /// No-ops when the tournament is not in a registration state. Any
    /// failure marks the results document `RankingFailed` (best effort) and
    /// propagates, so the dispatching layer can retry the whole pass.
    pub async fn update_live_results(
        &self,
        tournament_id: &str,
        triggering_catch_id: Option<&str>,
    ) -> Result<(), Error> {
        info!(
            "[{tournament_id}] live ranking pass starting, trigger: {}",
            triggering_catch_id.unwrap_or("manual")
        );

        match self.live_pass(tournament_id, triggering_catch_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("[{tournament_id}] live ranking pass failed: {err}");
                if let Err(mark_err) = self
                    .results
                    .update_status(tournament_id, TournamentStatus::RankingFailed)
                    .await
                {
                    error!("[{tournament_id}] could not mark results as failed: {mark_err}");
                }
                Err(err)
            }
        }
    }

    async fn live_pass(
        &self,
        tournament_id: &str,
        triggering_catch_id: Option<&str>,
    ) -> Result<(), Error> {
        let tournament = self
            .tournaments
            .get(tournament_id)
            .await?
            .ok_or_else(|| Error::TournamentNotFound(tournament_id.to_string()))?;

        if !tournament.status.allows_live_update() {
            info!(
                "[{tournament_id}] status is {}, skipping live update",
                tournament.status
            );
            return Ok(());
        }

        let min_size = numeric_min_fish_size(&tournament);
        let quota = numeric_quota(&tournament);
        info!("[{tournament_id}] rules: min size {min_size}cm, quota {quota}");

        let mut all_catches = self.catches.all_for_tournament(tournament_id).await?;

        let demoted = self
            .enforce_quota(&all_catches, quota, triggering_catch_id)
            .await;
        if !demoted.is_empty() {
            info!(
                "[{tournament_id}] quota enforcement replaced {} catches",
                demoted.len()
            );
            all_catches.retain(|c| !demoted.contains(&c.id));
        }

        let mut approved: Vec<Catch> = Vec::new();
        let (mut pending, mut rejected, mut replaced) = (0u32, 0u32, 0u32);
        let total_catch_count = all_catches.len() as u32;
        for c in all_catches {
            match c.status {
                CatchStatus::Approved => approved.push(c),
                CatchStatus::Pending => pending += 1,
                CatchStatus::Rejected => rejected += 1,
                CatchStatus::Replaced => replaced += 1,
            }
        }
        replaced += demoted.len() as u32;

        debug!(
            "[{tournament_id}] counts: approved {}, pending {pending}, rejected {rejected}, replaced {replaced}",
            approved.len()
        );

        let valid: Vec<ValidCatch> = approved
            .iter()
            .filter(|c| {
                if c.user_id.is_empty() {
                    warn!("[{tournament_id}] catch {} has no user, excluded", c.id);
                    return false;
                }
                let size = c.effective_size();
                size.is_finite() && size >= min_size
            })
            .map(ValidCatch::from)
            .collect();

        debug!("[{tournament_id}] {} catches valid for ranking", valid.len());

        let biggest = calculator::find_biggest_fishes(&valid);
        let ranking = calculator::calculate_ranking(&valid, quota);

        let mut participant_ids: Vec<&str> = approved
            .iter()
            .filter(|c| !c.user_id.is_empty())
            .map(|c| c.user_id.as_str())
            .collect();
        participant_ids.sort_unstable();
        participant_ids.dedup();

        let result = TournamentResult {
            tournament_id: tournament_id.to_string(),
            tournament_name: tournament.name.clone(),
            status: tournament.status,
            min_fish_size: min_size,
            minimum_fish_count: tournament.minimum_fish_count.clone(),
            ranked_participant_count: ranking.len() as u32,
            ranking,
            biggest_fish_overall: biggest.overall,
            biggest_fish_by_species: biggest.by_species,
            participant_count: participant_ids.len() as u32,
            total_catch_count,
            approved_catch_count: approved.len() as u32,
            pending_catch_count: pending,
            rejected_catch_count: rejected,
            replaced_catch_count: replaced,
            tournament_weight: None,
            last_updated: Utc::now(),
        };
        self.results.save_or_update(&result).await?;
        info!("[{tournament_id}] results saved");

        self.update_user_tournament_stats(tournament_id, &approved, &tournament.name, quota)
            .await;

        Ok(())
    }

    /// Demotes every approved catch beyond the per-user quota to `Replaced`,
    /// recording the triggering catch (or the quota sentinel) as the cause.
    ///
    /// Demotion writes run concurrently and are best effort: a failed write
    /// is logged and left for the next pass, and the full demoted-id list is
    /// returned regardless so ranking excludes those catches immediately.
    pub async fn enforce_quota(
        &self,
        all_catches: &[Catch],
        quota: usize,
        triggering_catch_id: Option<&str>,
    ) -> Vec<String> {
        let over_quota = calculator::select_over_quota(all_catches, quota);
        if over_quota.is_empty() {
            return over_quota;
        }

        let cause = triggering_catch_id.unwrap_or(QUOTA_EXCEEDED_CAUSE);
        let demotions = over_quota.iter().map(|catch_id| {
            let updater = Arc::clone(&self.catch_updater);
            async move {
                updater.mark_replaced(catch_id, cause).await.map_err(|err| {
                    error!("could not mark catch {catch_id} as replaced: {err}");
                })
            }
        });

        let outcomes = join_all(demotions).await;
        let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
        if failed > 0 {
            warn!(
                "{failed} of {} quota demotions failed, left for the next pass",
                outcomes.len()
            );
        }
        info!("marked {} catches as replaced", outcomes.len() - failed);

        over_quota
    }

    /// Recomputes each participant's per-tournament stats from the
    /// quota-clean approved catches. Saves fan out concurrently; one user's
    /// failure never blocks the others or the pass.
    async fn update_user_tournament_stats(
        &self,
        tournament_id: &str,
        approved: &[Catch],
        tournament_name: &str,
        quota: usize,
    ) {
        let mut order: Vec<&str> = Vec::new();
        let mut by_user: HashMap<&str, Vec<&Catch>> = HashMap::new();
        for c in approved {
            if c.user_id.is_empty() {
                warn!(
                    "[{tournament_id}] approved catch {} has no user, skipping stats",
                    c.id
                );
                continue;
            }
            let entry = by_user.entry(c.user_id.as_str()).or_default();
            if entry.is_empty() {
                order.push(c.user_id.as_str());
            }
            entry.push(c);
        }

        info!(
            "[{tournament_id}] updating tournament stats for {} users",
            order.len()
        );

        let now = Utc::now();
        let saves = order.into_iter().map(|user_id| {
            let mut catches = by_user.remove(user_id).unwrap_or_default();
            catches.sort_by(|a, b| b.effective_size().total_cmp(&a.effective_size()));

            let mut total_cm = 0.0;
            for c in &catches {
                let size = c.effective_size();
                if size.is_finite() {
                    total_cm += size;
                } else {
                    warn!(
                        "[{tournament_id}] catch {} has a non-numeric size, excluded from the sum",
                        c.id
                    );
                }
            }

            let biggest_fish = catches.first().map(|c| TournamentBiggestFish {
                catch_id: c.id.clone(),
                species_name: c.species_name.clone(),
                size_cm: c.effective_size(),
                catch_date: c.catch_date,
            });

            let stats = UserTournamentStats {
                tournament_id: tournament_id.to_string(),
                tournament_name: tournament_name.to_string(),
                user_id: user_id.to_string(),
                approved_catch_count: catches.len() as u32,
                total_approved_catch_cm: round_dp(total_cm, 2),
                biggest_fish,
                met_minimum_quota: catches.len() >= quota,
                last_updated: now,
            };

            let repo = Arc::clone(&self.user_tournament_stats);
            async move {
                repo.save_or_update(&stats).await.map_err(|err| {
                    error!(
                        "[{}] could not save tournament stats for user {}: {err}",
                        stats.tournament_id, stats.user_id
                    );
                })
            }
        });

        let outcomes = join_all(saves).await;
        let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
        if failed > 0 {
            warn!(
                "[{tournament_id}] tournament stats saved for {} users, {failed} failed",
                outcomes.len() - failed
            );
        } else {
            info!(
                "[{tournament_id}] tournament stats saved for all {} users",
                outcomes.len()
            );
        }
    }

    /// Finalizes a tournament: computes its weight, freezes the results,
    /// and feeds the top 10 into the national ranking and career stats.
    ///
    /// On any failure the tournament is best-effort marked `RankingFailed`
    /// and the original error propagates to the dispatching layer.
    pub async fn finalize_tournament(&self, tournament_id: &str) -> Result<(), Error> {
        warn!("[{tournament_id}] finalization starting");

        match self.finalize_pass(tournament_id).await {
            Ok(()) => {
                info!("[{tournament_id}] finalized and ranked");
                Ok(())
            }
            Err(err) => {
                error!("[{tournament_id}] finalization failed: {err}");
                if let Err(mark_err) = self
                    .tournaments
                    .set_status(tournament_id, TournamentStatus::RankingFailed)
                    .await
                {
                    error!("[{tournament_id}] could not mark tournament as failed: {mark_err}");
                }
                Err(err)
            }
        }
    }

    async fn finalize_pass(&self, tournament_id: &str) -> Result<(), Error> {
        let final_results = self
            .results
            .get(tournament_id)
            .await?
            .ok_or_else(|| Error::ResultsNotFound(tournament_id.to_string()))?;

        let tournament = self
            .tournaments
            .get(tournament_id)
            .await?
            .ok_or_else(|| Error::TournamentNotFound(tournament_id.to_string()))?;

        if !tournament.status.can_transition_to(TournamentStatus::Finalizing) {
            warn!(
                "[{tournament_id}] finalizing from unexpected status {}",
                tournament.status
            );
        }
        self.tournaments
            .set_status(tournament_id, TournamentStatus::Finalizing)
            .await?;

        let quota = numeric_quota(&tournament);
        let min_size = numeric_min_fish_size(&tournament);
        let weight = calculate_tournament_weight(quota, min_size);
        info!("[{tournament_id}] tournament weight {weight}");

        let mut finalized = final_results.clone();
        finalized.tournament_weight = Some(weight);
        finalized.status = TournamentStatus::FinalizedRanked;
        finalized.last_updated = Utc::now();
        self.results.save_or_update(&finalized).await?;

        let total_ranked = final_results.ranking.len() as u32;
        let top10: Vec<Top10Result> = final_results
            .ranking
            .iter()
            .take(10)
            .map(|participant| Top10Result {
                user_id: participant.user_id.clone(),
                tournament_id: tournament_id.to_string(),
                position: participant.position,
                total_ranked_participants: total_ranked,
            })
            .collect();

        let mut biggest_fish_records: Vec<BiggestFishRecord> = Vec::new();
        if let Some(overall) = final_results.biggest_fish_overall.clone() {
            biggest_fish_records.push(overall);
        }
        biggest_fish_records.extend(final_results.biggest_fish_by_species.values().cloned());

        self.update_national_ranking(&top10, &biggest_fish_records, &tournament)
            .await?;

        self.tournaments
            .set_status(tournament_id, TournamentStatus::FinalizedRanked)
            .await?;

        Ok(())
    }

    /// Merges a finalized tournament's top 10 into the cumulative national
    /// ranking, the year segments, and each user's career stats.
    pub async fn update_national_ranking(
        &self,
        top10: &[Top10Result],
        biggest_fish_records: &[BiggestFishRecord],
        tournament: &Tournament,
    ) -> Result<(), Error> {
        info!("[{}] updating national rankings", tournament.id);

        let weight = self
            .results
            .get(&tournament.id)
            .await?
            .and_then(|result| result.tournament_weight)
            .unwrap_or(1.0);

        let earned: Vec<NationalRankingEntry> = top10
            .iter()
            .map(|item| {
                let base =
                    calculate_base_national_points(item.position, item.total_ranked_participants);
                let points = round_dp(base * weight, 2);
                NationalRankingEntry {
                    user_id: item.user_id.clone(),
                    total_points: points,
                    first_places: u32::from(item.position == 1),
                    podiums: u32::from(item.position <= 3),
                    top10_finishes: 1,
                    best_single_tournament_score: points,
                    tournaments_participated: vec![tournament.id.clone()],
                }
            })
            .collect();

        // merge each user, then resort and rewrite the whole set
        for entry in &earned {
            let merged = match self.national_ranking.get_by_user(&entry.user_id).await? {
                Some(mut existing) => {
                    existing.absorb(entry);
                    existing
                }
                None => entry.clone(),
            };
            self.national_ranking.save_or_update(&merged).await?;
        }

        let mut all_entries = self.national_ranking.get_all().await?;
        sort_national_entries(&mut all_entries);
        self.national_ranking.save_all(&all_entries).await?;
        info!(
            "[{}] {} entries saved and sorted in the national ranking",
            tournament.id,
            all_entries.len()
        );

        self.update_career_stats(top10, biggest_fish_records, tournament)
            .await;

        let year = tournament.start_date.year();
        for kind in [
            SegmentKind::Overall,
            SegmentKind::Modality(tournament.modality),
        ] {
            self.upsert_segment(SegmentId { year, kind }, &earned, biggest_fish_records, tournament)
                .await?;
        }

        info!("[{}] national rankings updated", tournament.id);
        Ok(())
    }

    async fn upsert_segment(
        &self,
        segment_id: SegmentId,
        earned: &[NationalRankingEntry],
        biggest_fish_records: &[BiggestFishRecord],
        tournament: &Tournament,
    ) -> Result<(), Error> {
        let now = Utc::now();
        let mut segment = self
            .national_segments
            .get(&segment_id)
            .await?
            .unwrap_or_else(|| NationalRankingSegment::empty(segment_id, now));

        for entry in earned {
            match segment
                .entries
                .iter_mut()
                .find(|existing| existing.user_id == entry.user_id)
            {
                Some(existing) => existing.absorb(entry),
                None => segment.entries.push(entry.clone()),
            }
        }

        sort_national_entries(&mut segment.entries);
        segment.entries.truncate(MAX_SEGMENT_ENTRIES);

        for record in biggest_fish_records {
            let current = segment.biggest_fish_of_year_by_species.get(&record.species_name);
            if current.map_or(true, |existing| record.size_cm > existing.size_cm) {
                segment.biggest_fish_of_year_by_species.insert(
                    record.species_name.clone(),
                    BiggestFishOfYearRecord {
                        user_id: record.user_id.clone(),
                        size_cm: record.size_cm,
                        tournament_id: tournament.id.clone(),
                        catch_date: record.catch_date,
                    },
                );
            }
        }

        segment.last_updated = now;
        self.national_segments.save_or_update(&segment).await?;
        info!(
            "[{}] segment {segment_id} saved with {} entries",
            tournament.id,
            segment.entries.len()
        );

        Ok(())
    }

    /// Bumps career counters for every top-10 user. Updates fan out
    /// concurrently and failures are isolated per user.
    async fn update_career_stats(
        &self,
        top10: &[Top10Result],
        biggest_fish_records: &[BiggestFishRecord],
        tournament: &Tournament,
    ) {
        info!(
            "[{}] updating career stats for {} users",
            tournament.id,
            top10.len()
        );

        let mut best_by_user: HashMap<&str, &BiggestFishRecord> = HashMap::new();
        for record in biggest_fish_records {
            match best_by_user.get(record.user_id.as_str()) {
                Some(existing) if record.size_cm <= existing.size_cm => {}
                _ => {
                    best_by_user.insert(record.user_id.as_str(), record);
                }
            }
        }

        let tournament_date = tournament.start_date;
        let updates = top10.iter().map(|placed| {
            let repo = Arc::clone(&self.career_stats);
            let record = best_by_user.get(placed.user_id.as_str()).copied();
            let tournament_id = tournament.id.clone();
            async move {
                let outcome: Result<(), StoreError> = async {
                    let mut career = match repo.get(&placed.user_id).await? {
                        Some(stats) => stats,
                        None => repo.initialize(&placed.user_id).await?,
                    };

                    career.tournaments_participated_count += 1;
                    if placed.position <= 10 {
                        career.top10_finishes += 1;
                    }
                    if placed.position <= 3 {
                        career.top3_finishes += 1;
                    }
                    if placed.position == 1 {
                        career.championships += 1;
                    }
                    career.last_tournament_date = Some(tournament_date);
                    if career.first_tournament_date.is_none() {
                        career.first_tournament_date = Some(tournament_date);
                    }

                    if let Some(record) = record {
                        let bigger = career
                            .biggest_fish_ever
                            .as_ref()
                            .map_or(true, |current| record.size_cm > current.size_cm);
                        if bigger {
                            career.biggest_fish_ever = Some(CareerBiggestFish {
                                size_cm: record.size_cm,
                                species_name: record.species_name.clone(),
                                tournament_id: tournament_id.clone(),
                                catch_id: record.catch_id.clone(),
                                catch_date: record.catch_date,
                            });
                        }
                    }

                    career.last_updated = Utc::now();
                    repo.save_or_update(&career).await
                }
                .await;

                outcome.map_err(|err| {
                    error!(
                        "[{tournament_id}] could not update career stats for user {}: {err}",
                        placed.user_id
                    );
                })
            }
        });

        let outcomes = join_all(updates).await;
        let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
        if failed > 0 {
            warn!(
                "[{}] career stats updated with {failed} failures",
                tournament.id
            );
        } else {
            info!(
                "[{}] career stats updated for all {} users",
                tournament.id,
                outcomes.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use approx::assert_ulps_eq;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use fishrank_core::national::UserStats;
    use fishrank_core::Modality;

    use crate::memory::MemoryStore;
    use crate::repositories::StoreResult;

    use super::*;

    fn may(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, day, hour, 0, 0).unwrap()
    }

    fn tournament(id: &str, min_fish_size: &str, minimum_fish_count: &str) -> Tournament {
        Tournament {
            id: id.to_string(),
            name: format!("Copa {id}"),
            start_date: may(10, 8),
            end_date: may(11, 18),
            min_fish_size: min_fish_size.to_string(),
            minimum_fish_count: minimum_fish_count.to_string(),
            modality: Modality::Kayak,
            status: TournamentStatus::RegistrationOpen,
            organizer_id: "org-1".to_string(),
            is_official: true,
            allowed_species: vec![],
        }
    }

    fn approved_catch(id: &str, tournament_id: &str, user_id: &str, species: &str, size: f64) -> Catch {
        Catch {
            id: id.to_string(),
            tournament_id: tournament_id.to_string(),
            user_id: user_id.to_string(),
            species_name: species.to_string(),
            length_cm: size,
            size_adjustment: None,
            status: CatchStatus::Approved,
            catch_date: may(10, 10),
            submitted_at: may(10, 11),
            validated_at: Some(may(10, 12)),
            rejection_reason: None,
            replaced_because_of: None,
        }
    }

    fn empty_result(tournament_id: &str) -> TournamentResult {
        TournamentResult {
            tournament_id: tournament_id.to_string(),
            tournament_name: format!("Copa {tournament_id}"),
            status: TournamentStatus::RegistrationOpen,
            min_fish_size: 0.0,
            minimum_fish_count: "3".to_string(),
            ranking: vec![],
            biggest_fish_overall: None,
            biggest_fish_by_species: BTreeMap::new(),
            participant_count: 0,
            ranked_participant_count: 0,
            total_catch_count: 0,
            approved_catch_count: 0,
            pending_catch_count: 0,
            rejected_catch_count: 0,
            replaced_catch_count: 0,
            tournament_weight: None,
            last_updated: Utc::now(),
        }
    }

    fn national_entry(user_id: &str, total_points: f64) -> NationalRankingEntry {
        NationalRankingEntry {
            user_id: user_id.to_string(),
            total_points,
            first_places: 0,
            podiums: 0,
            top10_finishes: 1,
            best_single_tournament_score: total_points,
            tournaments_participated: vec!["past".to_string()],
        }
    }

    fn service_with_career(
        store: Arc<MemoryStore>,
        career_stats: Arc<dyn UserCareerStatsRepository>,
    ) -> RankingService {
        RankingService::new(Dependencies {
            tournaments: store.clone(),
            catches: store.clone(),
            catch_updater: store.clone(),
            results: store.clone(),
            user_tournament_stats: store.clone(),
            career_stats,
            national_ranking: store.clone(),
            national_segments: store,
        })
    }

    fn service_with(store: Arc<MemoryStore>) -> RankingService {
        service_with_career(store.clone(), store)
    }

    async fn results_for(store: &MemoryStore, tournament_id: &str) -> Option<TournamentResult> {
        TournamentResultsRepository::get(store, tournament_id)
            .await
            .unwrap()
    }

    /// Delegates to the memory store but refuses to save one user's career.
    struct FlakyCareerStats {
        inner: Arc<MemoryStore>,
        fail_for: String,
    }

    #[async_trait]
    impl UserCareerStatsRepository for FlakyCareerStats {
        async fn get(&self, user_id: &str) -> StoreResult<Option<UserStats>> {
            UserCareerStatsRepository::get(&*self.inner, user_id).await
        }

        async fn save_or_update(&self, stats: &UserStats) -> StoreResult<()> {
            if stats.user_id == self.fail_for {
                return Err(StoreError::Backend("career store offline".to_string()));
            }
            UserCareerStatsRepository::save_or_update(&*self.inner, stats).await
        }

        async fn initialize(&self, user_id: &str) -> StoreResult<UserStats> {
            self.inner.initialize(user_id).await
        }
    }

    #[tokio::test]
    async fn live_pass_computes_ranking_counts_and_stats() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tournament(tournament("t1", "20", "3")).await;
        store.insert_catch(approved_catch("c1", "t1", "alice", "Dourado", 50.0)).await;
        store.insert_catch(approved_catch("c2", "t1", "alice", "Dourado", 40.0)).await;
        store.insert_catch(approved_catch("c3", "t1", "alice", "Pintado", 30.0)).await;
        let mut pending = approved_catch("c4", "t1", "bob", "Dourado", 45.0);
        pending.status = CatchStatus::Pending;
        store.insert_catch(pending).await;

        let service = service_with(store.clone());
        service.update_live_results("t1", Some("c3")).await.unwrap();

        let result = results_for(&store, "t1").await.unwrap();
        assert_eq!(result.ranking.len(), 1);
        let alice = &result.ranking[0];
        assert_eq!(alice.position, 1);
        assert_eq!(alice.average_size, 40.0);
        assert!(alice.met_minimum_quota);

        assert_eq!(result.approved_catch_count, 3);
        assert_eq!(result.pending_catch_count, 1);
        assert_eq!(result.rejected_catch_count, 0);
        assert_eq!(result.replaced_catch_count, 0);
        assert_eq!(result.participant_count, 1);
        assert_eq!(result.ranked_participant_count, 1);
        assert_eq!(result.biggest_fish_overall.as_ref().unwrap().size_cm, 50.0);
        assert!(result.tournament_weight.is_none());

        let stats = store.user_tournament_stats("alice", "t1").await.unwrap();
        assert_eq!(stats.approved_catch_count, 3);
        assert_eq!(stats.total_approved_catch_cm, 120.0);
        assert_eq!(stats.biggest_fish.as_ref().unwrap().size_cm, 50.0);
        assert!(stats.met_minimum_quota);
        assert!(store.user_tournament_stats("bob", "t1").await.is_none());
    }

    #[tokio::test]
    async fn live_pass_demotes_over_quota_catches_before_ranking() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tournament(tournament("t1", "10", "3")).await;
        store.insert_catch(approved_catch("c1", "t1", "alice", "Dourado", 50.0)).await;
        store.insert_catch(approved_catch("c2", "t1", "alice", "Dourado", 40.0)).await;
        store.insert_catch(approved_catch("c3", "t1", "alice", "Dourado", 30.0)).await;
        store.insert_catch(approved_catch("c4", "t1", "alice", "Dourado", 20.0)).await;

        let service = service_with(store.clone());
        service.update_live_results("t1", Some("c1")).await.unwrap();

        let demoted = store.catch_by_id("c4").await.unwrap();
        assert_eq!(demoted.status, CatchStatus::Replaced);
        assert_eq!(demoted.replaced_because_of.as_deref(), Some("c1"));

        let result = results_for(&store, "t1").await.unwrap();
        assert_eq!(result.replaced_catch_count, 1);
        assert_eq!(result.approved_catch_count, 3);
        assert_eq!(result.ranking[0].number_of_valid_catches, 3);
        assert_eq!(result.ranking[0].average_size, 40.0);

        let stats = store.user_tournament_stats("alice", "t1").await.unwrap();
        assert_eq!(stats.approved_catch_count, 3);
    }

    #[tokio::test]
    async fn quota_sentinel_is_recorded_without_a_trigger() {
        let store = Arc::new(MemoryStore::new());
        let catches = vec![
            approved_catch("c1", "t1", "alice", "Dourado", 50.0),
            approved_catch("c2", "t1", "alice", "Dourado", 40.0),
        ];
        for c in &catches {
            store.insert_catch(c.clone()).await;
        }

        let service = service_with(store.clone());
        let demoted = service.enforce_quota(&catches, 1, None).await;

        assert_eq!(demoted, ["c2"]);
        let updated = store.catch_by_id("c2").await.unwrap();
        assert_eq!(updated.replaced_because_of.as_deref(), Some(QUOTA_EXCEEDED_CAUSE));
    }

    #[tokio::test]
    async fn live_update_skips_tournaments_outside_registration() {
        let store = Arc::new(MemoryStore::new());
        let mut closed = tournament("t1", "20", "3");
        closed.status = TournamentStatus::Closed;
        store.insert_tournament(closed).await;
        store.insert_catch(approved_catch("c1", "t1", "alice", "Dourado", 50.0)).await;

        let service = service_with(store.clone());
        service.update_live_results("t1", None).await.unwrap();

        assert!(results_for(&store, "t1").await.is_none());
    }

    #[tokio::test]
    async fn missing_tournament_fails_the_pass_and_marks_results() {
        let store = Arc::new(MemoryStore::new());
        TournamentResultsRepository::save_or_update(&*store, &empty_result("t1"))
            .await
            .unwrap();

        let service = service_with(store.clone());
        let err = service.update_live_results("t1", None).await.unwrap_err();

        assert!(matches!(err, Error::TournamentNotFound(_)));
        let result = results_for(&store, "t1").await.unwrap();
        assert_eq!(result.status, TournamentStatus::RankingFailed);
    }

    #[tokio::test]
    async fn min_size_gates_ranking_but_not_user_stats() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tournament(tournament("t1", "30", "1")).await;
        store.insert_catch(approved_catch("c1", "t1", "alice", "Dourado", 40.0)).await;
        store.insert_catch(approved_catch("c2", "t1", "alice", "Dourado", 20.0)).await;

        let service = service_with(store.clone());
        service.update_live_results("t1", None).await.unwrap();

        let result = results_for(&store, "t1").await.unwrap();
        assert_eq!(result.ranking[0].number_of_valid_catches, 1);

        let stats = store.user_tournament_stats("alice", "t1").await.unwrap();
        assert_eq!(stats.approved_catch_count, 2);
        assert_eq!(stats.total_approved_catch_cm, 60.0);
    }

    #[tokio::test]
    async fn size_adjustment_counts_toward_the_minimum() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tournament(tournament("t1", "30", "1")).await;
        let mut adjusted = approved_catch("c1", "t1", "alice", "Dourado", 25.0);
        adjusted.size_adjustment = Some(35.0);
        store.insert_catch(adjusted).await;

        let service = service_with(store.clone());
        service.update_live_results("t1", None).await.unwrap();

        let result = results_for(&store, "t1").await.unwrap();
        assert_eq!(result.ranking.len(), 1);
        assert_eq!(result.ranking[0].average_size, 35.0);
    }

    #[tokio::test]
    async fn finalize_updates_results_national_career_and_segments() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tournament(tournament("t1", "30", "3")).await;
        store.insert_catch(approved_catch("c1", "t1", "alice", "Dourado", 50.0)).await;
        store.insert_catch(approved_catch("c2", "t1", "alice", "Dourado", 45.0)).await;
        store.insert_catch(approved_catch("c3", "t1", "alice", "Pintado", 40.0)).await;
        store.insert_catch(approved_catch("c4", "t1", "bob", "Dourado", 40.0)).await;
        store.insert_catch(approved_catch("c5", "t1", "bob", "Dourado", 38.0)).await;
        store.insert_catch(approved_catch("c6", "t1", "bob", "Pintado", 36.0)).await;
        store.insert_catch(approved_catch("c7", "t1", "carol", "Dourado", 60.0)).await;

        let service = service_with(store.clone());
        service.update_live_results("t1", None).await.unwrap();
        TournamentRepository::set_status(&*store, "t1", TournamentStatus::Closed)
            .await
            .unwrap();

        service.finalize_tournament("t1").await.unwrap();

        let finalized = TournamentRepository::get(&*store, "t1").await.unwrap().unwrap();
        assert_eq!(finalized.status, TournamentStatus::FinalizedRanked);

        let result = results_for(&store, "t1").await.unwrap();
        assert_eq!(result.status, TournamentStatus::FinalizedRanked);
        assert_eq!(result.tournament_weight, Some(1.0));

        // alice won a field of three: 100 + 3/3 national points at weight 1.0
        let national = store.get_all().await.unwrap();
        assert_eq!(national.len(), 3);
        assert_eq!(national[0].user_id, "alice");
        assert_ulps_eq!(national[0].total_points, 101.0, max_ulps = 4);
        assert_eq!(national[0].first_places, 1);
        assert_eq!(national[1].user_id, "bob");
        assert_ulps_eq!(national[1].total_points, 90.67, max_ulps = 4);
        assert_eq!(national[2].user_id, "carol");
        assert_ulps_eq!(national[2].total_points, 80.33, max_ulps = 4);

        let alice = UserCareerStatsRepository::get(&*store, "alice").await.unwrap().unwrap();
        assert_eq!(alice.championships, 1);
        assert_eq!(alice.top3_finishes, 1);
        assert_eq!(alice.top10_finishes, 1);
        assert_eq!(alice.tournaments_participated_count, 1);
        assert_eq!(alice.first_tournament_date, Some(may(10, 8)));

        // carol's 60cm Dourado is the tournament record and her career best
        let carol = UserCareerStatsRepository::get(&*store, "carol").await.unwrap().unwrap();
        assert_eq!(carol.biggest_fish_ever.as_ref().unwrap().size_cm, 60.0);

        for kind in [SegmentKind::Overall, SegmentKind::Modality(Modality::Kayak)] {
            let id = SegmentId { year: 2025, kind };
            let segment = NationalSegmentRepository::get(&*store, &id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(segment.entries.len(), 3);
            assert_eq!(segment.entries[0].user_id, "alice");
            assert_eq!(
                segment.biggest_fish_of_year_by_species["Dourado"].size_cm,
                60.0
            );
        }
    }

    #[tokio::test]
    async fn finalize_without_results_marks_the_tournament_failed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tournament(tournament("t1", "30", "3")).await;

        let service = service_with(store.clone());
        let err = service.finalize_tournament("t1").await.unwrap_err();

        assert!(matches!(err, Error::ResultsNotFound(_)));
        let failed = TournamentRepository::get(&*store, "t1").await.unwrap().unwrap();
        assert_eq!(failed.status, TournamentStatus::RankingFailed);
    }

    #[tokio::test]
    async fn career_and_national_points_accumulate_across_tournaments() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone());

        for id in ["t1", "t2"] {
            // quota 1 with min size 30 weighs 0.8
            store.insert_tournament(tournament(id, "30", "1")).await;
            store
                .insert_catch(approved_catch(&format!("{id}-c1"), id, "alice", "Dourado", 55.0))
                .await;
            service.update_live_results(id, None).await.unwrap();
            TournamentRepository::set_status(&*store, id, TournamentStatus::Closed)
                .await
                .unwrap();
            service.finalize_tournament(id).await.unwrap();
        }

        let alice = UserCareerStatsRepository::get(&*store, "alice").await.unwrap().unwrap();
        assert_eq!(alice.championships, 2);
        assert_eq!(alice.tournaments_participated_count, 2);

        let entry = store.get_by_user("alice").await.unwrap().unwrap();
        assert_ulps_eq!(entry.total_points, 161.6, max_ulps = 4);
        assert_ulps_eq!(entry.best_single_tournament_score, 80.8, max_ulps = 4);
        assert_eq!(entry.first_places, 2);
        assert_eq!(entry.tournaments_participated, ["t1", "t2"]);
    }

    #[tokio::test]
    async fn one_users_career_failure_does_not_abort_finalization() {
        let store = Arc::new(MemoryStore::new());
        let career = Arc::new(FlakyCareerStats {
            inner: store.clone(),
            fail_for: "bob".to_string(),
        });
        let service = service_with_career(store.clone(), career);

        store.insert_tournament(tournament("t1", "30", "1")).await;
        store.insert_catch(approved_catch("c1", "t1", "alice", "Dourado", 55.0)).await;
        store.insert_catch(approved_catch("c2", "t1", "bob", "Dourado", 45.0)).await;
        service.update_live_results("t1", None).await.unwrap();
        TournamentRepository::set_status(&*store, "t1", TournamentStatus::Closed)
            .await
            .unwrap();

        service.finalize_tournament("t1").await.unwrap();

        let alice = UserCareerStatsRepository::get(&*store, "alice").await.unwrap().unwrap();
        assert_eq!(alice.championships, 1);

        // bob's update failed after initialization, leaving zeroed counters
        let bob = UserCareerStatsRepository::get(&*store, "bob").await.unwrap().unwrap();
        assert_eq!(bob.tournaments_participated_count, 0);

        let finalized = TournamentRepository::get(&*store, "t1").await.unwrap().unwrap();
        assert_eq!(finalized.status, TournamentStatus::FinalizedRanked);
    }

    #[tokio::test]
    async fn segments_are_truncated_to_the_top_hundred() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone());

        let id = SegmentId {
            year: 2025,
            kind: SegmentKind::Overall,
        };
        let mut segment = NationalRankingSegment::empty(id, Utc::now());
        for i in 0..150 {
            segment
                .entries
                .push(national_entry(&format!("angler-{i:03}"), i as f64 * 0.5));
        }
        NationalSegmentRepository::save_or_update(&*store, &segment)
            .await
            .unwrap();

        let top10 = vec![Top10Result {
            user_id: "newcomer".to_string(),
            tournament_id: "t1".to_string(),
            position: 1,
            total_ranked_participants: 12,
        }];
        service
            .update_national_ranking(&top10, &[], &tournament("t1", "30", "3"))
            .await
            .unwrap();

        let saved = NationalSegmentRepository::get(&*store, &id).await.unwrap().unwrap();
        assert_eq!(saved.entries.len(), 100);
        assert_eq!(saved.entries[0].user_id, "newcomer");
    }
}
