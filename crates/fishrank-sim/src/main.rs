#![forbid(unsafe_code)]

//! Replays a season scenario against in-memory stores: one live ranking
//! pass per tournament, then closure and finalization, printing the
//! leaderboards and the resulting national ranking. Stands in for the
//! event-dispatch layer that drives the service in production.

mod scenario;

use std::collections::BTreeSet;
use std::{env, fs, sync::Arc};

use chrono::Datelike;
use dotenvy::dotenv;
use eyre::{Result, WrapErr};
use log::info;

use fishrank_core::national::{SegmentId, SegmentKind};
use fishrank_core::{Modality, TournamentStatus};
use fishrank_service::memory::MemoryStore;
use fishrank_service::repositories::{
    NationalRankingRepository, NationalSegmentRepository, TournamentRepository,
    TournamentResultsRepository,
};
use fishrank_service::{Dependencies, RankingService};

use crate::scenario::Scenario;

const DEFAULT_SCENARIO: &str = "crates/fishrank-sim/scenarios/season.ron";

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init_timed();
    dotenv().ok();

    run().await.wrap_err("failed to run the season simulation")
}

async fn run() -> Result<()> {
    let path = env::args()
        .nth(1)
        .or_else(|| env::var("SCENARIO").ok())
        .unwrap_or_else(|| DEFAULT_SCENARIO.to_string());

    info!("loading scenario from {path}");
    let raw = fs::read_to_string(&path)
        .wrap_err_with(|| format!("could not read scenario file {path}"))?;
    let scenario: Scenario = ron::from_str(&raw).wrap_err("could not parse scenario")?;

    let store = Arc::new(MemoryStore::new());
    let service = RankingService::new(Dependencies {
        tournaments: store.clone(),
        catches: store.clone(),
        catch_updater: store.clone(),
        results: store.clone(),
        user_tournament_stats: store.clone(),
        career_stats: store.clone(),
        national_ranking: store.clone(),
        national_segments: store.clone(),
    });

    let mut tournament_ids = Vec::new();
    let mut segment_ids: BTreeSet<(i32, Option<Modality>)> = BTreeSet::new();
    for seed in scenario.tournaments {
        tournament_ids.push(seed.id.clone());
        let tournament = seed.into_tournament();
        segment_ids.insert((tournament.start_date.year(), None));
        segment_ids.insert((tournament.start_date.year(), Some(tournament.modality)));
        store.insert_tournament(tournament).await;
    }
    for seed in scenario.catches {
        store.insert_catch(seed.into_catch()).await;
    }

    for id in &tournament_ids {
        service
            .update_live_results(id, None)
            .await
            .wrap_err_with(|| format!("live ranking pass failed for {id}"))?;
        print_leaderboard(&store, id).await?;
    }

    for id in &tournament_ids {
        TournamentRepository::set_status(&*store, id, TournamentStatus::Closed).await?;
        service
            .finalize_tournament(id)
            .await
            .wrap_err_with(|| format!("finalization failed for {id}"))?;
    }

    print_national_ranking(&store).await?;
    for (year, modality) in segment_ids {
        print_segment(&store, year, modality).await?;
    }

    Ok(())
}

async fn print_leaderboard(store: &MemoryStore, tournament_id: &str) -> Result<()> {
    let result = TournamentResultsRepository::get(store, tournament_id)
        .await?
        .ok_or_else(|| eyre::eyre!("no results for tournament {tournament_id}"))?;

    println!();
    println!("=== {} ({tournament_id}) ===", result.tournament_name);
    println!(
        "catches: {} approved, {} pending, {} rejected, {} replaced",
        result.approved_catch_count,
        result.pending_catch_count,
        result.rejected_catch_count,
        result.replaced_catch_count
    );
    for participant in &result.ranking {
        println!(
            "{:>3}. {:<12} avg {:>7.2}cm  best {:>6.1}cm  {} catches{}",
            participant.position,
            participant.user_id,
            participant.average_size,
            participant.biggest_single_fish_size,
            participant.number_of_valid_catches,
            if participant.met_minimum_quota {
                ""
            } else {
                "  (below quota)"
            }
        );
    }
    if let Some(record) = &result.biggest_fish_overall {
        println!(
            "biggest fish: {} at {:.1}cm by {}",
            record.species_name, record.size_cm, record.user_id
        );
    }

    Ok(())
}

async fn print_national_ranking(store: &MemoryStore) -> Result<()> {
    let entries = store.get_all().await?;

    if env::var("REPORT").as_deref() == Ok("json") {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!();
    println!("=== National ranking ===");
    for (index, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}. {:<12} {:>8.2} pts  {} wins, {} podiums, {} top-10s over {} tournaments",
            index + 1,
            entry.user_id,
            entry.total_points,
            entry.first_places,
            entry.podiums,
            entry.top10_finishes,
            entry.tournaments_participated.len()
        );
    }

    Ok(())
}

async fn print_segment(store: &MemoryStore, year: i32, modality: Option<Modality>) -> Result<()> {
    let kind = modality.map_or(SegmentKind::Overall, SegmentKind::Modality);
    let segment_id = SegmentId { year, kind };
    let Some(segment) = NationalSegmentRepository::get(store, &segment_id).await? else {
        return Ok(());
    };

    println!();
    println!("=== Segment {segment_id} ===");
    for (index, entry) in segment.entries.iter().take(10).enumerate() {
        println!(
            "{:>3}. {:<12} {:>8.2} pts",
            index + 1,
            entry.user_id,
            entry.total_points
        );
    }
    for (species, record) in &segment.biggest_fish_of_year_by_species {
        println!(
            "biggest {species} of the year: {:.1}cm by {}",
            record.size_cm, record.user_id
        );
    }

    Ok(())
}
