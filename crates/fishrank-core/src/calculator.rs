//! Pure ranking computations: biggest-fish records, the tournament ranking
//! itself, and quota-demotion selection. Everything here depends only on
//! its inputs; persistence is the service layer's problem.

use std::collections::BTreeMap;
use std::collections::HashMap;

use log::{debug, warn};

use crate::catch::{Catch, CatchStatus, ValidCatch};
use crate::ranking::{BiggestFishRecord, RankedParticipant, TopCatch};
use crate::round_dp;

/// Biggest-fish records for one tournament.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BiggestFishes {
    pub overall: Option<BiggestFishRecord>,
    pub by_species: BTreeMap<String, BiggestFishRecord>,
}

/// Scans the valid catches once, tracking the overall maximum and the
/// maximum per species. Comparison is strict, so the first catch to reach a
/// size keeps the record.
pub fn find_biggest_fishes(valid_catches: &[ValidCatch]) -> BiggestFishes {
    let mut biggest = BiggestFishes::default();

    for fish in valid_catches {
        if biggest
            .overall
            .as_ref()
            .map_or(true, |record| fish.size_cm > record.size_cm)
        {
            biggest.overall = Some(record_for(fish));
        }

        let current = biggest.by_species.get(&fish.species_name);
        if current.map_or(true, |record| fish.size_cm > record.size_cm) {
            biggest
                .by_species
                .insert(fish.species_name.clone(), record_for(fish));
        }
    }

    debug!(
        "biggest fishes: overall {:?}cm over {} species",
        biggest.overall.as_ref().map(|record| record.size_cm),
        biggest.by_species.len()
    );
    biggest
}

fn record_for(fish: &ValidCatch) -> BiggestFishRecord {
    BiggestFishRecord {
        user_id: fish.user_id.clone(),
        species_name: fish.species_name.clone(),
        size_cm: fish.size_cm,
        catch_id: fish.catch_id.clone(),
        catch_date: fish.catch_date,
    }
}

struct ParticipantData<'a> {
    user_id: &'a str,
    catches: Vec<&'a ValidCatch>,
    quota_met: bool,
    average_size: f64,
    biggest_single_fish_size: f64,
    total_size: f64,
}

/// Computes the full tournament ranking from the valid catches.
///
/// Participants who met the quota are ranked by quota-average size, then
/// biggest single fish, and always ahead of participants below the quota,
/// who are ranked by catch count, then total size, then biggest single
/// fish. Sorting is stable, so participants equal on every criterion keep
/// their input order. Positions are contiguous from 1.
pub fn calculate_ranking(valid_catches: &[ValidCatch], quota: usize) -> Vec<RankedParticipant> {
    if valid_catches.is_empty() {
        return Vec::new();
    }

    // group by user, preserving first-occurrence order
    let mut order: Vec<&str> = Vec::new();
    let mut by_user: HashMap<&str, Vec<&ValidCatch>> = HashMap::new();
    for c in valid_catches {
        if c.user_id.is_empty() {
            warn!("catch {} has no user, excluded from ranking", c.catch_id);
            continue;
        }
        let entry = by_user.entry(c.user_id.as_str()).or_default();
        if entry.is_empty() {
            order.push(c.user_id.as_str());
        }
        entry.push(c);
    }

    let participants: Vec<ParticipantData<'_>> = order
        .into_iter()
        .map(|user_id| {
            let mut catches = by_user.remove(user_id).unwrap_or_default();
            catches.sort_by(|a, b| b.size_cm.total_cmp(&a.size_cm));

            let quota_met = catches.len() >= quota;
            let average_size = if quota_met {
                let sum: f64 = catches.iter().take(quota).map(|c| c.size_cm).sum();
                round_dp(sum / quota as f64, 2)
            } else {
                0.0
            };

            ParticipantData {
                user_id,
                biggest_single_fish_size: catches.first().map_or(0.0, |c| c.size_cm),
                total_size: catches.iter().map(|c| c.size_cm).sum(),
                quota_met,
                average_size,
                catches,
            }
        })
        .collect();

    let (mut met, mut below): (Vec<_>, Vec<_>) =
        participants.into_iter().partition(|p| p.quota_met);

    met.sort_by(|a, b| {
        b.average_size
            .total_cmp(&a.average_size)
            .then_with(|| b.biggest_single_fish_size.total_cmp(&a.biggest_single_fish_size))
    });

    below.sort_by(|a, b| {
        b.catches
            .len()
            .cmp(&a.catches.len())
            .then_with(|| b.total_size.total_cmp(&a.total_size))
            .then_with(|| b.biggest_single_fish_size.total_cmp(&a.biggest_single_fish_size))
    });

    let ranking: Vec<RankedParticipant> = met
        .into_iter()
        .chain(below)
        .enumerate()
        .map(|(index, p)| RankedParticipant {
            user_id: p.user_id.to_string(),
            position: index as u32 + 1,
            average_size: p.average_size,
            biggest_single_fish_size: p.biggest_single_fish_size,
            number_of_valid_catches: p.catches.len() as u32,
            top_catches: p
                .catches
                .iter()
                .take(quota)
                .map(|c| TopCatch {
                    catch_id: c.catch_id.clone(),
                    size_cm: c.size_cm,
                    species_name: c.species_name.clone(),
                })
                .collect(),
            met_minimum_quota: p.quota_met,
        })
        .collect();

    debug!("ranked {} participants", ranking.len());
    ranking
}

/// Picks the catches that exceed the per-user quota: for every user, their
/// approved catches sorted by effective size descending keep the first
/// `quota`, and everything after is selected for demotion. Ties keep input
/// order. Only approved catches are ever selected, and never more than
/// `count - quota` per user.
pub fn select_over_quota(all_catches: &[Catch], quota: usize) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_user: HashMap<&str, Vec<&Catch>> = HashMap::new();
    for c in all_catches {
        if c.status != CatchStatus::Approved {
            continue;
        }
        if c.user_id.is_empty() {
            warn!("catch {} has no user, skipped by quota enforcement", c.id);
            continue;
        }
        let entry = by_user.entry(c.user_id.as_str()).or_default();
        if entry.is_empty() {
            order.push(c.user_id.as_str());
        }
        entry.push(c);
    }

    let mut over_quota = Vec::new();
    for user_id in order {
        let mut catches = by_user.remove(user_id).unwrap_or_default();
        if catches.len() <= quota {
            continue;
        }
        catches.sort_by(|a, b| b.effective_size().total_cmp(&a.effective_size()));
        over_quota.extend(catches[quota..].iter().map(|c| c.id.clone()));
    }
    over_quota
}
