use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::round_dp;
use crate::tournament::Modality;

/// National ranking segments never persist more than this many entries.
pub const MAX_SEGMENT_ENTRIES: usize = 100;

/// Fixed national points per final position, 1st through 10th.
const POINTS_BY_POSITION: [f64; 10] = [
    100.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0, 10.0,
];

/// A user's cumulative record across all finalized tournaments. Counters
/// only ever accumulate; nothing here is reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalRankingEntry {
    pub user_id: String,
    pub total_points: f64,
    pub first_places: u32,
    pub podiums: u32,
    pub top10_finishes: u32,
    /// Best weighted score earned in any single tournament.
    pub best_single_tournament_score: f64,
    /// Deduplicated tournament ids, in first-seen order.
    pub tournaments_participated: Vec<String>,
}

impl NationalRankingEntry {
    /// Folds another entry's counters into this one: points and finish
    /// counters add, the best single score takes the max, and the
    /// tournaments list stays a deduplicated union.
    pub fn absorb(&mut self, other: &NationalRankingEntry) {
        self.total_points += other.total_points;
        self.first_places += other.first_places;
        self.podiums += other.podiums;
        self.top10_finishes += other.top10_finishes;
        self.best_single_tournament_score = self
            .best_single_tournament_score
            .max(other.best_single_tournament_score);
        for tournament_id in &other.tournaments_participated {
            if !self.tournaments_participated.contains(tournament_id) {
                self.tournaments_participated.push(tournament_id.clone());
            }
        }
    }
}

/// Which slice of the national ranking a segment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Overall,
    Modality(Modality),
}

impl SegmentKind {
    pub fn as_key(&self) -> &'static str {
        match self {
            SegmentKind::Overall => "overall",
            SegmentKind::Modality(modality) => modality.as_str(),
        }
    }
}

/// Composite identity of a segment document: year plus dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId {
    pub year: i32,
    pub kind: SegmentKind,
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-ALL", self.year, self.kind.as_key())
    }
}

/// Biggest fish of a species within a segment's year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiggestFishOfYearRecord {
    pub user_id: String,
    pub size_cm: f64,
    pub tournament_id: String,
    pub catch_date: DateTime<Utc>,
}

/// One partition of the national ranking, independently merged and sorted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NationalRankingSegment {
    pub id: SegmentId,
    pub entries: Vec<NationalRankingEntry>,
    pub biggest_fish_of_year_by_species: BTreeMap<String, BiggestFishOfYearRecord>,
    pub last_updated: DateTime<Utc>,
}

impl NationalRankingSegment {
    pub fn empty(id: SegmentId, last_updated: DateTime<Utc>) -> Self {
        Self {
            id,
            entries: Vec::new(),
            biggest_fish_of_year_by_species: BTreeMap::new(),
            last_updated,
        }
    }
}

/// A user's single biggest fish across their whole career.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerBiggestFish {
    pub size_cm: f64,
    pub species_name: String,
    pub tournament_id: String,
    pub catch_id: String,
    pub catch_date: DateTime<Utc>,
}

/// Lifetime career counters for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub championships: u32,
    pub top3_finishes: u32,
    pub top10_finishes: u32,
    pub tournaments_participated_count: u32,
    pub total_approved_catches: u32,
    pub total_approved_catch_cm: f64,
    pub biggest_fish_ever: Option<CareerBiggestFish>,
    /// Set on the first relevant finalization, never overwritten after.
    pub first_tournament_date: Option<DateTime<Utc>>,
    pub last_tournament_date: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl UserStats {
    pub fn zeroed(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            championships: 0,
            top3_finishes: 0,
            top10_finishes: 0,
            tournaments_participated_count: 0,
            total_approved_catches: 0,
            total_approved_catch_cm: 0.0,
            biggest_fish_ever: None,
            first_tournament_date: None,
            last_tournament_date: None,
            last_updated: now,
        }
    }
}

/// Difficulty multiplier for a tournament's national points. Strict quotas
/// and high minimum sizes weigh heavier; the size component saturates at
/// 60 cm.
pub fn calculate_tournament_weight(quota: usize, min_fish_size: f64) -> f64 {
    let cota_weight = match quota {
        1 => 0.8,
        5 => 1.2,
        _ => 1.0,
    };

    const BASE_SIZE: f64 = 30.0;
    const MAX_SIZE_IMPACT: f64 = 60.0;
    let size_weight = if min_fish_size < BASE_SIZE {
        0.9
    } else if min_fish_size > BASE_SIZE {
        1.0 + ((min_fish_size - BASE_SIZE) / (MAX_SIZE_IMPACT - BASE_SIZE) * 0.3).min(0.3)
    } else {
        1.0
    };

    round_dp(cota_weight * size_weight, 3)
}

/// Unweighted national points for a top-10 finish: the fixed schedule for
/// the position plus a continuous component rewarding high finishes in
/// larger fields. Positions outside 1..=10 and empty fields score 0.
pub fn calculate_base_national_points(position: u32, total_ranked: u32) -> f64 {
    if !(1..=10).contains(&position) || total_ranked == 0 {
        return 0.0;
    }

    let effective_total = position.max(total_ranked) as f64;
    let fixed = POINTS_BY_POSITION[(position - 1) as usize];
    let decimal = (effective_total - position as f64 + 1.0) / effective_total;
    round_dp(fixed + decimal, 4)
}

/// Orders national entries best first: points, then first places, podiums,
/// top-10 finishes, best single score, and finally user id ascending so the
/// order is fully deterministic.
pub fn sort_national_entries(entries: &mut [NationalRankingEntry]) {
    entries.sort_by(|a, b| {
        b.total_points
            .total_cmp(&a.total_points)
            .then_with(|| b.first_places.cmp(&a.first_places))
            .then_with(|| b.podiums.cmp(&a.podiums))
            .then_with(|| b.top10_finishes.cmp(&a.top10_finishes))
            .then_with(|| {
                b.best_single_tournament_score
                    .total_cmp(&a.best_single_tournament_score)
            })
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

#[cfg(test)]
mod tests {
    use approx::assert_ulps_eq;
    use test_case::test_case;

    use super::*;

    fn entry(user_id: &str, total_points: f64) -> NationalRankingEntry {
        NationalRankingEntry {
            user_id: user_id.to_string(),
            total_points,
            first_places: 0,
            podiums: 0,
            top10_finishes: 1,
            best_single_tournament_score: total_points,
            tournaments_participated: vec!["t1".to_string()],
        }
    }

    #[test_case(1, 30.0, 0.8 ; "quota one at base size")]
    #[test_case(3, 30.0, 1.0 ; "quota three at base size")]
    #[test_case(5, 60.0, 1.56 ; "quota five at saturated size")]
    #[test_case(5, 90.0, 1.56 ; "size impact saturates past sixty")]
    #[test_case(3, 20.0, 0.9 ; "lenient size discounts")]
    #[test_case(1, 45.0, 0.92 ; "quota one halfway size")]
    fn tournament_weight(quota: usize, min_size: f64, expected: f64) {
        assert_ulps_eq!(
            calculate_tournament_weight(quota, min_size),
            expected,
            max_ulps = 4
        );
    }

    #[test_case(1, 10, 101.0 ; "winner of a field of ten")]
    #[test_case(2, 10, 90.9 ; "runner up of a field of ten")]
    #[test_case(10, 10, 10.1 ; "tenth of a field of ten")]
    #[test_case(1, 1, 101.0 ; "winner of a field of one")]
    #[test_case(10, 5, 10.1 ; "position beyond field size uses position")]
    #[test_case(11, 10, 0.0 ; "position eleven scores nothing")]
    #[test_case(0, 10, 0.0 ; "position zero scores nothing")]
    #[test_case(1, 0, 0.0 ; "empty field scores nothing")]
    fn base_national_points(position: u32, total_ranked: u32, expected: f64) {
        assert_ulps_eq!(
            calculate_base_national_points(position, total_ranked),
            expected,
            max_ulps = 4
        );
    }

    #[test]
    fn equal_points_break_on_first_places() {
        let mut a = entry("alice", 100.0);
        a.first_places = 1;
        let b = entry("bob", 100.0);

        let mut entries = vec![b, a];
        sort_national_entries(&mut entries);

        assert_eq!(entries[0].user_id, "alice");
        assert_eq!(entries[1].user_id, "bob");
    }

    #[test]
    fn full_tie_breaks_on_user_id_ascending() {
        let mut entries = vec![entry("carol", 50.0), entry("bob", 50.0), entry("alice", 50.0)];
        sort_national_entries(&mut entries);

        let order: Vec<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, ["alice", "bob", "carol"]);
    }

    #[test]
    fn absorb_accumulates_and_deduplicates() {
        let mut cumulative = entry("alice", 101.0);
        cumulative.first_places = 1;
        cumulative.podiums = 1;

        let mut next = entry("alice", 72.8);
        next.podiums = 1;
        next.tournaments_participated = vec!["t1".to_string(), "t2".to_string()];

        cumulative.absorb(&next);

        assert_ulps_eq!(cumulative.total_points, 173.8, max_ulps = 4);
        assert_eq!(cumulative.first_places, 1);
        assert_eq!(cumulative.podiums, 2);
        assert_eq!(cumulative.top10_finishes, 2);
        assert_ulps_eq!(cumulative.best_single_tournament_score, 101.0, max_ulps = 4);
        assert_eq!(cumulative.tournaments_participated, ["t1", "t2"]);
    }

    #[test]
    fn segment_id_renders_composite_key() {
        let overall = SegmentId {
            year: 2025,
            kind: SegmentKind::Overall,
        };
        let kayak = SegmentId {
            year: 2025,
            kind: SegmentKind::Modality(Modality::Kayak),
        };

        assert_eq!(overall.to_string(), "2025-overall-ALL");
        assert_eq!(kayak.to_string(), "2025-kayak-ALL");
    }
}
