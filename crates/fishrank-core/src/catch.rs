use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation state of a submitted capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatchStatus {
    Pending,
    Approved,
    Rejected,
    Replaced,
}

impl CatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatchStatus::Pending => "PENDING",
            CatchStatus::Approved => "APPROVED",
            CatchStatus::Rejected => "REJECTED",
            CatchStatus::Replaced => "REPLACED",
        }
    }
}

impl std::fmt::Display for CatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single fish-capture submission as stored by the catch collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catch {
    pub id: String,
    pub tournament_id: String,
    pub user_id: String,
    pub species_name: String,
    pub length_cm: f64,
    /// Administrative override of the measured length. Only applies when
    /// positive and finite.
    pub size_adjustment: Option<f64>,
    pub status: CatchStatus,
    pub catch_date: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    /// Id of the newer catch that pushed this one over the quota, when the
    /// status is `Replaced` because of quota enforcement.
    pub replaced_because_of: Option<String>,
}

impl Catch {
    /// The ranking-relevant size: the administrative adjustment when it is
    /// positive and finite, the recorded length otherwise.
    pub fn effective_size(&self) -> f64 {
        match self.size_adjustment {
            Some(adjusted) if adjusted.is_finite() && adjusted > 0.0 => adjusted,
            _ => self.length_cm,
        }
    }
}

/// An approved catch that passed the tournament's minimum-size rule,
/// reduced to the fields ranking cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidCatch {
    pub catch_id: String,
    pub user_id: String,
    pub species_name: String,
    pub size_cm: f64,
    pub catch_date: DateTime<Utc>,
}

impl From<&Catch> for ValidCatch {
    fn from(c: &Catch) -> Self {
        Self {
            catch_id: c.id.clone(),
            user_id: c.user_id.clone(),
            species_name: c.species_name.clone(),
            size_cm: c.effective_size(),
            catch_date: c.catch_date,
        }
    }
}
