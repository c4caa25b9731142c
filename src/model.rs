//! Data models for Cyclewise.
//!
//! # Privacy Guarantees
//!
//! Profiles and symptom logs are keyed by an opaque `user_id` issued by the
//! authentication layer. No email addresses, names, or account credentials
//! are part of any type in this module.
//!
//! Computed values ([`CycleStatus`], [`SymptomAnalysis`]) are ephemeral:
//! they are rebuilt on every request and never written to storage.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for user-submitted or stored values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A symptom category outside `physical`, `emotional`, `other`.
    #[error("invalid symptom category '{0}' (expected physical, emotional or other)")]
    InvalidCategory(String),

    /// A cycle regularity outside `regular`, `irregular`.
    #[error("invalid cycle regularity '{0}' (expected regular or irregular)")]
    InvalidRegularity(String),

    /// A severity outside the 1-3 scale.
    #[error("invalid severity {0} (expected 1, 2 or 3)")]
    InvalidSeverity(i64),

    /// A symptom was submitted without a type label.
    #[error("symptom type is required")]
    MissingSymptomType,
}

/// Whether the user reports regular cycles.
///
/// Only affects the wording of phase descriptions, never the phase math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleRegularity {
    #[default]
    Regular,
    Irregular,
}

impl CycleRegularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleRegularity::Regular => "regular",
            CycleRegularity::Irregular => "irregular",
        }
    }
}

impl FromStr for CycleRegularity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(CycleRegularity::Regular),
            "irregular" => Ok(CycleRegularity::Irregular),
            other => Err(ModelError::InvalidRegularity(other.to_string())),
        }
    }
}

/// The cycle fields of a user profile: everything the phase engine reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleProfile {
    /// Start of the most recently observed period.
    #[serde(default)]
    pub last_period_date: Option<DateTime<Utc>>,

    /// Expected cycle length in days. Absent or non-positive means 28.
    #[serde(default)]
    pub cycle_length: Option<i32>,

    #[serde(default)]
    pub cycle_regularity: CycleRegularity,
}

/// The four physiological phases, plus the "no data yet" placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulatory,
    Luteal,
    /// Placeholder used until a last period date is known.
    Tracking,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Menstrual => "Menstrual",
            CyclePhase::Follicular => "Follicular",
            CyclePhase::Ovulatory => "Ovulatory",
            CyclePhase::Luteal => "Luteal",
            CyclePhase::Tracking => "Tracking",
        }
    }

    /// The phase that follows this one. Luteal wraps to Menstrual.
    pub fn next(&self) -> Option<Self> {
        match self {
            CyclePhase::Menstrual => Some(CyclePhase::Follicular),
            CyclePhase::Follicular => Some(CyclePhase::Ovulatory),
            CyclePhase::Ovulatory => Some(CyclePhase::Luteal),
            CyclePhase::Luteal => Some(CyclePhase::Menstrual),
            CyclePhase::Tracking => None,
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A phase together with its canonical position and presentation metadata.
///
/// The canonical table lives in [`crate::phase::PHASES`]. Values handed out
/// to callers are clones; only `description` is ever replaced, and then on
/// the clone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDefinition {
    pub name: CyclePhase,

    /// First day of the phase (1-indexed) in a canonical 28-day cycle.
    pub start_day: u32,

    /// Canonical length of the phase in days.
    pub duration: u32,

    pub description: Cow<'static, str>,
    pub nutrition: &'static [&'static str],
    pub exercise: &'static [&'static str],

    /// Display color hint for the dashboard.
    pub color: &'static str,
}

/// Where a user currently is in their cycle.
///
/// Recomputed on every request from a [`CycleProfile`] snapshot and the
/// caller-supplied clock; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStatus {
    pub current_phase: PhaseDefinition,

    /// Day within the cycle, `1..=cycle_length`, or 0 when there is no data.
    pub day_of_cycle: u32,

    /// Days until the next period starts, or 0 when there is no data.
    pub next_period_in_days: u32,

    /// True for irregular cycles and for the placeholder.
    pub is_irregular: bool,

    /// First day of the current phase's canonical window.
    pub phase_start_date: Option<DateTime<Utc>>,

    /// Last day of the current phase's canonical window.
    pub phase_end_date: Option<DateTime<Utc>>,

    /// Whole days until the phase window ends, clamped at 0.
    pub days_until_next_phase: u32,

    /// The phase after the current one; `None` for the placeholder.
    pub next_phase: Option<PhaseDefinition>,
}

impl CycleStatus {
    /// True when the status is the "no last period date" placeholder.
    pub fn is_tracking(&self) -> bool {
        self.day_of_cycle == 0
    }
}

/// Closed set of symptom categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymptomCategory {
    Physical,
    Emotional,
    Other,
}

impl SymptomCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymptomCategory::Physical => "physical",
            SymptomCategory::Emotional => "emotional",
            SymptomCategory::Other => "other",
        }
    }
}

impl FromStr for SymptomCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "physical" => Ok(SymptomCategory::Physical),
            "emotional" => Ok(SymptomCategory::Emotional),
            "other" => Ok(SymptomCategory::Other),
            other => Err(ModelError::InvalidCategory(other.to_string())),
        }
    }
}

/// A single logged symptom, as consumed by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomObservation {
    /// Free-form label, e.g. "Cramps".
    #[serde(rename = "type")]
    pub symptom_type: String,

    pub category: SymptomCategory,

    /// 1 (mild) to 3 (severe).
    pub severity: u8,

    pub date: DateTime<Utc>,
}

/// A symptom as stored, with its row id and free-text notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedSymptom {
    pub id: i64,

    #[serde(flatten)]
    pub observation: SymptomObservation,

    pub notes: String,
}

/// Request body for `POST /users/:user_id/symptoms`.
///
/// Fields are loosely typed so that validation failures surface as
/// [`ModelError`] values instead of opaque deserialization errors.
#[derive(Debug, Clone, Deserialize)]
pub struct SymptomRequest {
    #[serde(rename = "type", default)]
    pub symptom_type: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub severity: i64,

    /// When the symptom occurred. Defaults to server time.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub notes: String,
}

impl SymptomRequest {
    /// Validate the request against the closed category set and the
    /// severity scale.
    pub fn validate(self, now: DateTime<Utc>) -> Result<(SymptomObservation, String), ModelError> {
        let symptom_type = self.symptom_type.trim();
        if symptom_type.is_empty() {
            return Err(ModelError::MissingSymptomType);
        }

        let category = self.category.parse::<SymptomCategory>()?;

        let severity = match self.severity {
            1..=3 => self.severity as u8,
            other => return Err(ModelError::InvalidSeverity(other)),
        };

        let observation = SymptomObservation {
            symptom_type: symptom_type.to_string(),
            category,
            severity,
            date: self.date.unwrap_or(now),
        };

        Ok((observation, self.notes))
    }
}

/// Per-category lists of symptom type names.
///
/// Each list holds one entry per observation, so repeated logging of the same
/// symptom shows up as repetition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymptomCategories {
    pub physical: Vec<String>,
    pub emotional: Vec<String>,
    pub other: Vec<String>,
}

impl SymptomCategories {
    pub fn bucket_mut(&mut self, category: SymptomCategory) -> &mut Vec<String> {
        match category {
            SymptomCategory::Physical => &mut self.physical,
            SymptomCategory::Emotional => &mut self.emotional,
            SymptomCategory::Other => &mut self.other,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.physical.is_empty() && self.emotional.is_empty() && self.other.is_empty()
    }
}

/// Summary of a recent window of symptoms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymptomAnalysis {
    /// Up to three symptom types, most frequent first.
    pub most_common: Vec<String>,

    /// Mean severity per symptom type, for every type in the window.
    pub severity_trends: std::collections::BTreeMap<String, f64>,

    pub categories: SymptomCategories,
}

/// Lifestyle preferences used to personalise insight prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WellnessPreferences {
    #[serde(default)]
    pub diet: String,
    #[serde(default)]
    pub culture: String,
    #[serde(default)]
    pub exercise: Vec<String>,
    #[serde(default)]
    pub language: String,
}

/// Self-reported health background.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthBackground {
    #[serde(default)]
    pub has_conditions: bool,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub goals: String,
}

/// Request body for `PUT /users/:user_id/profile`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub age: Option<u32>,

    #[serde(flatten)]
    pub cycle: CycleProfile,

    /// Expected period length in days. Absent or non-positive means 5.
    #[serde(default)]
    pub period_length: Option<i32>,

    #[serde(default)]
    pub allergies: Vec<String>,

    #[serde(default)]
    pub preferences: WellnessPreferences,

    #[serde(default)]
    pub health: HealthBackground,
}

/// A stored user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Opaque identifier issued by the authentication layer.
    pub user_id: String,

    pub age: Option<u32>,

    /// Inputs to the phase engine.
    #[serde(flatten)]
    pub cycle: CycleProfile,

    /// Bleeding days per cycle; defaults to 5 when unset.
    pub period_length: Option<i32>,

    /// Trimmed, non-empty allergy labels.
    pub allergies: Vec<String>,

    pub preferences: WellnessPreferences,
    pub health: HealthBackground,

    /// When the profile was first stored.
    pub created_at: DateTime<Utc>,

    /// When the profile was last replaced.
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Build a profile from a request. `created_at` is set to `now`; the
    /// storage layer keeps the original value when the profile already exists.
    pub fn from_request(user_id: &str, request: ProfileRequest, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            age: request.age,
            cycle: request.cycle,
            period_length: request.period_length,
            allergies: request
                .allergies
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            preferences: request.preferences,
            health: request.health,
            created_at: now,
            updated_at: now,
        }
    }
}
