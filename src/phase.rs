//! Cycle phase engine.
//!
//! Maps a [`CycleProfile`] and a reference instant to a [`CycleStatus`].
//! Everything here is pure: the clock is always supplied by the caller, so
//! identical inputs always produce identical outputs.
//!
//! # Phase boundaries
//!
//! Phases are chosen from the day of cycle using the canonical 28-day
//! boundaries (days 5, 11 and 16) whatever the user's cycle length. A 35-day
//! cycle therefore spends days 17-35 in the luteal phase, and a 21-day cycle
//! never reaches its late luteal days. Prompt text and dashboards rely on
//! these fixed boundaries.

use std::borrow::Cow;

use chrono::{DateTime, TimeDelta, Utc};

use crate::model::{CycleProfile, CyclePhase, CycleRegularity, CycleStatus, PhaseDefinition};

/// Cycle length assumed when the profile has none (or a non-positive one).
pub const DEFAULT_CYCLE_LENGTH: i32 = 28;

/// Period length assumed when the profile has none (or a non-positive one).
pub const DEFAULT_PERIOD_LENGTH: i32 = 5;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Canonical phase table, ordered by `start_day`.
pub static PHASES: [PhaseDefinition; 4] = [
    PhaseDefinition {
        name: CyclePhase::Menstrual,
        start_day: 1,
        duration: 5,
        description: Cow::Borrowed("Your period has started. Focus on rest and self-care."),
        nutrition: &["Iron-rich foods", "Dark chocolate", "Anti-inflammatory foods"],
        exercise: &["Light walking", "Gentle yoga", "Stretching"],
        color: "text-rose-600",
    },
    PhaseDefinition {
        name: CyclePhase::Follicular,
        start_day: 6,
        duration: 6,
        description: Cow::Borrowed("Energy levels begin to rise. Great time for new starts."),
        nutrition: &["Fermented foods", "Lean proteins", "Fresh fruits"],
        exercise: &["High-intensity workouts", "Strength training", "Cardio"],
        color: "text-purple-600",
    },
    PhaseDefinition {
        name: CyclePhase::Ovulatory,
        start_day: 12,
        duration: 5,
        description: Cow::Borrowed("Peak energy and fertility. Embrace your natural confidence."),
        nutrition: &["Light, fresh foods", "Raw vegetables", "Antioxidant-rich foods"],
        exercise: &["High-intensity workouts", "Group classes", "Dancing"],
        color: "text-pink-600",
    },
    PhaseDefinition {
        name: CyclePhase::Luteal,
        start_day: 17,
        duration: 12,
        description: Cow::Borrowed("Wind down phase. Listen to your body's needs."),
        nutrition: &["Complex carbs", "Magnesium-rich foods", "Calming teas"],
        exercise: &["Moderate cardio", "Pilates", "Swimming"],
        color: "text-purple-500",
    },
];

/// Placeholder phase reported until a last period date is known.
pub static TRACKING_PHASE: PhaseDefinition = PhaseDefinition {
    name: CyclePhase::Tracking,
    start_day: 0,
    duration: 0,
    description: Cow::Borrowed("Start tracking to get personalized insights"),
    nutrition: &["Balanced diet", "Regular meals"],
    exercise: &["Regular movement", "Listen to your body"],
    color: "text-purple-600",
};

/// Normalize a configured cycle length: absent or non-positive means 28.
pub fn effective_cycle_length(cycle_length: Option<i32>) -> i32 {
    match cycle_length {
        Some(len) if len > 0 => len,
        _ => DEFAULT_CYCLE_LENGTH,
    }
}

/// Normalize a configured period length: absent or non-positive means 5.
pub fn effective_period_length(period_length: Option<i32>) -> i32 {
    match period_length {
        Some(len) if len > 0 => len,
        _ => DEFAULT_PERIOD_LENGTH,
    }
}

/// Whole days elapsed between two instants, rounded toward negative infinity.
///
/// Time-of-day participates in the elapsed time; only the final division
/// rounds. An instant 12 hours in the future counts as day -1.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

/// Day within the cycle (`1..=cycle_length`) for a signed day offset.
pub fn day_of_cycle(days_since_last_period: i64, cycle_length: i32) -> u32 {
    (days_since_last_period.rem_euclid(i64::from(cycle_length)) + 1) as u32
}

/// Index into [`PHASES`] for a day of cycle.
///
/// Depends on the day alone, never on cycle length or regularity.
pub fn phase_index(day_of_cycle: u32) -> usize {
    match day_of_cycle {
        0..=5 => 0,
        6..=11 => 1,
        12..=16 => 2,
        _ => 3,
    }
}

/// Compute the user's current cycle status as of `as_of`.
///
/// Never fails: a missing last period date yields the `Tracking`
/// placeholder, and a missing or non-positive cycle length falls back to
/// [`DEFAULT_CYCLE_LENGTH`]. Future-dated last periods wrap to the end of the
/// previous cycle.
pub fn compute_cycle_status(profile: &CycleProfile, as_of: DateTime<Utc>) -> CycleStatus {
    let Some(last_period) = profile.last_period_date else {
        return tracking_status();
    };

    let cycle_length = effective_cycle_length(profile.cycle_length);
    let days_since = days_between(last_period, as_of);
    let offset = days_since.rem_euclid(i64::from(cycle_length));

    let day_of_cycle = day_of_cycle(days_since, cycle_length);
    let next_period_in_days = (i64::from(cycle_length) - offset) as u32;

    let index = phase_index(day_of_cycle);
    let mut current_phase = PHASES[index].clone();
    let next_phase = current_phase.name.next().and_then(definition).cloned();

    let phase_start_date = as_of.checked_sub_signed(TimeDelta::days(i64::from(
        day_of_cycle as i32 - current_phase.start_day as i32,
    )));
    let phase_end_date = phase_start_date
        .and_then(|start| start.checked_add_signed(TimeDelta::days(i64::from(current_phase.duration) - 1)));

    let days_until_next_phase = phase_end_date
        .map(|end| ceil_days(end - as_of).max(0) as u32)
        .unwrap_or(0);

    let is_irregular = profile.cycle_regularity == CycleRegularity::Irregular;
    if is_irregular {
        current_phase.description = Cow::Owned(format!(
            "Possible {} phase. Tracking helps improve predictions.",
            current_phase.name.as_str().to_lowercase()
        ));
    }

    CycleStatus {
        current_phase,
        day_of_cycle,
        next_period_in_days,
        is_irregular,
        phase_start_date,
        phase_end_date,
        days_until_next_phase,
        next_phase,
    }
}

/// Canonical table entry for a phase. `Tracking` has none.
pub fn definition(phase: CyclePhase) -> Option<&'static PhaseDefinition> {
    PHASES.iter().find(|p| p.name == phase)
}

fn tracking_status() -> CycleStatus {
    CycleStatus {
        current_phase: TRACKING_PHASE.clone(),
        day_of_cycle: 0,
        next_period_in_days: 0,
        is_irregular: true,
        phase_start_date: None,
        phase_end_date: None,
        days_until_next_phase: 0,
        next_phase: None,
    }
}

/// Whole days in a span, rounded toward positive infinity.
fn ceil_days(span: TimeDelta) -> i64 {
    -(-span.num_milliseconds()).div_euclid(MILLIS_PER_DAY)
}
