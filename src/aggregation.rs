//! Symptom aggregation.
//!
//! # Privacy Guarantees
//!
//! The analysis only ever covers a single user's own recent window. It is
//! computed on demand and never stored, and nothing here logs symptom labels.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeDelta, Utc};

use crate::model::{SymptomAnalysis, SymptomObservation};
use crate::storage::Storage;

/// How many symptom types `most_common` reports.
const MOST_COMMON_LIMIT: usize = 3;

struct TypeTally<'a> {
    symptom_type: &'a str,
    count: u32,
    severity_total: u32,
}

/// Summarise a window of symptom observations.
///
/// The caller is responsible for choosing the window and ordering it (the
/// store returns newest first); this function only aggregates. Ties in
/// `most_common` keep the order in which each type first appears in the input.
pub fn analyze_symptoms(symptoms: &[SymptomObservation]) -> SymptomAnalysis {
    let mut analysis = SymptomAnalysis::default();

    // Tallies are kept in first-occurrence order; the map only indexes them
    let mut tallies: Vec<TypeTally<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for symptom in symptoms {
        let slot = *index.entry(symptom.symptom_type.as_str()).or_insert_with(|| {
            tallies.push(TypeTally {
                symptom_type: symptom.symptom_type.as_str(),
                count: 0,
                severity_total: 0,
            });
            tallies.len() - 1
        });

        let tally = &mut tallies[slot];
        tally.count += 1;
        tally.severity_total += u32::from(symptom.severity);

        analysis
            .categories
            .bucket_mut(symptom.category)
            .push(symptom.symptom_type.clone());
    }

    analysis.severity_trends = tallies
        .iter()
        .map(|t| {
            (
                t.symptom_type.to_string(),
                f64::from(t.severity_total) / f64::from(t.count),
            )
        })
        .collect::<BTreeMap<_, _>>();

    // sort_by is stable, so equal counts stay in first-occurrence order
    let mut ranked: Vec<&TypeTally<'_>> = tallies.iter().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    analysis.most_common = ranked
        .into_iter()
        .take(MOST_COMMON_LIMIT)
        .map(|t| t.symptom_type.to_string())
        .collect();

    analysis
}

/// Analyse a user's symptoms over the trailing `window_days` days.
///
/// # Arguments
///
/// * `storage` - Database connection
/// * `user_id` - The user whose log to read
/// * `window_days` - Size of the recency window in days
/// * `now` - Reference timestamp (typically current time)
pub async fn compute_symptom_analysis(
    storage: &Storage,
    user_id: &str,
    window_days: u32,
    now: DateTime<Utc>,
) -> anyhow::Result<SymptomAnalysis> {
    let since = now
        .checked_sub_signed(TimeDelta::days(i64::from(window_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let recent = storage.recent_symptoms(user_id, since).await?;

    let observations: Vec<SymptomObservation> =
        recent.into_iter().map(|logged| logged.observation).collect();

    Ok(analyze_symptoms(&observations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProfileRequest, SymptomCategory, UserProfile};

    fn observation(symptom_type: &str, category: SymptomCategory, severity: u8) -> SymptomObservation {
        SymptomObservation {
            symptom_type: symptom_type.to_string(),
            category,
            severity,
            date: Utc::now(),
        }
    }

    #[test]
    fn test_analyze_empty() {
        let analysis = analyze_symptoms(&[]);

        assert!(analysis.most_common.is_empty());
        assert!(analysis.severity_trends.is_empty());
        assert!(analysis.categories.is_empty());
    }

    #[test]
    fn test_analyze_severity_means() {
        let symptoms = vec![
            observation("Cramps", SymptomCategory::Physical, 2),
            observation("Cramps", SymptomCategory::Physical, 3),
            observation("Headache", SymptomCategory::Physical, 1),
        ];

        let analysis = analyze_symptoms(&symptoms);

        assert_eq!(analysis.most_common[0], "Cramps");
        assert_eq!(analysis.severity_trends.len(), 2);
        assert_eq!(analysis.severity_trends["Cramps"], 2.5);
        assert_eq!(analysis.severity_trends["Headache"], 1.0);
    }

    #[test]
    fn test_most_common_limited_and_stable() {
        let symptoms = vec![
            observation("Fatigue", SymptomCategory::Physical, 1),
            observation("Anxiety", SymptomCategory::Emotional, 2),
            observation("Bloating", SymptomCategory::Physical, 1),
            observation("Acne", SymptomCategory::Other, 1),
            observation("Bloating", SymptomCategory::Physical, 2),
        ];

        let analysis = analyze_symptoms(&symptoms);

        // Bloating leads; the single-count ties keep input order
        assert_eq!(analysis.most_common, vec!["Bloating", "Fatigue", "Anxiety"]);
        // Trends cover every type, not just the top three
        assert_eq!(analysis.severity_trends.len(), 4);
        assert_eq!(analysis.severity_trends["Bloating"], 1.5);
    }

    #[test]
    fn test_categories_keep_every_occurrence() {
        let symptoms = vec![
            observation("Cramps", SymptomCategory::Physical, 2),
            observation("Irritability", SymptomCategory::Emotional, 1),
            observation("Cramps", SymptomCategory::Physical, 3),
            observation("Cravings", SymptomCategory::Other, 2),
        ];

        let analysis = analyze_symptoms(&symptoms);

        assert_eq!(analysis.categories.physical, vec!["Cramps", "Cramps"]);
        assert_eq!(analysis.categories.emotional, vec!["Irritability"]);
        assert_eq!(analysis.categories.other, vec!["Cravings"]);
    }

    #[tokio::test]
    async fn test_compute_symptom_analysis_window() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = Utc::now();

        let profile = UserProfile::from_request("user-a", ProfileRequest::default(), now);
        storage.upsert_profile(&profile).await.unwrap();

        let mut recent = observation("Cramps", SymptomCategory::Physical, 3);
        recent.date = now - TimeDelta::days(2);
        storage.insert_symptom("user-a", &recent, "").await.unwrap();

        let mut stale = observation("Headache", SymptomCategory::Physical, 1);
        stale.date = now - TimeDelta::days(10);
        storage.insert_symptom("user-a", &stale, "").await.unwrap();

        let analysis = compute_symptom_analysis(&storage, "user-a", 7, now)
            .await
            .unwrap();

        assert_eq!(analysis.most_common, vec!["Cramps"]);
        assert!(!analysis.severity_trends.contains_key("Headache"));
    }

    #[tokio::test]
    async fn test_oversized_window_covers_full_history() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = Utc::now();

        let profile = UserProfile::from_request("user-a", ProfileRequest::default(), now);
        storage.upsert_profile(&profile).await.unwrap();

        let mut old = observation("Headache", SymptomCategory::Physical, 2);
        old.date = now - TimeDelta::days(400);
        storage.insert_symptom("user-a", &old, "").await.unwrap();

        let analysis = compute_symptom_analysis(&storage, "user-a", 200_000_000, now)
            .await
            .unwrap();

        assert_eq!(analysis.most_common, vec!["Headache"]);
    }
}
