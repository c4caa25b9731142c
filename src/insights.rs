//! Wellness insight assembly.
//!
//! Builds a natural-language request from a user's profile, their computed
//! [`CycleStatus`] and recent [`SymptomAnalysis`], hands it to a
//! [`TextGenerator`], and splits the returned text into named sections.
//!
//! # Privacy
//!
//! Prompts contain health data and are never logged. Only their length and
//! the number of parsed sections are recorded.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::model::{CyclePhase, CycleStatus, SymptomAnalysis, UserProfile};
use crate::phase::{effective_cycle_length, effective_period_length};

/// How long a generated report stays fresh.
const REPORT_TTL_HOURS: i64 = 24;

/// Section headings the generator is asked to produce, in order.
pub const SECTION_TITLES: [&str; 5] = [
    "SYMPTOM MANAGEMENT",
    "NUTRITION PLAN",
    "PHYSICAL WELLNESS",
    "MENTAL WELLNESS",
    "CYCLE INSIGHTS",
];

/// Failures talking to the text-generation service.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("text generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("text generation API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("text generation API returned no text")]
    EmptyResponse,
}

/// An opaque text-completion service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt`, returning free text.
    async fn generate(&self, prompt: &str) -> Result<String, InsightError>;
}

/// Cycle facts echoed back alongside the generated sections.
#[derive(Debug, Clone, Serialize)]
pub struct CycleContext {
    pub phase: CyclePhase,
    pub day_of_cycle: u32,
    pub next_period_in_days: u32,
    pub symptom_analysis: SymptomAnalysis,
}

/// Response for `POST /users/:user_id/insights`.
#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    /// Parsed sections keyed by lowercased heading, e.g. "nutrition plan".
    pub insights: BTreeMap<String, Vec<String>>,
    pub cycle_context: CycleContext,
    pub timestamp: DateTime<Utc>,
    pub next_update_recommended: DateTime<Utc>,
}

/// Render a symptom analysis as the "recent patterns" block of a prompt.
pub fn format_symptom_analysis(analysis: &SymptomAnalysis) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Most Common Symptoms: {}",
        analysis.most_common.join(", ")
    );
    out.push_str("Average Severity Trends:\n");
    for (symptom, severity) in &analysis.severity_trends {
        let _ = writeln!(out, "- {symptom}: {severity:.1}/3");
    }

    out.push_str("\nSymptom Categories:\n");
    let _ = writeln!(out, "Physical: {}", analysis.categories.physical.join(", "));
    let _ = writeln!(
        out,
        "Emotional: {}",
        analysis.categories.emotional.join(", ")
    );
    if !analysis.categories.other.is_empty() {
        let _ = writeln!(out, "Other: {}", analysis.categories.other.join(", "));
    }

    out
}

fn or_unspecified(value: &str) -> &str {
    if value.trim().is_empty() {
        "Not specified"
    } else {
        value
    }
}

/// Build the full insight request for one user.
///
/// `as_of` must be the instant `status` was computed at; it anchors the
/// next-period date.
pub fn build_prompt(
    profile: &UserProfile,
    status: &CycleStatus,
    analysis: &SymptomAnalysis,
    as_of: DateTime<Utc>,
) -> String {
    let prefs = &profile.preferences;
    let cycle_length = effective_cycle_length(profile.cycle.cycle_length);
    let period_length = effective_period_length(profile.period_length);
    let exercise = if prefs.exercise.is_empty() {
        "Not specified".to_string()
    } else {
        prefs.exercise.join(", ")
    };
    let culture = or_unspecified(&prefs.culture);
    let diet = or_unspecified(&prefs.diet);
    let phase = status.current_phase.name;
    let regularity = profile.cycle.cycle_regularity.as_str();

    let mut out = String::new();

    let _ = writeln!(
        out,
        "You are an empathetic women's health expert familiar with {culture} wellness traditions. \
         Provide personalized, supportive guidance that honors both traditional wisdom and modern understanding.\n"
    );

    out.push_str("PERSONAL PROFILE:\n");
    let _ = writeln!(out, "Goals: {}", or_unspecified(&profile.health.goals));
    let _ = writeln!(out, "Favorite Activities: {exercise}");
    let _ = writeln!(out, "Dietary Practice: {diet}");
    let _ = writeln!(out, "Cultural Heritage: {culture}");
    let _ = writeln!(out, "Language: {}\n", or_unspecified(&prefs.language));

    out.push_str("CYCLE JOURNEY:\n");
    if status.is_tracking() {
        out.push_str("Current Phase: not yet known (no period date recorded)\n");
    } else {
        let _ = writeln!(
            out,
            "Current Phase: {phase} (Day {} of {cycle_length})",
            status.day_of_cycle
        );
        if let (Some(start), Some(end)) = (status.phase_start_date, status.phase_end_date) {
            let _ = writeln!(
                out,
                "Phase Window: {} to {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            );
        }
        if let Some(next) = &status.next_phase {
            let _ = writeln!(
                out,
                "Next Phase: {} in {} days",
                next.name, status.days_until_next_phase
            );
        }
        if let Some(next_period) =
            as_of.checked_add_signed(TimeDelta::days(i64::from(status.next_period_in_days)))
        {
            let _ = writeln!(out, "Next Period: {}", next_period.format("%Y-%m-%d"));
        }
    }
    let _ = writeln!(
        out,
        "Cycle Pattern: {regularity} cycles, {period_length} days period\n"
    );

    out.push_str("WELLNESS PROFILE:\n");
    let conditions = if profile.health.has_conditions {
        or_unspecified(&profile.health.conditions)
    } else {
        "No reported conditions"
    };
    let _ = writeln!(out, "Health Considerations: {conditions}");
    let allergies = if profile.allergies.is_empty() {
        "None reported".to_string()
    } else {
        profile.allergies.join(", ")
    };
    let _ = writeln!(out, "Allergies: {allergies}\n");

    out.push_str("YOUR RECENT PATTERNS:\n");
    out.push_str(&format_symptom_analysis(analysis));
    out.push('\n');

    out.push_str("Please provide caring, culturally-sensitive guidance in exactly this format:\n\n");
    let subsections: [[&str; 3]; 5] = [
        [
            "Current symptom recommendations for this phase:",
            "Gentle prevention strategies aligned with your traditions:",
            "Important signs to be mindful of:",
        ],
        [
            "Nourishing foods for your current phase:",
            "Foods to mindfully avoid during this time:",
            "Supportive supplements to consider:",
        ],
        [
            "Harmonious movement practices:",
            "Mindful movement adjustments for your energy:",
            "Restorative techniques from your heritage:",
        ],
        [
            "Calming practices from your cultural tradition:",
            "Supportive daily rituals for emotional balance:",
            "Mindfulness practices that honor your background:",
        ],
        [
            "Understanding your unique pattern:",
            "Gentle adjustments for your cycle:",
            "Preparing for your next phase with care:",
        ],
    ];
    for (i, (title, lines)) in SECTION_TITLES.iter().zip(subsections.iter()).enumerate() {
        let _ = writeln!(out, "{}. {title}", i + 1);
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
        out.push('\n');
    }

    out.push_str(
        "Formatting rules:\n\
         - Keep the exact five numbered sections and their titles\n\
         - Use colons for subsections\n\
         - Place each recommendation on its own line\n\
         - Avoid bullet points or special characters\n\
         - Make each suggestion specific and actionable\n",
    );

    out
}

/// Match a numbered heading such as `1. NUTRITION PLAN` or `**2. MENTAL WELLNESS**`.
fn section_heading(line: &str) -> Option<&str> {
    let body = line.strip_prefix("**").or_else(|| line.strip_prefix('*')).unwrap_or(line);

    let digits = body.len() - body.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = body[digits..].strip_prefix('.')?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let title = rest.trim_start();
    let title = title
        .strip_suffix("**")
        .or_else(|| title.strip_suffix('*'))
        .unwrap_or(title);

    if title.is_empty() || title.contains('*') {
        return None;
    }
    Some(title.trim())
}

/// Split generated text into sections keyed by lowercased heading.
///
/// Lines before the first heading are dropped. Markdown bold markers are
/// stripped from content lines, then a leading `* ` and then a leading `- `. A section is kept
/// when the next heading starts even if it is empty; the final section only
/// when it has content.
pub fn parse_insight_sections(text: &str) -> BTreeMap<String, Vec<String>> {
    let mut sections = BTreeMap::new();
    let mut current: Option<String> = None;
    let mut lines: Vec<String> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }

        if let Some(title) = section_heading(line) {
            if let Some(previous) = current.take() {
                sections.insert(previous.to_lowercase(), std::mem::take(&mut lines));
            }
            current = Some(title.to_string());
            continue;
        }

        if current.is_some() {
            let cleaned = line.replace("**", "");
            let cleaned = cleaned.strip_prefix("* ").unwrap_or(&cleaned);
            let cleaned = cleaned.strip_prefix("- ").unwrap_or(cleaned).trim();
            if !cleaned.is_empty() {
                lines.push(cleaned.to_string());
            }
        }
    }

    if let Some(last) = current {
        if !lines.is_empty() {
            sections.insert(last.to_lowercase(), lines);
        }
    }

    sections
}

/// Generate an insight report for one user.
///
/// # Arguments
///
/// * `generator` - Text-generation service
/// * `profile` - The user's stored profile
/// * `status` - Cycle status computed at `now`
/// * `analysis` - Recent symptom analysis
/// * `now` - Reference timestamp
#[instrument(skip_all, fields(user_id = %profile.user_id))]
pub async fn generate_insights(
    generator: &dyn TextGenerator,
    profile: &UserProfile,
    status: &CycleStatus,
    analysis: SymptomAnalysis,
    now: DateTime<Utc>,
) -> Result<InsightReport, InsightError> {
    let prompt = build_prompt(profile, status, &analysis, now);
    debug!(prompt_chars = prompt.len(), "Requesting insights");

    let text = generator.generate(&prompt).await?;
    let insights = parse_insight_sections(&text);
    debug!(section_count = insights.len(), "Insights parsed");

    Ok(InsightReport {
        insights,
        cycle_context: CycleContext {
            phase: status.current_phase.name,
            day_of_cycle: status.day_of_cycle,
            next_period_in_days: status.next_period_in_days,
            symptom_analysis: analysis,
        },
        timestamp: now,
        next_update_recommended: now + TimeDelta::hours(REPORT_TTL_HOURS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::analyze_symptoms;
    use crate::model::{ProfileRequest, SymptomCategory, SymptomObservation};
    use crate::phase::compute_cycle_status;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct CannedGenerator {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 9, 30, 0).unwrap()
    }

    fn profile() -> UserProfile {
        let mut request = ProfileRequest::default();
        request.cycle.last_period_date = Some(as_of() - TimeDelta::days(10));
        request.allergies = vec!["peanuts".to_string()];
        request.preferences.diet = "vegetarian".to_string();
        request.preferences.exercise = vec!["yoga".to_string(), "running".to_string()];
        UserProfile::from_request("user-a", request, as_of())
    }

    fn analysis() -> SymptomAnalysis {
        let observation = |t: &str, category, severity| SymptomObservation {
            symptom_type: t.to_string(),
            category,
            severity,
            date: as_of(),
        };
        analyze_symptoms(&[
            observation("Cramps", SymptomCategory::Physical, 2),
            observation("Cramps", SymptomCategory::Physical, 3),
            observation("Anxiety", SymptomCategory::Emotional, 1),
        ])
    }

    #[test]
    fn test_format_symptom_analysis() {
        let text = format_symptom_analysis(&analysis());

        assert!(text.contains("Most Common Symptoms: Cramps, Anxiety"));
        assert!(text.contains("- Cramps: 2.5/3"));
        assert!(text.contains("- Anxiety: 1.0/3"));
        assert!(text.contains("Physical: Cramps, Cramps"));
        assert!(text.contains("Emotional: Anxiety"));
        assert!(!text.contains("Other:"));
    }

    #[test]
    fn test_build_prompt_includes_cycle_context() {
        let profile = profile();
        let status = compute_cycle_status(&profile.cycle, as_of());
        let prompt = build_prompt(&profile, &status, &analysis(), as_of());

        assert!(prompt.contains("Current Phase: Follicular (Day 11 of 28)"));
        assert!(prompt.contains("Next Phase: Ovulatory in 0 days"));
        assert!(prompt.contains("Phase Window: 2026-03-10 to 2026-03-15"));
        assert!(prompt.contains("Next Period: 2026-04-02"));
        assert!(prompt.contains("regular cycles, 5 days period"));
        assert!(prompt.contains("Allergies: peanuts"));
        assert!(prompt.contains("Favorite Activities: yoga, running"));
        assert!(prompt.contains("Health Considerations: No reported conditions"));
        for (i, title) in SECTION_TITLES.iter().enumerate() {
            assert!(prompt.contains(&format!("{}. {title}", i + 1)));
        }
    }

    #[test]
    fn test_build_prompt_without_period_date() {
        let mut profile = profile();
        profile.cycle.last_period_date = None;
        profile.allergies.clear();
        let status = compute_cycle_status(&profile.cycle, as_of());

        let prompt = build_prompt(&profile, &status, &SymptomAnalysis::default(), as_of());

        assert!(prompt.contains("Current Phase: not yet known"));
        assert!(!prompt.contains("Next Period:"));
        assert!(prompt.contains("Allergies: None reported"));
    }

    #[test]
    fn test_section_heading_forms() {
        assert_eq!(section_heading("1. SYMPTOM MANAGEMENT"), Some("SYMPTOM MANAGEMENT"));
        assert_eq!(section_heading("**2. NUTRITION PLAN**"), Some("NUTRITION PLAN"));
        assert_eq!(section_heading("*3. PHYSICAL WELLNESS*"), Some("PHYSICAL WELLNESS"));
        assert_eq!(section_heading("10.  CYCLE INSIGHTS"), Some("CYCLE INSIGHTS"));
        assert_eq!(section_heading("1.5 cups of water daily"), None);
        assert_eq!(section_heading("Drink water"), None);
        assert_eq!(section_heading("2."), None);
    }

    #[test]
    fn test_parse_insight_sections() {
        let text = "Here is your guidance.\n\
                    \n\
                    **1. SYMPTOM MANAGEMENT**\n\
                    Current symptom recommendations: **Warm compress** for cramps\n\
                    * Rest when needed\n\
                    \n\
                    2. NUTRITION PLAN\n\
                    - Leafy greens\n\
                    3. PHYSICAL WELLNESS\n\
                    4. MENTAL WELLNESS\n";

        let sections = parse_insight_sections(text);

        assert_eq!(
            sections["symptom management"],
            vec![
                "Current symptom recommendations: Warm compress for cramps",
                "Rest when needed"
            ]
        );
        assert_eq!(sections["nutrition plan"], vec!["Leafy greens"]);
        // An empty section followed by another heading is kept
        assert!(sections["physical wellness"].is_empty());
        // A trailing empty section is dropped
        assert!(!sections.contains_key("mental wellness"));
    }

    #[test]
    fn test_parse_strips_nested_bullets() {
        let sections = parse_insight_sections("1. NUTRITION PLAN\n* - Leafy greens\n- * Lentils\n");

        assert_eq!(sections["nutrition plan"], vec!["Leafy greens", "* Lentils"]);
    }

    #[test]
    fn test_build_prompt_omits_unrepresentable_next_period() {
        let mut profile = profile();
        profile.cycle.last_period_date = Some(as_of());
        profile.cycle.cycle_length = Some(1_000_000_000);
        let status = compute_cycle_status(&profile.cycle, as_of());
        assert_eq!(status.next_period_in_days, 1_000_000_000);

        let prompt = build_prompt(&profile, &status, &SymptomAnalysis::default(), as_of());

        assert!(prompt.contains("Current Phase: Menstrual (Day 1 of 1000000000)"));
        assert!(!prompt.contains("Next Period:"));
    }

    #[test]
    fn test_parse_without_headings() {
        assert!(parse_insight_sections("No structure at all\njust text").is_empty());
        assert!(parse_insight_sections("").is_empty());
    }

    #[tokio::test]
    async fn test_generate_insights_report() {
        let generator = CannedGenerator {
            reply: "1. CYCLE INSIGHTS\nYour energy is rising.".to_string(),
            prompts: Mutex::new(Vec::new()),
        };
        let profile = profile();
        let status = compute_cycle_status(&profile.cycle, as_of());

        let report = generate_insights(&generator, &profile, &status, analysis(), as_of())
            .await
            .unwrap();

        assert_eq!(
            report.insights["cycle insights"],
            vec!["Your energy is rising."]
        );
        assert_eq!(report.cycle_context.phase, CyclePhase::Follicular);
        assert_eq!(report.cycle_context.day_of_cycle, 11);
        assert_eq!(report.cycle_context.next_period_in_days, 18);
        assert_eq!(report.next_update_recommended - report.timestamp, TimeDelta::hours(24));
        assert_eq!(generator.prompts.lock().unwrap().len(), 1);
    }
}
