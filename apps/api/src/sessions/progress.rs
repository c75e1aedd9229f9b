//! Completion tracking and skill progress on top of the session store.
//!
//! Documents:
//!   activities  -> { "activities": [CompletionEntry, ...] }
//!   progress    -> { "skills": { <skill>: SkillProgress } }
//!   feedback    -> { "feedback_entries": [...] }
//!   bookmarks   -> { "bookmarks": [Bookmark, ...] }

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::sessions::store::{SessionStore, StorageError};

const ACTIVITIES_DOC: &str = "activities";
const PROGRESS_DOC: &str = "progress";
const FEEDBACK_DOC: &str = "feedback";
const BOOKMARKS_DOC: &str = "bookmarks";

pub const MAX_INCREMENT: f64 = 10.0;
pub const MAX_SKILL_SCORE: f64 = 100.0;
const TOP_SKILLS: usize = 5;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("Malformed {0} document: {1}")]
    Malformed(&'static str, serde_json::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    Partial,
    Started,
    Refused,
    NotTried,
}

impl CompletionStatus {
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Completed => 1.0,
            Self::Partial => 0.6,
            Self::Started => 0.3,
            Self::Refused => 0.1,
            Self::NotTried => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    TooEasy,
    BitEasy,
    #[default]
    JustRight,
    BitHard,
    TooHard,
}

impl Difficulty {
    pub fn multiplier(self) -> f64 {
        match self {
            Self::TooEasy => 0.8,
            Self::BitEasy => 0.9,
            Self::JustRight => 1.0,
            Self::BitHard => 1.2,
            // Too hard means less was learned.
            Self::TooHard => 0.7,
        }
    }
}

/// Skill points earned by one activity, 0..=10.
pub fn progress_increment(status: CompletionStatus, rating: u8, difficulty: Difficulty) -> f64 {
    let raw = status.multiplier() * (f64::from(rating) / 5.0) * difficulty.multiplier() * 10.0;
    raw.min(MAX_INCREMENT)
}

/// Request body for a completed (or attempted) activity.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRecord {
    pub activity_name: String,
    pub status: CompletionStatus,
    pub rating: u8,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub skills_practiced: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionEntry {
    pub activity_name: String,
    pub completion_status: CompletionStatus,
    pub rating: u8,
    pub difficulty: Difficulty,
    pub duration_minutes: u32,
    #[serde(default)]
    pub skills_practiced: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub completion_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub previous_score: f64,
    pub new_score: f64,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillProgress {
    pub score: f64,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressDoc {
    #[serde(default)]
    skills: BTreeMap<String, SkillProgress>,
}

#[derive(Debug, Default, Deserialize)]
struct ActivitiesDoc {
    #[serde(default)]
    activities: Vec<CompletionEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillUpdate {
    pub skill: String,
    pub previous_score: f64,
    pub new_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub increment: f64,
    pub skills: Vec<SkillUpdate>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkillScore {
    pub skill: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Statistics {
    pub total_activities: usize,
    pub average_rating: f64,
    pub total_hours: f64,
    pub activities_this_week: usize,
    pub top_skills: Vec<SkillScore>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Badge {
    pub name: &'static str,
    pub description: &'static str,
}

/// A badge not yet earned, with how far along the child is.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Milestone {
    pub name: &'static str,
    pub description: &'static str,
    pub progress: f64,
    pub target: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Achievements {
    pub earned: Vec<Badge>,
    pub next: Vec<Milestone>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Insight {
    pub title: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementReport {
    pub achievements: Achievements,
    pub insights: Vec<Insight>,
}

/// (threshold, name, description), ascending.
const ACTIVITY_MILESTONES: [(f64, &str, &str); 5] = [
    (1.0, "First Steps", "Completed your first activity"),
    (5.0, "Getting Started", "Completed 5 activities"),
    (10.0, "Building Momentum", "Completed 10 activities"),
    (25.0, "Dedicated Learner", "Completed 25 activities"),
    (50.0, "Achievement Master", "Completed 50 activities"),
];

const HOUR_MILESTONES: [(f64, &str, &str); 3] = [
    (5.0, "Time Investor", "Spent 5+ hours in activities"),
    (20.0, "Dedicated Student", "Spent 20+ hours learning"),
    (50.0, "Learning Champion", "Spent 50+ hours developing skills"),
];

const EXCELLENCE_RATING: f64 = 4.5;
const HIGH_SKILL_SCORE: f64 = 80.0;
const MULTI_SKILL_COUNT: usize = 3;
const LOW_SKILL_SCORE: f64 = 30.0;

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRecord {
    pub activity_name: String,
    #[serde(default = "default_feedback_type")]
    pub feedback_type: String,
    #[serde(default)]
    pub feedback_data: Value,
}

fn default_feedback_type() -> String {
    "detailed_feedback".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Logs an activity attempt and credits every practiced skill.
pub async fn record_completion(
    store: &SessionStore,
    session: Uuid,
    user_id: Option<&str>,
    record: CompletionRecord,
) -> Result<CompletionOutcome, ProgressError> {
    if !(1..=5).contains(&record.rating) {
        return Err(ProgressError::InvalidRating(record.rating));
    }

    let increment = progress_increment(record.status, record.rating, record.difficulty);
    let now = Utc::now();

    let skills: Vec<String> = record
        .skills_practiced
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let entry = CompletionEntry {
        activity_name: record.activity_name.trim().to_string(),
        completion_status: record.status,
        rating: record.rating,
        difficulty: record.difficulty,
        duration_minutes: record.duration_minutes,
        skills_practiced: skills.clone(),
        notes: record.notes.clone(),
        completion_date: now,
    };
    let entry = serde_json::to_value(&entry).map_err(|e| ProgressError::Malformed(ACTIVITIES_DOC, e))?;
    store
        .append(session, ACTIVITIES_DOC, ACTIVITIES_DOC, entry, user_id)
        .await?;

    if skills.is_empty() {
        return Ok(CompletionOutcome {
            increment,
            skills: Vec::new(),
        });
    }

    let note = format!("Updated from activity feedback: +{increment:.1}");
    let updates = store
        .update(session, PROGRESS_DOC, user_id, |doc| {
            let mut skill_map: BTreeMap<String, SkillProgress> = match doc.remove("skills") {
                Some(value) => serde_json::from_value(value)
                    .map_err(|e| ProgressError::Malformed(PROGRESS_DOC, e))?,
                None => BTreeMap::new(),
            };
            let updates = credit_skills(&mut skill_map, skills, increment, &note, now);
            let value = serde_json::to_value(&skill_map)
                .map_err(|e| ProgressError::Malformed(PROGRESS_DOC, e))?;
            doc.insert("skills".to_string(), value);
            Ok::<_, ProgressError>(updates)
        })
        .await?;

    info!(
        "Recorded '{}' for session {session}: +{increment:.1} across {} skills",
        record.activity_name,
        updates.len()
    );
    Ok(CompletionOutcome {
        increment,
        skills: updates,
    })
}

fn credit_skills(
    skill_map: &mut BTreeMap<String, SkillProgress>,
    skills: Vec<String>,
    increment: f64,
    note: &str,
    now: DateTime<Utc>,
) -> Vec<SkillUpdate> {
    let mut updates = Vec::with_capacity(skills.len());
    for skill in skills {
        let entry = skill_map
            .entry(skill.clone())
            .or_insert_with(|| SkillProgress {
                score: 0.0,
                history: Vec::new(),
                last_updated: now,
            });
        let previous = entry.score;
        let new_score = (previous + increment).min(MAX_SKILL_SCORE);

        entry.history.push(HistoryEntry {
            previous_score: previous,
            new_score,
            date: now,
            notes: Some(note.to_string()),
        });
        entry.score = new_score;
        entry.last_updated = now;

        updates.push(SkillUpdate {
            skill,
            previous_score: previous,
            new_score,
        });
    }
    updates
}

pub async fn record_feedback(
    store: &SessionStore,
    session: Uuid,
    user_id: Option<&str>,
    record: FeedbackRecord,
) -> Result<Value, ProgressError> {
    let item = json!({
        "activity_name": record.activity_name,
        "feedback_type": record.feedback_type,
        "feedback_data": record.feedback_data,
        "submitted_at": Utc::now().to_rfc3339(),
    });
    Ok(store
        .append(session, FEEDBACK_DOC, "feedback_entries", item, user_id)
        .await?)
}

pub async fn skill_progress(
    store: &SessionStore,
    session: Uuid,
) -> Result<BTreeMap<String, SkillProgress>, ProgressError> {
    Ok(load_progress(store, session).await?.skills)
}

/// Completed activities, newest first.
pub async fn activity_history(
    store: &SessionStore,
    session: Uuid,
) -> Result<Vec<CompletionEntry>, ProgressError> {
    let mut entries = load_activities(store, session).await?;
    entries.sort_by(|a, b| a.completion_date.cmp(&b.completion_date));
    entries.reverse();
    Ok(entries)
}

pub async fn statistics(store: &SessionStore, session: Uuid) -> Result<Statistics, ProgressError> {
    let activities = load_activities(store, session).await?;
    let progress = load_progress(store, session).await?;
    Ok(compute_statistics(&activities, &progress.skills, Utc::now()))
}

fn compute_statistics(
    activities: &[CompletionEntry],
    skills: &BTreeMap<String, SkillProgress>,
    now: DateTime<Utc>,
) -> Statistics {
    let average_rating = if activities.is_empty() {
        0.0
    } else {
        let sum: u32 = activities.iter().map(|a| u32::from(a.rating)).sum();
        f64::from(sum) / activities.len() as f64
    };
    let minutes: u64 = activities.iter().map(|a| u64::from(a.duration_minutes)).sum();
    let week_ago = now - Duration::days(7);

    let mut top_skills: Vec<SkillScore> = skills
        .iter()
        .map(|(skill, p)| SkillScore {
            skill: skill.clone(),
            score: p.score,
        })
        .collect();
    top_skills.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.skill.cmp(&b.skill)));
    top_skills.truncate(TOP_SKILLS);

    Statistics {
        total_activities: activities.len(),
        average_rating,
        total_hours: minutes as f64 / 60.0,
        activities_this_week: activities
            .iter()
            .filter(|a| a.completion_date >= week_ago)
            .count(),
        top_skills,
    }
}

/// Earned badges, plus the next badge of each ladder that is still ahead.
pub fn compute_achievements(
    stats: &Statistics,
    skills: &BTreeMap<String, SkillProgress>,
) -> Achievements {
    let mut achievements = Achievements::default();
    climb(&mut achievements, &ACTIVITY_MILESTONES, stats.total_activities as f64);

    if stats.average_rating >= EXCELLENCE_RATING {
        achievements.earned.push(Badge {
            name: "Excellence Seeker",
            description: "Maintained high activity ratings",
        });
    } else if stats.average_rating >= 4.0 {
        achievements.next.push(Milestone {
            name: "Excellence Seeker",
            description: "Maintain a 4.5+ average rating",
            progress: stats.average_rating,
            target: EXCELLENCE_RATING,
        });
    }

    climb(&mut achievements, &HOUR_MILESTONES, stats.total_hours);

    let high = skills.values().filter(|p| p.score >= HIGH_SKILL_SCORE).count();
    if high >= MULTI_SKILL_COUNT {
        achievements.earned.push(Badge {
            name: "Multi-Skill Master",
            description: "Reached 80%+ progress in 3+ skills",
        });
    } else if high >= 1 {
        achievements.next.push(Milestone {
            name: "Multi-Skill Master",
            description: "Reach 80%+ in 3 different skills",
            progress: high as f64,
            target: MULTI_SKILL_COUNT as f64,
        });
    }
    achievements
}

fn climb(achievements: &mut Achievements, ladder: &[(f64, &'static str, &'static str)], value: f64) {
    for &(threshold, name, description) in ladder {
        if value >= threshold {
            achievements.earned.push(Badge { name, description });
        } else {
            achievements.next.push(Milestone {
                name,
                description,
                progress: value,
                target: threshold,
            });
            break;
        }
    }
}

/// Short observations on consistency, engagement and skill balance.
pub fn progress_insights(
    stats: &Statistics,
    skills: &BTreeMap<String, SkillProgress>,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    if stats.activities_this_week >= 3 {
        insights.push(Insight {
            title: "Great Consistency",
            message: format!(
                "{} activities completed this week. Consistent practice leads to better outcomes.",
                stats.activities_this_week
            ),
        });
    } else if stats.activities_this_week == 0 && stats.total_activities > 0 {
        insights.push(Insight {
            title: "Time for Practice",
            message: "No activities this week. Regular practice helps maintain progress.".to_string(),
        });
    }

    if stats.average_rating >= 4.0 {
        insights.push(Insight {
            title: "High Engagement",
            message: format!(
                "An average rating of {:.1}/5 shows great engagement with activities.",
                stats.average_rating
            ),
        });
    } else if stats.average_rating < 3.0 && stats.total_activities >= 5 {
        insights.push(Insight {
            title: "Activity Adjustment",
            message: "Try different types of activities to find what works best for your child."
                .to_string(),
        });
    }

    // Ties go to the alphabetically first skill.
    let strongest = skills
        .iter()
        .reduce(|best, next| if next.1.score > best.1.score { next } else { best });
    let weakest = skills
        .iter()
        .reduce(|low, next| if next.1.score < low.1.score { next } else { low });

    if let Some((skill, progress)) = strongest {
        insights.push(Insight {
            title: "Strength Area",
            message: format!("{skill} is the strongest area with {:.1}% progress.", progress.score),
        });
    }
    if let Some((skill, progress)) = weakest {
        if progress.score < LOW_SKILL_SCORE {
            insights.push(Insight {
                title: "Growth Opportunity",
                message: format!("More activities focused on {skill} would build this skill area."),
            });
        }
    }

    if stats.total_activities >= 10 {
        insights.push(Insight {
            title: "Milestone Achievement",
            message: format!(
                "{} activities completed. Great learning habits are forming.",
                stats.total_activities
            ),
        });
    }
    insights
}

pub async fn achievements(
    store: &SessionStore,
    session: Uuid,
) -> Result<AchievementReport, ProgressError> {
    let activities = load_activities(store, session).await?;
    let progress = load_progress(store, session).await?;
    let stats = compute_statistics(&activities, &progress.skills, Utc::now());
    Ok(AchievementReport {
        achievements: compute_achievements(&stats, &progress.skills),
        insights: progress_insights(&stats, &progress.skills),
    })
}

/// Returns `false` when the URL was already bookmarked.
pub async fn bookmark_article(
    store: &SessionStore,
    session: Uuid,
    user_id: Option<&str>,
    bookmark: Bookmark,
) -> Result<bool, ProgressError> {
    let mut item = serde_json::to_value(&bookmark).map_err(|e| ProgressError::Malformed(BOOKMARKS_DOC, e))?;
    if let Value::Object(fields) = &mut item {
        fields.insert("bookmarked_at".to_string(), json!(Utc::now().to_rfc3339()));
    }

    store
        .update(session, BOOKMARKS_DOC, user_id, |doc| {
            let items = doc
                .entry(BOOKMARKS_DOC)
                .or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(items) = items else {
                return Err(ProgressError::Malformed(
                    BOOKMARKS_DOC,
                    serde::de::Error::custom("bookmarks is not an array"),
                ));
            };
            let taken = items
                .iter()
                .any(|b| b.get("url").and_then(Value::as_str) == Some(bookmark.url.as_str()));
            if taken {
                return Ok(false);
            }
            items.push(item);
            Ok(true)
        })
        .await
}

pub async fn bookmarks(store: &SessionStore, session: Uuid) -> Result<Vec<Bookmark>, ProgressError> {
    let Some(doc) = store.load(session, BOOKMARKS_DOC).await? else {
        return Ok(Vec::new());
    };
    let items = doc.get(BOOKMARKS_DOC).cloned().unwrap_or(Value::Array(Vec::new()));
    serde_json::from_value(items).map_err(|e| ProgressError::Malformed(BOOKMARKS_DOC, e))
}

async fn load_progress(store: &SessionStore, session: Uuid) -> Result<ProgressDoc, ProgressError> {
    match store.load(session, PROGRESS_DOC).await? {
        Some(doc) => serde_json::from_value(doc).map_err(|e| ProgressError::Malformed(PROGRESS_DOC, e)),
        None => Ok(ProgressDoc::default()),
    }
}

async fn load_activities(
    store: &SessionStore,
    session: Uuid,
) -> Result<Vec<CompletionEntry>, ProgressError> {
    match store.load(session, ACTIVITIES_DOC).await? {
        Some(doc) => serde_json::from_value::<ActivitiesDoc>(doc)
            .map(|d| d.activities)
            .map_err(|e| ProgressError::Malformed(ACTIVITIES_DOC, e)),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(status: CompletionStatus, rating: u8, skills: &[&str]) -> CompletionRecord {
        CompletionRecord {
            activity_name: "Focus Jar".to_string(),
            status,
            rating,
            difficulty: Difficulty::JustRight,
            duration_minutes: 30,
            skills_practiced: skills.iter().map(|s| s.to_string()).collect(),
            notes: None,
        }
    }

    async fn session() -> (tempfile::TempDir, SessionStore, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), None);
        let id = store.create_session().await.unwrap().session_id;
        (dir, store, id)
    }

    #[test]
    fn test_increment_multipliers() {
        let full = progress_increment(CompletionStatus::Completed, 5, Difficulty::JustRight);
        assert!((full - 10.0).abs() < 1e-9);

        let partial = progress_increment(CompletionStatus::Partial, 4, Difficulty::TooHard);
        assert!((partial - 0.6 * 0.8 * 0.7 * 10.0).abs() < 1e-9);

        assert_eq!(
            progress_increment(CompletionStatus::NotTried, 5, Difficulty::BitHard),
            0.0
        );
    }

    #[test]
    fn test_increment_is_capped_at_ten() {
        let hard = progress_increment(CompletionStatus::Completed, 5, Difficulty::BitHard);
        assert_eq!(hard, MAX_INCREMENT);
    }

    #[test]
    fn test_status_wire_names() {
        let status: CompletionStatus = serde_json::from_str("\"not_tried\"").unwrap();
        assert_eq!(status, CompletionStatus::NotTried);
        let difficulty: Difficulty = serde_json::from_str("\"bit_hard\"").unwrap();
        assert_eq!(difficulty, Difficulty::BitHard);
    }

    #[tokio::test]
    async fn test_completion_updates_skills_with_history() {
        let (_dir, store, id) = session().await;

        let first = record_completion(
            &store,
            id,
            Some("u1"),
            completion(CompletionStatus::Completed, 5, &["Focus", " Fine Motor ", ""]),
        )
        .await
        .unwrap();
        assert_eq!(first.skills.len(), 2);

        record_completion(&store, id, Some("u1"), completion(CompletionStatus::Partial, 5, &["Focus"]))
            .await
            .unwrap();

        let skills = skill_progress(&store, id).await.unwrap();
        let focus = &skills["Focus"];
        assert!((focus.score - 16.0).abs() < 1e-9);
        assert_eq!(focus.history.len(), 2);
        assert!((focus.history[1].previous_score - 10.0).abs() < 1e-9);
        assert!(skills.contains_key("Fine Motor"));
    }

    #[tokio::test]
    async fn test_skill_score_is_capped_at_one_hundred() {
        let (_dir, store, id) = session().await;
        for _ in 0..12 {
            record_completion(&store, id, None, completion(CompletionStatus::Completed, 5, &["Focus"]))
                .await
                .unwrap();
        }
        let skills = skill_progress(&store, id).await.unwrap();
        assert_eq!(skills["Focus"].score, MAX_SKILL_SCORE);
    }

    #[tokio::test]
    async fn test_rating_out_of_range_is_rejected() {
        let (_dir, store, id) = session().await;
        let result =
            record_completion(&store, id, None, completion(CompletionStatus::Completed, 0, &[])).await;
        assert!(matches!(result, Err(ProgressError::InvalidRating(0))));
        assert!(activity_history(&store, id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statistics_and_history() {
        let (_dir, store, id) = session().await;
        record_completion(&store, id, None, completion(CompletionStatus::Completed, 4, &["Focus"]))
            .await
            .unwrap();
        let mut second = completion(CompletionStatus::Completed, 2, &["Calm"]);
        second.activity_name = "Calm Corner".to_string();
        record_completion(&store, id, None, second).await.unwrap();

        let stats = statistics(&store, id).await.unwrap();
        assert_eq!(stats.total_activities, 2);
        assert!((stats.average_rating - 3.0).abs() < 1e-9);
        assert!((stats.total_hours - 1.0).abs() < 1e-9);
        assert_eq!(stats.activities_this_week, 2);
        assert_eq!(stats.top_skills[0].skill, "Focus");

        let history = activity_history(&store, id).await.unwrap();
        assert_eq!(history[0].activity_name, "Calm Corner");
    }

    #[test]
    fn test_top_skills_keeps_five_highest() {
        let now = Utc::now();
        let skills: BTreeMap<String, SkillProgress> = (0..7)
            .map(|i| {
                (
                    format!("skill{i}"),
                    SkillProgress {
                        score: f64::from(i * 10),
                        history: Vec::new(),
                        last_updated: now,
                    },
                )
            })
            .collect();
        let old = CompletionEntry {
            activity_name: "Old".to_string(),
            completion_status: CompletionStatus::Completed,
            rating: 3,
            difficulty: Difficulty::JustRight,
            duration_minutes: 0,
            skills_practiced: Vec::new(),
            notes: None,
            completion_date: now - Duration::days(10),
        };

        let stats = compute_statistics(&[old], &skills, now);
        assert_eq!(stats.activities_this_week, 0);
        let names: Vec<_> = stats.top_skills.iter().map(|s| s.skill.as_str()).collect();
        assert_eq!(names, vec!["skill6", "skill5", "skill4", "skill3", "skill2"]);
    }

    #[tokio::test]
    async fn test_bookmarks_are_unique_by_url() {
        let (_dir, store, id) = session().await;
        let mark = Bookmark {
            title: "Sleep tips".to_string(),
            url: "https://example.org/sleep".to_string(),
            summary: None,
        };
        assert!(bookmark_article(&store, id, None, mark.clone()).await.unwrap());
        assert!(!bookmark_article(&store, id, None, mark.clone()).await.unwrap());
        assert_eq!(bookmarks(&store, id).await.unwrap(), vec![mark]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_completions_all_count() {
        let (_dir, store, id) = session().await;
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    record_completion(&store, id, None, completion(CompletionStatus::Completed, 5, &["Focus"]))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let skills = skill_progress(&store, id).await.unwrap();
        assert!((skills["Focus"].score - 80.0).abs() < 1e-9);
        assert_eq!(skills["Focus"].history.len(), 8);
        assert_eq!(activity_history(&store, id).await.unwrap().len(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookmarks_of_one_url_store_it_once() {
        let (_dir, store, id) = session().await;
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mark = Bookmark {
                        title: "Sleep tips".to_string(),
                        url: "https://example.org/sleep".to_string(),
                        summary: None,
                    };
                    bookmark_article(&store, id, None, mark).await.unwrap()
                })
            })
            .collect();

        let mut added = 0;
        for task in tasks {
            if task.await.unwrap() {
                added += 1;
            }
        }
        assert_eq!(added, 1);
        assert_eq!(bookmarks(&store, id).await.unwrap().len(), 1);
    }

    #[test]
    fn test_total_hours_does_not_overflow() {
        let now = Utc::now();
        let long = CompletionEntry {
            activity_name: "Marathon".to_string(),
            completion_status: CompletionStatus::Completed,
            rating: 5,
            difficulty: Difficulty::JustRight,
            duration_minutes: u32::MAX,
            skills_practiced: Vec::new(),
            notes: None,
            completion_date: now,
        };
        let stats = compute_statistics(&[long.clone(), long], &BTreeMap::new(), now);
        let expected = 2.0 * f64::from(u32::MAX) / 60.0;
        assert!((stats.total_hours - expected).abs() < 1e-3);
    }

    fn stats(total: usize, rating: f64, hours: f64, this_week: usize) -> Statistics {
        Statistics {
            total_activities: total,
            average_rating: rating,
            total_hours: hours,
            activities_this_week: this_week,
            top_skills: Vec::new(),
        }
    }

    fn skill_scores(scores: &[(&str, f64)]) -> BTreeMap<String, SkillProgress> {
        let now = Utc::now();
        scores
            .iter()
            .map(|(name, score)| {
                (
                    name.to_string(),
                    SkillProgress {
                        score: *score,
                        history: Vec::new(),
                        last_updated: now,
                    },
                )
            })
            .collect()
    }

    fn earned_names(a: &Achievements) -> Vec<&str> {
        a.earned.iter().map(|b| b.name).collect()
    }

    #[test]
    fn test_achievement_ladders_stop_at_next_milestone() {
        let a = compute_achievements(&stats(7, 3.5, 6.0, 1), &BTreeMap::new());
        assert_eq!(
            earned_names(&a),
            vec!["First Steps", "Getting Started", "Time Investor"]
        );
        assert_eq!(
            a.next,
            vec![
                Milestone {
                    name: "Building Momentum",
                    description: "Completed 10 activities",
                    progress: 7.0,
                    target: 10.0,
                },
                Milestone {
                    name: "Dedicated Student",
                    description: "Spent 20+ hours learning",
                    progress: 6.0,
                    target: 20.0,
                },
            ]
        );
    }

    #[test]
    fn test_no_activity_shows_first_milestones_only() {
        let a = compute_achievements(&stats(0, 0.0, 0.0, 0), &BTreeMap::new());
        assert!(a.earned.is_empty());
        let next: Vec<_> = a.next.iter().map(|m| m.name).collect();
        assert_eq!(next, vec!["First Steps", "Time Investor"]);
    }

    #[test]
    fn test_rating_and_multi_skill_badges() {
        let top = compute_achievements(
            &stats(60, 4.5, 55.0, 0),
            &skill_scores(&[("Focus", 80.0), ("Calm", 95.0), ("Motor", 81.0)]),
        );
        let earned = earned_names(&top);
        assert!(earned.contains(&"Excellence Seeker"));
        assert!(earned.contains(&"Multi-Skill Master"));
        assert!(earned.contains(&"Achievement Master"));
        assert!(earned.contains(&"Learning Champion"));
        assert!(top.next.is_empty());

        let close = compute_achievements(
            &stats(2, 4.2, 1.0, 0),
            &skill_scores(&[("Focus", 85.0), ("Calm", 79.9)]),
        );
        let excellence = close.next.iter().find(|m| m.name == "Excellence Seeker").unwrap();
        assert_eq!(excellence.target, 4.5);
        let multi = close.next.iter().find(|m| m.name == "Multi-Skill Master").unwrap();
        assert_eq!((multi.progress, multi.target), (1.0, 3.0));

        let neither = compute_achievements(&stats(2, 3.9, 1.0, 0), &skill_scores(&[("Focus", 10.0)]));
        assert!(neither
            .next
            .iter()
            .all(|m| m.name != "Excellence Seeker" && m.name != "Multi-Skill Master"));
    }

    #[test]
    fn test_insights_cover_consistency_engagement_and_skills() {
        let skills = skill_scores(&[("Calm", 12.0), ("Focus", 64.0)]);
        let insights = progress_insights(&stats(12, 4.25, 3.0, 3), &skills);
        let titles: Vec<_> = insights.iter().map(|i| i.title).collect();
        assert_eq!(
            titles,
            vec![
                "Great Consistency",
                "High Engagement",
                "Strength Area",
                "Growth Opportunity",
                "Milestone Achievement"
            ]
        );
        assert!(insights[1].message.contains("4.2/5") || insights[1].message.contains("4.3/5"));
        assert!(insights[2].message.starts_with("Focus"));
        assert!(insights[3].message.contains("Calm"));
    }

    #[test]
    fn test_insights_for_lapsed_low_rated_practice() {
        let insights = progress_insights(&stats(5, 2.5, 1.0, 0), &BTreeMap::new());
        let titles: Vec<_> = insights.iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["Time for Practice", "Activity Adjustment"]);

        let none = progress_insights(&stats(0, 0.0, 0.0, 0), &BTreeMap::new());
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_achievements_from_stored_completions() {
        let (_dir, store, id) = session().await;
        record_completion(&store, id, None, completion(CompletionStatus::Completed, 5, &["Focus"]))
            .await
            .unwrap();
        let report = achievements(&store, id).await.unwrap();
        assert_eq!(earned_names(&report.achievements), vec!["First Steps", "Excellence Seeker"]);
        assert!(report.insights.iter().any(|i| i.title == "Strength Area"));
    }

    #[tokio::test]
    async fn test_feedback_entries_accumulate() {
        let (_dir, store, id) = session().await;
        let record = FeedbackRecord {
            activity_name: "Focus Jar".to_string(),
            feedback_type: default_feedback_type(),
            feedback_data: json!({"interest_level": "high"}),
        };
        record_feedback(&store, id, Some("u1"), record.clone()).await.unwrap();
        let doc = record_feedback(&store, id, Some("u1"), record).await.unwrap();
        assert_eq!(doc["feedback_entries"].as_array().unwrap().len(), 2);
    }
}
