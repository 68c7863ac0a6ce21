use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier as the server sends it. Numeric ids stay numeric on the way
/// back out so request bodies round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(n) => RecordId::Number(n),
            Err(_) => RecordId::Text(s.to_string()),
        })
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Screening,
    Interview,
    Offer,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Screening,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire form, e.g. `"SCREENING"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "APPLIED",
            ApplicationStatus::Screening => "SCREENING",
            ApplicationStatus::Interview => "INTERVIEW",
            ApplicationStatus::Offer => "OFFER",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Screening => "Screening",
            ApplicationStatus::Interview => "Interview",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    pub fn prev(self) -> Option<Self> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| {
                status.as_str().eq_ignore_ascii_case(wanted) || status.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| {
                format!(
                    "unknown status '{}' (expected one of: applied, screening, interview, offer, rejected)",
                    s
                )
            })
    }
}

// Missing, null, or unrecognized statuses land in the first column.
fn status_or_applied<'de, D>(deserializer: D) -> Result<ApplicationStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.parse().ok())
        .unwrap_or(ApplicationStatus::Applied))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewType {
    PhoneScreen,
    Technical,
    Behavioral,
    Onsite,
    Final,
}

impl InterviewType {
    pub const ALL: [InterviewType; 5] = [
        InterviewType::PhoneScreen,
        InterviewType::Technical,
        InterviewType::Behavioral,
        InterviewType::Onsite,
        InterviewType::Final,
    ];

    pub fn label(self) -> &'static str {
        match self {
            InterviewType::PhoneScreen => "Phone Screen",
            InterviewType::Technical => "Technical",
            InterviewType::Behavioral => "Behavioral",
            InterviewType::Onsite => "Onsite",
            InterviewType::Final => "Final",
        }
    }
}

impl fmt::Display for InterviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for InterviewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace([' ', '-'], "_").to_ascii_lowercase();
        match normalized.as_str() {
            "phone_screen" | "phone" => Ok(InterviewType::PhoneScreen),
            "technical" => Ok(InterviewType::Technical),
            "behavioral" => Ok(InterviewType::Behavioral),
            "onsite" => Ok(InterviewType::Onsite),
            "final" => Ok(InterviewType::Final),
            _ => Err(format!(
                "unknown interview type '{}' (expected one of: phone-screen, technical, behavioral, onsite, final)",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    #[serde(rename = "type")]
    pub interview_type: InterviewType,
    pub scheduled_date: String, // local "YYYY-MM-DDTHH:MM"
    #[serde(default)]
    pub location: String, // address or meeting link
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: RecordId,
    #[serde(default)]
    pub job_id: Option<RecordId>,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "status_or_applied")]
    pub status: ApplicationStatus,
    #[serde(default, alias = "applicationDate")]
    pub applied_date: Option<String>,
    #[serde(default)]
    pub salary_min: Option<f64>,
    #[serde(default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub application_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub interview: Option<Interview>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub id: RecordId,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub salary_min: Option<f64>,
    #[serde(default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub application_url: Option<String>,
    #[serde(default)]
    pub posted_date: Option<String>,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub is_saved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJob {
    #[serde(flatten)]
    pub job: JobListing,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub saved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    pub keyword: String,
    pub location: String,
    pub category: String, // "full_time", "part_time", "contract", "temporary", or "" for all
    pub remote: bool,
    pub page: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            location: String::new(),
            category: String::new(),
            remote: false,
            page: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub jobs: Vec<JobListing>,
    #[serde(default)]
    pub total_results: u64,
}

/// What the user confirms before an application is tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingDraft {
    pub application_date: NaiveDate,
    pub notes: String,
}

impl TrackingDraft {
    pub fn today(notes: impl Into<String>) -> Self {
        Self {
            application_date: chrono::Local::now().date_naive(),
            notes: notes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub job_id: RecordId,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub application_url: Option<String>,
    pub status: ApplicationStatus,
    pub notes: String,
    pub application_date: String,
}

impl NewApplication {
    pub fn from_listing(job: &JobListing, draft: &TrackingDraft) -> Self {
        Self {
            job_id: job.id.clone(),
            title: job.title.clone(),
            company: job.company.clone(),
            location: job.location.clone(),
            description: job.description.clone(),
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            application_url: job.application_url.clone(),
            status: ApplicationStatus::Applied,
            notes: draft.notes.clone(),
            application_date: draft.application_date.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MonthlyCount {
    #[serde(default)]
    pub current: u64,
}

/// Application counts per status. The stats endpoint sends a
/// `{ "APPLIED": 3, ... }` map; chart payloads use parallel `labels`/`values`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StatusBreakdown {
    Series { labels: Vec<String>, values: Vec<u64> },
    Counts(BTreeMap<String, u64>),
}

impl Default for StatusBreakdown {
    fn default() -> Self {
        StatusBreakdown::Counts(BTreeMap::new())
    }
}

impl StatusBreakdown {
    /// `(label, count)` pairs. Known statuses come first in board order and
    /// use their display label; other keys follow as sent.
    pub fn entries(&self) -> Vec<(String, u64)> {
        match self {
            StatusBreakdown::Series { labels, values } => {
                labels.iter().cloned().zip(values.iter().copied()).collect()
            }
            StatusBreakdown::Counts(counts) => {
                let mut entries: Vec<(Option<ApplicationStatus>, &String, u64)> = counts
                    .iter()
                    .map(|(key, count)| (key.parse().ok(), key, *count))
                    .collect();
                entries.sort_by_key(|(status, _, _)| status.map_or(usize::MAX, |s| s.index()));
                entries
                    .into_iter()
                    .map(|(status, key, count)| {
                        let label = status.map_or_else(|| key.clone(), |s| s.label().to_string());
                        (label, count)
                    })
                    .collect()
            }
        }
    }
}

fn breakdown_or_empty<'de, D>(deserializer: D) -> Result<StatusBreakdown, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StatusBreakdown>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpcomingInterview {
    pub id: RecordId,
    pub company: String,
    pub position: String,
    pub date: String,
    #[serde(rename = "type", default)]
    pub interview_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Activity {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub activity_type: String, // "application", "interview", "offer", "rejection"
    pub company: String,
    pub position: String,
    pub date: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_applications: u64,
    pub active_applications: u64,
    pub response_rate: f64,
    pub saved_jobs: u64,
    pub upcoming_interviews: u64,
    pub applications_by_month: MonthlyCount,
    #[serde(deserialize_with = "breakdown_or_empty")]
    pub applications_by_status: StatusBreakdown,
    pub upcoming_interviews_list: Vec<UpcomingInterview>,
    pub recent_activities: Vec<Activity>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeAnalysis {
    pub match_percentage: f64,
    pub skill_score: f64,
    pub keyword_score: f64,
    pub format_score: f64,
    #[serde(rename = "isATSCompatible")]
    pub is_ats_compatible: bool,
    pub industry_category: String,
    pub matching_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub industry_keywords: Vec<String>,
    pub quick_wins: Vec<String>,
    pub priority_improvements: Vec<String>,
    pub suggestions: Vec<String>,
    pub format_checklist: BTreeMap<String, bool>,
    pub ats_optimization_tips: Vec<String>,
}
