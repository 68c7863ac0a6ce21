use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::api::JobTrackerApi;
use crate::models::{Activity, DashboardStats};
use crate::notice::Notices;

pub fn load(api: &dyn JobTrackerApi, notices: &mut Notices) -> Option<DashboardStats> {
    match api.dashboard_stats() {
        Ok(stats) => Some(stats),
        Err(e) => {
            notices.error(format!("Failed to fetch dashboard data: {}", e));
            None
        }
    }
}

/// Best-effort parse of the server's timestamps into local time.
fn parse_when(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

/// "in 3 days", "2 hours ago", ...
pub fn relative(when: DateTime<Local>, now: DateTime<Local>) -> String {
    let delta = when.signed_duration_since(now);
    let secs = delta.num_seconds().abs();
    let (amount, unit) = if secs < 60 {
        return "just now".to_string();
    } else if secs < 3600 {
        (secs / 60, "minute")
    } else if secs < 86_400 {
        (secs / 3600, "hour")
    } else if secs < 86_400 * 30 {
        (secs / 86_400, "day")
    } else if secs < 86_400 * 365 {
        (secs / (86_400 * 30), "month")
    } else {
        (secs / (86_400 * 365), "year")
    };
    let plural = if amount == 1 { "" } else { "s" };
    if delta.num_seconds() > 0 {
        format!("in {} {}{}", amount, unit, plural)
    } else {
        format!("{} {}{} ago", amount, unit, plural)
    }
}

fn next_interview_hint(stats: &DashboardStats, now: DateTime<Local>) -> String {
    match stats
        .upcoming_interviews_list
        .first()
        .and_then(|i| parse_when(&i.date))
    {
        Some(when) => format!("Next: {}", relative(when, now)),
        None => "No upcoming interviews".to_string(),
    }
}

fn activity_line(activity: &Activity) -> String {
    let verb = match activity.activity_type.as_str() {
        "application" => "Applied to",
        "interview" => "Interview scheduled for",
        "offer" => "Offer for",
        "rejection" => "Rejected for",
        _ => "Update on",
    };
    let when = parse_when(&activity.date)
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| activity.date.clone());
    format!("{} {} at {} ({})", verb, activity.position, activity.company, when)
}

pub fn render(stats: &DashboardStats, now: DateTime<Local>) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{:<22} {:>6}   {} this month",
            "Total Applications", stats.total_applications, stats.applications_by_month.current
        ),
        format!(
            "{:<22} {:>6}   {:.1}% response rate",
            "Active Applications", stats.active_applications, stats.response_rate
        ),
        format!("{:<22} {:>6}   Potential opportunities", "Saved Jobs", stats.saved_jobs),
        format!(
            "{:<22} {:>6}   {}",
            "Upcoming Interviews",
            stats.upcoming_interviews,
            next_interview_hint(stats, now)
        ),
        String::new(),
    ];

    let breakdown = stats.applications_by_status.entries();
    if !breakdown.is_empty() {
        lines.push("Applications by status".to_string());
        let total: u64 = breakdown.iter().map(|(_, value)| value).sum();
        for (label, value) in &breakdown {
            let width = if total == 0 { 0 } else { (*value * 20 / total) as usize };
            lines.push(format!("  {:<12} {:>4} {}", label, value, "#".repeat(width)));
        }
        lines.push(String::new());
    }

    lines.push("Upcoming interviews".to_string());
    if stats.upcoming_interviews_list.is_empty() {
        lines.push("  No upcoming interviews".to_string());
    }
    for interview in &stats.upcoming_interviews_list {
        let when = parse_when(&interview.date)
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| interview.date.clone());
        lines.push(format!(
            "  {}  {} - {} [{}]",
            when, interview.position, interview.company, interview.interview_type
        ));
    }
    lines.push(String::new());

    lines.push("Recent activity".to_string());
    if stats.recent_activities.is_empty() {
        lines.push("  No recent activities".to_string());
    }
    for activity in &stats.recent_activities {
        lines.push(format!("  {}", activity_line(activity)));
    }
    lines
}
