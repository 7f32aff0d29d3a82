use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::{JobListing, SalaryRaw};

pub fn parse_posted(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // The feeds usually omit the offset; treat those as UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// "Posted Today", "1 day ago", "12 days ago". `None` when the date doesn't parse.
pub fn time_ago(date_posted: &str, now: DateTime<Utc>) -> Option<String> {
    let posted = parse_posted(date_posted)?;
    let days = (now - posted).num_days();
    Some(match days {
        d if d <= 0 => "Posted Today".to_string(),
        1 => "1 day ago".to_string(),
        d => format!("{} days ago", d),
    })
}

pub fn posted_label(job: &JobListing, now: DateTime<Utc>) -> String {
    job.date_posted
        .as_deref()
        .and_then(|d| time_ago(d, now))
        .unwrap_or_else(|| "-".to_string())
}

/// "$120,000 - $150,000 / year". Missing bounds render as 0.
pub fn salary_range(salary: &SalaryRaw) -> Option<String> {
    let value = salary.value.as_ref()?;
    let min = value.min_value.or(value.value).unwrap_or(0.0);
    let max = value.max_value.or(value.value).unwrap_or(0.0);
    let mut out = format!("${} - ${}", group_thousands(min), group_thousands(max));
    if let Some(unit) = &value.unit_text {
        out.push_str(&format!(" / {}", unit.to_lowercase()));
    }
    Some(out)
}

pub fn salary_label(job: &JobListing) -> String {
    job.salary_raw
        .as_ref()
        .and_then(salary_range)
        .unwrap_or_else(|| "-".to_string())
}

fn group_thousands(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let whole = (cents / 100).unsigned_abs().to_string();
    let frac = (cents % 100).abs();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if cents < 0 {
        grouped.insert(0, '-');
    }
    if frac != 0 {
        grouped.push_str(&format!(".{:02}", frac));
    }
    grouped
}

pub fn locations(job: &JobListing) -> String {
    job.locations().join(", ")
}

pub fn work_mode(remote: Option<bool>) -> &'static str {
    if remote == Some(true) { "Remote" } else { "On-site" }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
