use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::filters::{FieldKind, FieldSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    /// Active Jobs DB (aggregated ATS postings)
    Ats,
    /// LinkedIn job feed
    Linkedin,
}

impl JobSource {
    pub fn endpoint(self) -> &'static str {
        match self {
            JobSource::Ats => "https://active-jobs-db.p.rapidapi.com/active-ats-7d",
            JobSource::Linkedin => "https://linkedin-jobs-api2.p.rapidapi.com/active-jb-7d",
        }
    }

    pub fn host(self) -> &'static str {
        match self {
            JobSource::Ats => "active-jobs-db.p.rapidapi.com",
            JobSource::Linkedin => "linkedin-jobs-api2.p.rapidapi.com",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            JobSource::Ats => "ATS",
            JobSource::Linkedin => "LinkedIn",
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            JobSource::Ats => ATS_FIELDS,
            JobSource::Linkedin => LINKEDIN_FIELDS,
        }
    }

    pub fn field(self, key: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.key == key)
    }
}

pub const ATS_PLATFORMS: &[&str] = &[
    "ashby", "bamboohr", "breezy", "careerplug", "dayforce", "eightfold",
    "greenhouse", "hiringthing", "icims", "jobvite", "join.com", "lever.co",
    "oraclecloud", "paycom", "paylocity", "personio", "phenompeople", "pinpoint",
    "recruitee", "smartrecruiters", "successfactors", "teamtailor", "workable",
    "workday", "zoho",
];

pub const SALARY_UNITS: &[&str] = &["HOUR", "YEAR", "MONTH"];

pub const DESCRIPTION_TYPES: &[&str] = &["text", "html"];

pub const LINKEDIN_JOB_TYPES: &[&str] = &[
    "CONTRACTOR", "FULL_TIME", "INTERN", "OTHER", "PART_TIME", "TEMPORARY", "VOLUNTEER",
];

pub const SORT_ORDERS: &[&str] = &["desc", "asc"];

const ATS_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("title_filter", FieldKind::Text),
    FieldSpec::new("location_filter", FieldKind::Text),
    FieldSpec::new("organization_filter", FieldKind::Text),
    FieldSpec::new("source", FieldKind::Choice(ATS_PLATFORMS)),
    FieldSpec::new("remote", FieldKind::Toggle { on: "remote", off: "onsite" }),
    FieldSpec::new("date_filter", FieldKind::Text),
    FieldSpec::new("salary_unit", FieldKind::Choice(SALARY_UNITS)),
    FieldSpec::new("min_salary", FieldKind::Text),
    FieldSpec::new("max_salary", FieldKind::Text),
    FieldSpec::new("include_ai", FieldKind::StringFlag),
    FieldSpec::new("ai_employment_type_filter", FieldKind::Text),
    FieldSpec::new("ai_work_arrangement_filter", FieldKind::Text),
    FieldSpec::new("ai_experience_level_filter", FieldKind::Text),
    FieldSpec::new("ai_visa_sponsorship_filter", FieldKind::StringFlag),
    FieldSpec::new("description_type", FieldKind::Choice(DESCRIPTION_TYPES)),
];

const LINKEDIN_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("title_filter", FieldKind::Text),
    FieldSpec::new("location_filter", FieldKind::Text),
    FieldSpec::new("organization_slug_filter", FieldKind::Text),
    FieldSpec::new("type_filter", FieldKind::Choice(LINKEDIN_JOB_TYPES)),
    FieldSpec::new("seniority_filter", FieldKind::Text),
    FieldSpec::new("remote", FieldKind::Toggle { on: "true", off: "false" }),
    FieldSpec::new("date_filter", FieldKind::Text),
    FieldSpec::new("directapply", FieldKind::Toggle { on: "true", off: "false" }),
    FieldSpec::new("employees_lte", FieldKind::Text),
    FieldSpec::new("employees_gte", FieldKind::Text),
    FieldSpec::new("order", FieldKind::Required(SORT_ORDERS)),
    FieldSpec::new("include_ai", FieldKind::StringFlag),
    FieldSpec::new("ai_work_arrangement_filter", FieldKind::Text),
    FieldSpec::new("ai_experience_level_filter", FieldKind::Text),
    FieldSpec::new("ai_visa_sponsorship_filter", FieldKind::StringFlag),
];
