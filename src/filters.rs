use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::JobSource;

/// Select-box sentinel meaning "no constraint".
pub const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftValue {
    Text(String),
    Flag(bool),
}

impl DraftValue {
    pub fn is_unset(&self) -> bool {
        match self {
            DraftValue::Text(s) => s.is_empty() || s == ALL,
            DraftValue::Flag(b) => !*b,
        }
    }
}

impl From<&str> for DraftValue {
    fn from(s: &str) -> Self {
        DraftValue::Text(s.to_string())
    }
}

impl From<String> for DraftValue {
    fn from(s: String) -> Self {
        DraftValue::Text(s)
    }
}

impl From<bool> for DraftValue {
    fn from(b: bool) -> Self {
        DraftValue::Flag(b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, sent verbatim. Comma-separated lists are not split.
    Text,
    /// Select box with an `"all"` sentinel; the chosen option is sent as text.
    Choice(&'static [&'static str]),
    /// Tri-state selector: `on` sends `true`, `off` sends `false`, `"all"` is dropped.
    Toggle { on: &'static str, off: &'static str },
    /// Checkbox the API expects as the string `"true"`; unchecked is dropped.
    StringFlag,
    /// Select box with no sentinel; always sent. The first option is the default.
    Required(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(key: &'static str, kind: FieldKind) -> Self {
        Self { key, kind }
    }

    pub fn default_value(&self) -> DraftValue {
        match self.kind {
            FieldKind::Text => DraftValue::Text(String::new()),
            FieldKind::Choice(_) | FieldKind::Toggle { .. } => DraftValue::Text(ALL.to_string()),
            FieldKind::StringFlag => DraftValue::Flag(false),
            FieldKind::Required(options) => DraftValue::Text(options[0].to_string()),
        }
    }

    pub fn options(&self) -> Vec<&'static str> {
        match self.kind {
            FieldKind::Choice(options) => std::iter::once(ALL).chain(options.iter().copied()).collect(),
            FieldKind::Toggle { on, off } => vec![ALL, on, off],
            FieldKind::Required(options) => options.to_vec(),
            FieldKind::Text | FieldKind::StringFlag => Vec::new(),
        }
    }

    fn check(&self, value: &DraftValue) -> Result<(), FilterError> {
        let accepted = match (self.kind, value) {
            (FieldKind::Text, DraftValue::Text(_)) | (FieldKind::StringFlag, DraftValue::Flag(_)) => true,
            (FieldKind::Choice(options), DraftValue::Text(s)) => {
                value.is_unset() || options.contains(&s.as_str())
            }
            (FieldKind::Toggle { on, off }, DraftValue::Text(s)) => {
                value.is_unset() || s == on || s == off
            }
            (FieldKind::Required(options), DraftValue::Text(s)) => options.contains(&s.as_str()),
            _ => return Err(FilterError::TypeMismatch { key: self.key }),
        };

        if accepted {
            Ok(())
        } else {
            let DraftValue::Text(s) = value else {
                return Err(FilterError::TypeMismatch { key: self.key });
            };
            Err(FilterError::InvalidOption {
                key: self.key,
                value: s.clone(),
                allowed: self.options().join(", "),
            })
        }
    }

    fn encode(&self, value: &DraftValue) -> Option<QueryValue> {
        match (self.kind, value) {
            (FieldKind::Required(_), DraftValue::Text(s)) => Some(QueryValue::Text(s.clone())),
            _ if value.is_unset() => None,
            (FieldKind::Text | FieldKind::Choice(_), DraftValue::Text(s)) => Some(QueryValue::Text(s.clone())),
            (FieldKind::Toggle { on, off }, DraftValue::Text(s)) => {
                if s == on {
                    Some(QueryValue::Bool(true))
                } else if s == off {
                    Some(QueryValue::Bool(false))
                } else {
                    None
                }
            }
            (FieldKind::StringFlag, DraftValue::Flag(true)) => Some(QueryValue::Text("true".to_string())),
            _ => None,
        }
    }

    #[cfg(test)]
    fn decode(&self, value: &QueryValue) -> Option<DraftValue> {
        match (self.kind, value) {
            (FieldKind::Text | FieldKind::Choice(_) | FieldKind::Required(_), QueryValue::Text(s)) => {
                Some(DraftValue::Text(s.clone()))
            }
            (FieldKind::Toggle { on, off }, QueryValue::Bool(b)) => {
                Some(DraftValue::Text(if *b { on } else { off }.to_string()))
            }
            (FieldKind::StringFlag, QueryValue::Text(s)) => Some(DraftValue::Flag(s == "true")),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter '{key}' for {feed} jobs")]
    UnknownField { feed: &'static str, key: String },
    #[error("filter '{key}' has the wrong value type")]
    TypeMismatch { key: &'static str },
    #[error("invalid value '{value}' for filter '{key}' (expected one of: {allowed})")]
    InvalidOption {
        key: &'static str,
        value: String,
        allowed: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftFilters {
    source: JobSource,
    values: BTreeMap<&'static str, DraftValue>,
}

impl DraftFilters {
    pub fn new(source: JobSource) -> Self {
        let values = source
            .fields()
            .iter()
            .map(|spec| (spec.key, spec.default_value()))
            .collect();
        Self { source, values }
    }

    /// Rebuild the draft that would normalize to `query`. Keys the schema
    /// doesn't know about are ignored.
    #[cfg(test)]
    pub fn from_query(source: JobSource, query: &NormalizedQuery) -> Self {
        let mut draft = Self::new(source);
        for spec in source.fields() {
            if let Some(value) = query.get(spec.key).and_then(|v| spec.decode(v)) {
                draft.values.insert(spec.key, value);
            }
        }
        draft
    }

    pub fn source(&self) -> JobSource {
        self.source
    }

    pub fn set(&mut self, key: &str, value: impl Into<DraftValue>) -> Result<(), FilterError> {
        let spec = self.source.field(key).ok_or_else(|| FilterError::UnknownField {
            feed: self.source.display_name(),
            key: key.to_string(),
        })?;
        let value = value.into();
        spec.check(&value)?;
        self.values.insert(spec.key, value);
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.source);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldSpec, &DraftValue)> + '_ {
        self.source
            .fields()
            .iter()
            .filter_map(|spec| self.values.get(spec.key).map(|v| (spec, v)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Text(String),
    Bool(bool),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Text(s) => f.write_str(s),
            QueryValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedQuery(BTreeMap<String, QueryValue>);

impl NormalizedQuery {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        self.0.iter().map(|(k, v)| (k.clone(), v.to_string())).collect()
    }

    pub fn summary(&self) -> String {
        if self.0.is_empty() {
            return "no filters".to_string();
        }
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<(String, QueryValue)> for NormalizedQuery {
    fn from_iter<I: IntoIterator<Item = (String, QueryValue)>>(iter: I) -> Self {
        NormalizedQuery(iter.into_iter().collect())
    }
}

pub fn normalize(draft: &DraftFilters) -> NormalizedQuery {
    draft
        .fields()
        .filter_map(|(spec, value)| spec.encode(value).map(|v| (spec.key.to_string(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ats() -> DraftFilters {
        DraftFilters::new(JobSource::Ats)
    }

    #[test]
    fn test_default_ats_draft_normalizes_to_empty() {
        assert!(normalize(&ats()).is_empty());
    }

    #[test]
    fn test_default_linkedin_draft_only_sends_order() {
        let query = normalize(&DraftFilters::new(JobSource::Linkedin));
        assert_eq!(query.len(), 1);
        assert_eq!(query.get("order"), Some(&QueryValue::Text("desc".to_string())));
    }

    #[test]
    fn test_ats_remote_tri_state() {
        let mut draft = ats();
        draft.set("remote", "remote").unwrap();
        assert_eq!(normalize(&draft).get("remote"), Some(&QueryValue::Bool(true)));

        draft.set("remote", "onsite").unwrap();
        assert_eq!(normalize(&draft).get("remote"), Some(&QueryValue::Bool(false)));

        draft.set("remote", "all").unwrap();
        assert_eq!(normalize(&draft).get("remote"), None);
    }

    #[test]
    fn test_linkedin_toggles_map_string_booleans() {
        let mut draft = DraftFilters::new(JobSource::Linkedin);
        draft.set("remote", "false").unwrap();
        draft.set("directapply", "true").unwrap();
        let query = normalize(&draft);
        assert_eq!(query.get("remote"), Some(&QueryValue::Bool(false)));
        assert_eq!(query.get("directapply"), Some(&QueryValue::Bool(true)));
    }

    #[test]
    fn test_string_flags_serialize_as_text() {
        let mut draft = ats();
        draft.set("include_ai", true).unwrap();
        draft.set("ai_visa_sponsorship_filter", false).unwrap();
        let query = normalize(&draft);
        assert_eq!(query.get("include_ai"), Some(&QueryValue::Text("true".to_string())));
        assert_eq!(query.get("ai_visa_sponsorship_filter"), None);
    }

    #[test]
    fn test_text_passes_through_verbatim() {
        let mut draft = ats();
        draft.set("organization_filter", "Stripe,Shopify, Datadog").unwrap();
        draft.set("min_salary", "lots").unwrap();
        draft.set("title_filter", "").unwrap();
        let query = normalize(&draft);
        assert_eq!(
            query.get("organization_filter"),
            Some(&QueryValue::Text("Stripe,Shopify, Datadog".to_string()))
        );
        assert_eq!(query.get("min_salary"), Some(&QueryValue::Text("lots".to_string())));
        assert_eq!(query.get("title_filter"), None);
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut draft = ats();
        assert!(matches!(
            draft.set("organization_slug_filter", "x"),
            Err(FilterError::UnknownField { .. })
        ));
        assert_eq!(
            draft.set("include_ai", "yes"),
            Err(FilterError::TypeMismatch { key: "include_ai" })
        );
        assert!(matches!(
            draft.set("remote", "hybrid"),
            Err(FilterError::InvalidOption { key: "remote", .. })
        ));
        assert!(matches!(
            draft.set("source", "monster"),
            Err(FilterError::InvalidOption { key: "source", .. })
        ));
        assert!(draft.set("source", "greenhouse").is_ok());
    }

    #[test]
    fn test_renormalizing_is_a_no_op() {
        let mut draft = ats();
        draft.set("title_filter", "Data Engineer").unwrap();
        draft.set("remote", "onsite").unwrap();
        draft.set("salary_unit", "YEAR").unwrap();
        draft.set("include_ai", true).unwrap();
        draft.set("description_type", "text").unwrap();

        let once = normalize(&draft);
        let twice = normalize(&DraftFilters::from_query(JobSource::Ats, &once));
        assert_eq!(once, twice);

        let mut linkedin = DraftFilters::new(JobSource::Linkedin);
        linkedin.set("order", "asc").unwrap();
        linkedin.set("remote", "true").unwrap();
        linkedin.set("ai_visa_sponsorship_filter", true).unwrap();
        let once = normalize(&linkedin);
        let twice = normalize(&DraftFilters::from_query(JobSource::Linkedin, &once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut draft = ats();
        draft.set("title_filter", "Rust").unwrap();
        draft.reset();
        assert_eq!(draft, ats());
    }

    #[test]
    fn test_params_and_summary() {
        let mut draft = ats();
        draft.set("remote", "remote").unwrap();
        draft.set("title_filter", "SRE").unwrap();
        let query = normalize(&draft);
        assert_eq!(
            query.to_params(),
            vec![
                ("remote".to_string(), "true".to_string()),
                ("title_filter".to_string(), "SRE".to_string()),
            ]
        );
        assert_eq!(query.summary(), "remote=true title_filter=SRE");
        assert_eq!(NormalizedQuery::default().summary(), "no filters");
    }
}
