use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// Fields we don't read land in `extra` so `--json` output stays lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub organization_logo: Option<String>,
    #[serde(default)]
    pub locations_derived: Option<Vec<String>>,
    #[serde(default)]
    pub remote_derived: Option<bool>,
    #[serde(default)]
    pub salary_raw: Option<SalaryRaw>,
    #[serde(default)]
    pub date_posted: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobListing {
    pub fn locations(&self) -> &[String] {
        self.locations_derived.as_deref().unwrap_or_default()
    }

    pub fn description_text(&self) -> Option<&str> {
        self.extra.get("description_text").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRaw {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub value: Option<SalaryValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryValue {
    #[serde(rename = "minValue", default)]
    pub min_value: Option<f64>,
    #[serde(rename = "maxValue", default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(rename = "unitText", default)]
    pub unit_text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("unexpected id value: {}", other))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
