//! Core data models used throughout grant-match.
//!
//! These types represent the company profiles, grants, verdicts, and match
//! records that flow through the ingestion and matching pipeline. Payloads
//! coming from callers or from the completion model are parsed leniently:
//! missing fields take their defaults rather than failing the request.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// An SME's self-described profile, supplied per request.
///
/// Only `name` and `sector` are read by the pipeline; any other attributes
/// (size, age, headcount, ...) are carried in `extra` and forwarded verbatim
/// to the eligibility judge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompanyProfile {
    /// Key under which match records are stored: the lowercased name with
    /// spaces replaced by underscores, or `"demo"` for anonymous profiles.
    pub fn company_id(&self) -> String {
        self.name
            .as_deref()
            .unwrap_or("demo")
            .to_lowercase()
            .replace(' ', "_")
    }

    /// The declared sector, or `""` when absent.
    pub fn sector(&self) -> &str {
        self.sector.as_deref().unwrap_or("")
    }
}

/// One `{key, value}` eligibility rule of a grant.
///
/// Summarizer output is inconsistent: rules arrive either as objects or as
/// `"key:value"` strings (e.g. `"headcount_max:200"`). Both forms parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RuleRepr")]
pub struct EligibilityRule {
    pub key: String,
    pub value: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleRepr {
    Pair {
        #[serde(default)]
        key: Value,
        #[serde(default)]
        value: Value,
    },
    Text(String),
}

fn value_to_string(v: Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl From<RuleRepr> for EligibilityRule {
    fn from(repr: RuleRepr) -> Self {
        match repr {
            RuleRepr::Pair { key, value } => Self {
                key: value_to_string(key),
                value: value_to_string(value),
            },
            RuleRepr::Text(text) => match text.split_once(':') {
                Some((k, v)) => Self {
                    key: k.trim().to_string(),
                    value: v.trim().to_string(),
                },
                None => Self {
                    key: text.trim().to_string(),
                    value: String::new(),
                },
            },
        }
    }
}

/// A stored grant record, owned by the ingestion subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub grant_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub sector_tags: Vec<String>,
    #[serde(default)]
    pub eligibility_rules: Vec<EligibilityRule>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub deadlines: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

/// A grant as seen by the matching pipeline, reduced from a search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantCandidate {
    pub grant_id: String,
    pub title: Option<String>,
    pub sector_tags: Vec<String>,
    pub body: String,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub eligibility_rules: Vec<EligibilityRule>,
}

/// Structured hints extracted from an SME's free-text goals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub purposes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub implied_sector: Option<String>,
}

/// Verdict for a single eligibility rule.
///
/// Parsing is case-insensitive; anything unrecognised becomes `Unknown`,
/// which scores like a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    Uncertain,
    #[default]
    Unknown,
}

impl Verdict {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Verdict::Pass,
            "FAIL" => Verdict::Fail,
            "UNCERTAIN" => Verdict::Uncertain,
            _ => Verdict::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Uncertain => "UNCERTAIN",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

/// Overall eligibility verdict for a grant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Overall {
    Pass,
    Fail,
    #[default]
    Possible,
}

impl Overall {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Overall::Pass,
            "FAIL" => Overall::Fail,
            _ => Overall::Possible,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Overall::Pass => "PASS",
            Overall::Fail => "FAIL",
            Overall::Possible => "POSSIBLE",
        }
    }
}

macro_rules! string_enum_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw: Option<String> = Option::deserialize(deserializer)?;
                Ok(raw.map(|s| <$ty>::parse(&s)).unwrap_or_default())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum_serde!(Verdict);
string_enum_serde!(Overall);

/// Judge output for one rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleVerdict {
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub result: Verdict,
    #[serde(default)]
    pub quote: Option<String>,
}

/// Judge output for one grant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictSet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub rule_results: Vec<RuleVerdict>,
    #[serde(default)]
    pub overall: Overall,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_docs: Vec<String>,
}

impl VerdictSet {
    /// The verdict substituted when judgment fails: no rule results,
    /// `POSSIBLE` overall, nothing missing.
    pub fn fallback() -> Self {
        Self::default()
    }
}

/// Persisted outcome of one match. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub company_id: String,
    pub grant_id: String,
    pub score: u8,
    #[serde(default)]
    pub missing_docs: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    pub created_at: String,
}

/// One row of a match response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub grant_id: String,
    pub title: Option<String>,
    pub score: u8,
    pub why: String,
    pub missing_docs: Vec<String>,
    pub citations: Vec<String>,
    /// Set when the eligibility verdicts for this grant were defaulted
    /// because the judge call failed.
    #[serde(default)]
    pub judgment_failed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub company: CompanyProfile,
    #[serde(default)]
    pub goal_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub results: Vec<MatchResult>,
}

/// Treat an explicit JSON `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Current UTC time as an ISO-8601 string with a `Z` suffix.
pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
