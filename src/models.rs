use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// ============ Categorical Fields ============

/// Annual revenue band of a prospect, ordered from smallest to largest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RevenueRange {
    /// Below 1M.
    Under1M,
    /// 1M to 10M.
    From1MTo10M,
    /// 10M to 50M.
    From10MTo50M,
    /// 50M and above.
    Over50M,
    /// Any value outside the known bands, kept verbatim.
    Unrecognized(String),
}

impl RevenueRange {
    /// Canonical label stored in the record.
    pub fn as_str(&self) -> &str {
        match self {
            RevenueRange::Under1M => "<1M",
            RevenueRange::From1MTo10M => "1M-10M",
            RevenueRange::From10MTo50M => "10M-50M",
            RevenueRange::Over50M => "50M+",
            RevenueRange::Unrecognized(raw) => raw,
        }
    }
}

impl From<&str> for RevenueRange {
    fn from(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        match normalized.as_str() {
            "<1M" | "0-1M" | "UNDER1M" | "UNDER_1M" | "LESS_THAN_1M" => RevenueRange::Under1M,
            "1M-10M" | "1-10M" | "1M_10M" => RevenueRange::From1MTo10M,
            "10M-50M" | "10-50M" | "10M_50M" => RevenueRange::From10MTo50M,
            "50M+" | ">50M" | "50M_PLUS" | "OVER50M" | "OVER_50M" => RevenueRange::Over50M,
            _ => RevenueRange::Unrecognized(raw.trim().to_string()),
        }
    }
}

impl From<String> for RevenueRange {
    fn from(raw: String) -> Self {
        RevenueRange::from(raw.as_str())
    }
}

impl From<RevenueRange> for String {
    fn from(range: RevenueRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for RevenueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Industry classification of a prospect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndustryType {
    Restaurant,
    Hotel,
    Hospitality,
    Other,
    /// Any value outside the known classifications, kept verbatim.
    Unrecognized(String),
}

impl IndustryType {
    pub fn as_str(&self) -> &str {
        match self {
            IndustryType::Restaurant => "restaurant",
            IndustryType::Hotel => "hotel",
            IndustryType::Hospitality => "hospitality",
            IndustryType::Other => "other",
            IndustryType::Unrecognized(raw) => raw,
        }
    }

    /// Restaurant and hospitality operators are the target market.
    pub fn is_target(&self) -> bool {
        matches!(
            self,
            IndustryType::Restaurant | IndustryType::Hotel | IndustryType::Hospitality
        )
    }
}

impl From<&str> for IndustryType {
    fn from(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "restaurant" | "restaurants" => IndustryType::Restaurant,
            "hotel" | "hotels" => IndustryType::Hotel,
            "hospitality" => IndustryType::Hospitality,
            "other" => IndustryType::Other,
            _ => IndustryType::Unrecognized(raw.trim().to_string()),
        }
    }
}

impl From<String> for IndustryType {
    fn from(raw: String) -> Self {
        IndustryType::from(raw.as_str())
    }
}

impl From<IndustryType> for String {
    fn from(industry: IndustryType) -> Self {
        industry.to_string()
    }
}

impl fmt::Display for IndustryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Qualification Input ============

/// The subset of a company/lead record the ICP scorer reads.
///
/// Every field is optional; blank strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationInput {
    #[serde(default)]
    pub location_count: Option<i32>,
    #[serde(default)]
    pub employee_count: Option<i32>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub revenue_range: Option<RevenueRange>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub industry_type: Option<IndustryType>,
}

/// Deserializes an optional categorical string, mapping blank values to `None`.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()).map(T::from))
}

/// Deserializes a patch field: absent stays `None`, explicit `null` becomes `Some(None)`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Patch variant of `blank_as_none`.
fn nullable_category<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    blank_as_none(deserializer).map(Some)
}

// ============ Database Models ============

/// Which record table a request targets. Companies and leads share the
/// qualification columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordTable {
    Companies,
    Leads,
}

impl RecordTable {
    pub fn table_name(self) -> &'static str {
        match self {
            RecordTable::Companies => "companies",
            RecordTable::Leads => "leads",
        }
    }
}

/// A company or lead row as stored in the record store.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QualificationRecord {
    /// Unique identifier.
    pub id: Uuid,
    /// Display or legal name.
    pub name: String,
    /// Primary web domain, used for DNS checks.
    pub domain: Option<String>,
    /// Number of operated sites.
    pub location_count: Option<i32>,
    pub employee_count: Option<i32>,
    /// Canonical revenue band label (see `RevenueRange::as_str`).
    pub revenue_range: Option<String>,
    /// Canonical industry label (see `IndustryType::as_str`).
    pub industry_type: Option<String>,
    /// Derived: ICP score, 0-100.
    pub icp_score: i32,
    /// Derived: whether the record meets the ICP.
    pub icp_qualified: bool,
    /// Derived: reasons joined with "; ", NULL when none.
    pub qualification_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl QualificationRecord {
    /// Builds the scorer input from the stored fields.
    pub fn qualification_input(&self) -> QualificationInput {
        QualificationInput {
            location_count: self.location_count,
            employee_count: self.employee_count,
            revenue_range: self
                .revenue_range
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(RevenueRange::from),
            industry_type: self
                .industry_type
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(IndustryType::from),
        }
    }
}

/// Body of `POST /api/v1/{companies|leads}`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRecord {
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub qualification: QualificationInput,
}

/// Body of `PATCH /api/v1/{companies|leads}/:id`.
///
/// Absent fields are left untouched; explicit `null` clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub domain: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location_count: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub employee_count: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable_category")]
    pub revenue_range: Option<Option<RevenueRange>>,
    #[serde(default, deserialize_with = "nullable_category")]
    pub industry_type: Option<Option<IndustryType>>,
}

impl RecordPatch {
    /// Merges the patch into `record`. Derived fields are not touched here;
    /// callers must rescore afterwards.
    pub fn apply_to(self, record: &mut QualificationRecord) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(domain) = self.domain {
            record.domain = domain;
        }
        if let Some(count) = self.location_count {
            record.location_count = count;
        }
        if let Some(count) = self.employee_count {
            record.employee_count = count;
        }
        if let Some(range) = self.revenue_range {
            record.revenue_range = range.map(String::from);
        }
        if let Some(industry) = self.industry_type {
            record.industry_type = industry.map(String::from);
        }
    }
}

/// Query parameters of `GET /api/v1/{companies|leads}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilter {
    pub qualified: Option<bool>,
    pub min_score: Option<i32>,
    pub max_score: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============ Automation Engine Requests ============

/// Body of `POST /api/v1/email/personalize`, forwarded as-is to the
/// automation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationRequest {
    /// Contact or lead the email is addressed to.
    pub subject_id: String,
    pub template_id: String,
    /// Personalization strategy (e.g. "icebreaker", "pain-point").
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<i32>,
    /// Any extra context the workflow consumes.
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

/// Body of `POST /api/v1/email/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /api/v1/domains/check-dns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsCheckRequest {
    pub domain: String,
}

/// Body of `POST /api/v1/oauth/connect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConnectRequest {
    /// Mail provider, e.g. "google" or "microsoft".
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
