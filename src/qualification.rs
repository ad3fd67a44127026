//! ICP (Ideal Customer Profile) qualification scoring.
//!
//! Scoring is a banded point accumulation over four independent dimensions,
//! evaluated in a fixed order (locations, employees, revenue, industry):
//!
//! | Dimension | Bands (points) |
//! |-----------|----------------|
//! | Locations | unknown 0, single 0 (disqualifies), 2-4 10, 5-19 25, 20+ 40 |
//! | Employees | unknown 0, <10 0, 10-49 5, 50-199 10, 200-499 15, 500+ 20 |
//! | Revenue   | unknown 0, <1M 0, 1M-10M 8, 10M-50M 15, 50M+ 20 |
//! | Industry  | restaurant/hotel/hospitality 20, anything else 0 |
//!
//! A record qualifies when its clamped total reaches
//! [`QUALIFICATION_THRESHOLD`] and it is not a single-location operator.
//! The scorer never persists; callers write the result back with
//! [`apply_to`].

use crate::models::{IndustryType, QualificationInput, QualificationRecord, RevenueRange};
use serde::{Deserialize, Serialize};

/// Upper bound of the clamped total.
pub const MAX_SCORE: i32 = 100;

/// Minimum total for a record to count as qualified.
pub const QUALIFICATION_THRESHOLD: i32 = 65;

/// Headcount below which a reason is recorded. Point-reducing only.
pub const MIN_EMPLOYEES: i32 = 10;

/// Separator used when flattening reasons into `qualification_reason`.
pub const REASON_SEPARATOR: &str = "; ";

/// Output of [`score`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationResult {
    pub total_score: i32,
    pub is_qualified: bool,
    /// One message per dimension that deviates from the ideal profile.
    pub reasons: Vec<String>,
}

impl QualificationResult {
    /// Reasons joined for storage, `None` when the record is ideal.
    pub fn reason_text(&self) -> Option<String> {
        if self.reasons.is_empty() {
            None
        } else {
            Some(self.reasons.join(REASON_SEPARATOR))
        }
    }
}

/// Points and explanation contributed by a single dimension.
struct DimensionScore {
    points: i32,
    reason: Option<String>,
    disqualifies: bool,
}

impl DimensionScore {
    fn ideal(points: i32) -> Self {
        Self {
            points,
            reason: None,
            disqualifies: false,
        }
    }

    fn partial(points: i32, reason: impl Into<String>) -> Self {
        Self {
            points,
            reason: Some(reason.into()),
            disqualifies: false,
        }
    }

    fn disqualifying(reason: impl Into<String>) -> Self {
        Self {
            points: 0,
            reason: Some(reason.into()),
            disqualifies: true,
        }
    }
}

/// Scores a record against the ICP. Pure and total.
pub fn score(input: &QualificationInput) -> QualificationResult {
    let dimensions = [
        score_locations(input.location_count),
        score_employees(input.employee_count),
        score_revenue(input.revenue_range.as_ref()),
        score_industry(input.industry_type.as_ref()),
    ];

    let total_score = dimensions
        .iter()
        .map(|d| d.points)
        .sum::<i32>()
        .clamp(0, MAX_SCORE);
    let disqualified = dimensions.iter().any(|d| d.disqualifies);
    let reasons = dimensions.into_iter().filter_map(|d| d.reason).collect();

    QualificationResult {
        total_score,
        is_qualified: total_score >= QUALIFICATION_THRESHOLD && !disqualified,
        reasons,
    }
}

/// Rescores `record` from its current inputs and overwrites the derived fields.
pub fn apply_to(record: &mut QualificationRecord) -> QualificationResult {
    let result = score(&record.qualification_input());
    record.icp_score = result.total_score;
    record.icp_qualified = result.is_qualified;
    record.qualification_reason = result.reason_text();

    tracing::debug!(
        "Scored record {}: {} (qualified: {})",
        record.id,
        result.total_score,
        result.is_qualified
    );

    result
}

fn score_locations(count: Option<i32>) -> DimensionScore {
    // Zero or negative counts carry no information.
    match count.filter(|n| *n > 0) {
        None => DimensionScore::partial(0, "Location count unknown"),
        Some(1) => DimensionScore::disqualifying("Single-location operator; portfolio deals only"),
        Some(2..=4) => DimensionScore::partial(10, "Small portfolio (2-4 locations)"),
        Some(5..=19) => DimensionScore::partial(25, "Mid-size portfolio (5-19 locations)"),
        Some(_) => DimensionScore::ideal(40),
    }
}

fn score_employees(count: Option<i32>) -> DimensionScore {
    match count.filter(|n| *n >= 0) {
        None => DimensionScore::partial(0, "Employee count unknown"),
        Some(n) if n < MIN_EMPLOYEES => DimensionScore::partial(
            0,
            format!("Below minimum headcount of {} employees", MIN_EMPLOYEES),
        ),
        Some(10..=49) => DimensionScore::partial(5, "Small team (10-49 employees)"),
        Some(50..=199) => DimensionScore::partial(10, "Mid-size team (50-199 employees)"),
        Some(200..=499) => DimensionScore::partial(15, "Large team (200-499 employees)"),
        Some(_) => DimensionScore::ideal(20),
    }
}

fn score_revenue(range: Option<&RevenueRange>) -> DimensionScore {
    match range {
        None => DimensionScore::partial(0, "Revenue range unknown"),
        Some(RevenueRange::Unrecognized(raw)) => {
            DimensionScore::partial(0, format!("Unrecognized revenue range '{}'", raw))
        }
        Some(RevenueRange::Under1M) => DimensionScore::partial(0, "Revenue below 1M"),
        Some(RevenueRange::From1MTo10M) => DimensionScore::partial(8, "Revenue 1M-10M"),
        Some(RevenueRange::From10MTo50M) => DimensionScore::partial(15, "Revenue 10M-50M"),
        Some(RevenueRange::Over50M) => DimensionScore::ideal(20),
    }
}

fn score_industry(industry: Option<&IndustryType>) -> DimensionScore {
    match industry {
        None => DimensionScore::partial(0, "Industry unknown"),
        Some(IndustryType::Unrecognized(raw)) => DimensionScore::partial(
            0,
            format!("Unrecognized industry classification '{}'", raw),
        ),
        Some(industry) if industry.is_target() => DimensionScore::ideal(20),
        Some(industry) => {
            DimensionScore::partial(0, format!("Industry outside target ({})", industry))
        }
    }
}
