use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::grades::Grade;

/// Parses a credit value as typed by a user.
///
/// Empty, non-numeric and non-finite input yields `None`; such rows are left
/// out of every sum rather than counted as zero credits.
pub fn parse_credits(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    text.parse::<f64>().ok().filter(|credits| credits.is_finite())
}

fn counts(grade: Grade, credits: f64) -> bool {
    grade.is_credit_bearing() && credits.is_finite() && credits > 0.0
}

/// Credit-weighted grade point average. Returns `0.0` when no credits count.
pub fn aggregate<I>(rows: I) -> f64
where
    I: IntoIterator<Item = (Grade, f64)>,
{
    let (points, credits) = rows
        .into_iter()
        .filter(|(grade, credits)| counts(*grade, *credits))
        .fold((0.0, 0.0), |(points, total), (grade, credits)| {
            (points + grade.points() * credits, total + credits)
        });

    if credits > 0.0 { points / credits } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpaSummary {
    pub gpa: f64,
    pub total_credits: f64,
    pub course_count: usize,
    pub grade_distribution: BTreeMap<String, usize>,
}

impl GpaSummary {
    pub fn standing(&self) -> Standing {
        Standing::from_gpa(self.gpa)
    }
}

pub fn summarize<I>(rows: I) -> GpaSummary
where
    I: IntoIterator<Item = (Grade, f64)>,
{
    let counted: Vec<(Grade, f64)> = rows
        .into_iter()
        .filter(|(grade, credits)| counts(*grade, *credits))
        .collect();

    let mut grade_distribution = BTreeMap::new();
    for (grade, _) in &counted {
        *grade_distribution.entry(grade.to_string()).or_insert(0) += 1;
    }

    GpaSummary {
        gpa: aggregate(counted.iter().copied()),
        total_credits: counted.iter().map(|(_, credits)| credits).sum(),
        course_count: counted.len(),
        grade_distribution,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Standing {
    Excellent,
    Good,
    Satisfactory,
    NeedsImprovement,
    Critical,
}

impl Standing {
    pub fn from_gpa(gpa: f64) -> Self {
        if gpa >= 3.7 {
            Standing::Excellent
        } else if gpa >= 3.3 {
            Standing::Good
        } else if gpa >= 3.0 {
            Standing::Satisfactory
        } else if gpa >= 2.0 {
            Standing::NeedsImprovement
        } else {
            Standing::Critical
        }
    }
}

impl fmt::Display for Standing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Standing::Excellent => "Excellent",
            Standing::Good => "Good",
            Standing::Satisfactory => "Satisfactory",
            Standing::NeedsImprovement => "Needs Improvement",
            Standing::Critical => "Critical",
        };
        write!(f, "{}", label)
    }
}
