use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Letter grades understood by the tracker.
///
/// The point values follow the extended 4.0 scale (D = 1.0, D- = 0.7).
/// `W` (withdrawn) and `I` (incomplete) carry no points and no credit weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Grade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    DMinus,
    F,
    Withdrawn,
    Incomplete,
}

const ALL_GRADES: [Grade; 15] = [
    Grade::APlus,
    Grade::A,
    Grade::AMinus,
    Grade::BPlus,
    Grade::B,
    Grade::BMinus,
    Grade::CPlus,
    Grade::C,
    Grade::CMinus,
    Grade::DPlus,
    Grade::D,
    Grade::DMinus,
    Grade::F,
    Grade::Withdrawn,
    Grade::Incomplete,
];

static GRADES_BY_SYMBOL: Lazy<HashMap<&'static str, Grade>> = Lazy::new(|| {
    let mut grades = HashMap::new();

    for grade in ALL_GRADES {
        grades.insert(grade.as_str(), grade);
    }

    grades
});

impl Grade {
    pub fn all() -> &'static [Grade] {
        &ALL_GRADES
    }

    pub fn points(&self) -> f64 {
        match self {
            Grade::APlus | Grade::A => 4.0,
            Grade::AMinus => 3.7,
            Grade::BPlus => 3.3,
            Grade::B => 3.0,
            Grade::BMinus => 2.7,
            Grade::CPlus => 2.3,
            Grade::C => 2.0,
            Grade::CMinus => 1.7,
            Grade::DPlus => 1.3,
            Grade::D => 1.0,
            Grade::DMinus => 0.7,
            Grade::F | Grade::Withdrawn | Grade::Incomplete => 0.0,
        }
    }

    pub fn is_credit_bearing(&self) -> bool {
        !matches!(self, Grade::Withdrawn | Grade::Incomplete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::DMinus => "D-",
            Grade::F => "F",
            Grade::Withdrawn => "W",
            Grade::Incomplete => "I",
        }
    }
}

impl FromStr for Grade {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbol = s.trim().to_ascii_uppercase();
        GRADES_BY_SYMBOL
            .get(symbol.as_str())
            .copied()
            .ok_or_else(|| AppError::UnknownGrade(s.trim().to_string()))
    }
}

impl TryFrom<String> for Grade {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Grade> for String {
    fn from(grade: Grade) -> Self {
        grade.as_str().to_string()
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
