use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Rounds to 2 decimal places, half away from zero.
pub fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be between 0 and 100, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("weight {field} must be between 0 and 1, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("weights must sum to 1, got {sum}")]
    BadSum { sum: f64 },
}

/// Component scores for one grade edit. Absent components count as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInput {
    pub midterm: Option<f64>,
    pub coursework: Option<f64>,
    #[serde(rename = "final")]
    pub final_exam: Option<f64>,
}

impl ScoreInput {
    #[cfg(test)]
    pub fn new(midterm: f64, coursework: f64, final_exam: f64) -> Self {
        Self {
            midterm: Some(midterm),
            coursework: Some(coursework),
            final_exam: Some(final_exam),
        }
    }

    /// Rejects non-finite components and anything outside [0, 100].
    pub fn validate(&self) -> Result<(), ScoreError> {
        for (field, value) in [
            ("midterm", self.midterm),
            ("coursework", self.coursework),
            ("final", self.final_exam),
        ] {
            let Some(v) = value else {
                continue;
            };
            if !v.is_finite() {
                return Err(ScoreError::NotFinite { field });
            }
            if !(MIN_SCORE..=MAX_SCORE).contains(&v) {
                return Err(ScoreError::OutOfRange { field, value: v });
            }
        }
        Ok(())
    }

    /// Overlays the components present in `patch` on top of `self`.
    pub fn merged_with(&self, patch: &ScoreInput) -> ScoreInput {
        ScoreInput {
            midterm: patch.midterm.or(self.midterm),
            coursework: patch.coursework.or(self.coursework),
            final_exam: patch.final_exam.or(self.final_exam),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentWeights {
    pub midterm: f64,
    pub coursework: f64,
    #[serde(rename = "final")]
    pub final_exam: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            midterm: 0.30,
            coursework: 0.20,
            final_exam: 0.50,
        }
    }
}

impl ComponentWeights {
    pub fn validate(&self) -> Result<(), WeightsError> {
        for (field, value) in [
            ("midterm", self.midterm),
            ("coursework", self.coursework),
            ("final", self.final_exam),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(WeightsError::OutOfRange { field, value });
            }
        }
        let sum = self.midterm + self.coursework + self.final_exam;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(WeightsError::BadSum { sum });
        }
        Ok(())
    }
}

/// Weighted total of the three components, rounded to 2 decimals.
pub fn aggregate_scores(input: &ScoreInput, weights: &ComponentWeights) -> f64 {
    let m = input.midterm.unwrap_or(0.0);
    let c = input.coursework.unwrap_or(0.0);
    let f = input.final_exam.unwrap_or(0.0);
    round_2(m * weights.midterm + c * weights.coursework + f * weights.final_exam)
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown program type: {0}")]
pub struct ProgramTypeError(pub String);

/// Which scale a grade is mapped against. Graduate programs pass at C.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramType {
    #[default]
    Bachelor,
    Graduate,
}

impl ProgramType {
    pub const ALL: [ProgramType; 2] = [ProgramType::Bachelor, ProgramType::Graduate];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bachelor => "bachelor",
            Self::Graduate => "graduate",
        }
    }

    /// Lowest total that still passes on the built-in table.
    pub fn pass_mark(self) -> f64 {
        match self {
            Self::Bachelor => 45.0,
            Self::Graduate => 60.0,
        }
    }

    /// Master and doctorate programs grade on the graduate scale; every
    /// other degree level, and students without a program, on bachelor.
    pub fn for_degree_level(level: Option<&str>) -> Self {
        match level.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("master") | Some("doctorate") => Self::Graduate,
            _ => Self::Bachelor,
        }
    }
}

impl FromStr for ProgramType {
    type Err = ProgramTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BACHELOR" | "UNDERGRADUATE" | "DIPLOMA" => Ok(Self::Bachelor),
            "GRADUATE" | "MASTER" | "DOCTORATE" | "PHD" => Ok(Self::Graduate),
            _ => Err(ProgramTypeError(s.to_string())),
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingScaleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub program_type: ProgramType,
    pub letter_grade: String,
    pub min_score: f64,
    pub max_score: f64,
    pub grade_points: f64,
    pub is_passing: bool,
    pub is_active: bool,
    #[serde(default)]
    pub description_en: Option<String>,
    #[serde(default)]
    pub description_ar: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

const FAIL_LETTER: &str = "F";

const FALLBACK_BANDS: [(&str, f64, f64, f64, &str); 12] = [
    ("A+", 95.0, 100.0, 4.0, "Exceptional"),
    ("A", 90.0, 94.99, 4.0, "Excellent"),
    ("A-", 85.0, 89.99, 3.7, "Very Good+"),
    ("B+", 80.0, 84.99, 3.3, "Very Good"),
    ("B", 75.0, 79.99, 3.0, "Good+"),
    ("B-", 70.0, 74.99, 2.7, "Good"),
    ("C+", 65.0, 69.99, 2.3, "Satisfactory+"),
    ("C", 60.0, 64.99, 2.0, "Satisfactory"),
    ("C-", 55.0, 59.99, 1.7, "Pass+"),
    ("D+", 50.0, 54.99, 1.3, "Pass"),
    ("D", 45.0, 49.99, 1.0, "Minimum Pass"),
    (FAIL_LETTER, 0.0, 44.99, 0.0, "Fail"),
];

/// The built-in scale for `program_type`, used when no active stored bands
/// exist and as the seed for new workspaces. Both tables share letters and
/// points; they differ only in which bands pass.
pub fn fallback_scale(program_type: ProgramType) -> Vec<GradingScaleEntry> {
    FALLBACK_BANDS
        .iter()
        .enumerate()
        .map(|(i, (letter, min_score, max_score, points, description))| {
            let is_passing = *min_score >= program_type.pass_mark();
            let description = if is_passing { *description } else { "Fail" };
            GradingScaleEntry {
                id: None,
                program_type,
                letter_grade: letter.to_string(),
                min_score: *min_score,
                max_score: *max_score,
                grade_points: *points,
                is_passing,
                is_active: true,
                description_en: Some(description.to_string()),
                description_ar: None,
                sort_order: i as i64 + 1,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    pub total: f64,
    pub letter_grade: String,
    pub grade_points: f64,
    pub is_passing: bool,
}

/// Active bands of one program type, ordered by lower bound, highest first.
#[derive(Debug, Clone)]
pub struct GradingScale {
    program_type: ProgramType,
    bands: Vec<GradingScaleEntry>,
}

impl Default for GradingScale {
    fn default() -> Self {
        Self::from_entries(ProgramType::default(), Vec::new())
    }
}

impl GradingScale {
    /// Builds the `program_type` scale from stored entries. Inactive entries
    /// and those of other program types are dropped; with nothing left, the
    /// fallback table is used instead.
    pub fn from_entries(program_type: ProgramType, entries: Vec<GradingScaleEntry>) -> Self {
        let mut bands: Vec<GradingScaleEntry> = entries
            .into_iter()
            .filter(|e| e.is_active && e.program_type == program_type)
            .collect();
        if bands.is_empty() {
            bands = fallback_scale(program_type);
        }
        bands.sort_by(|a, b| {
            b.min_score
                .partial_cmp(&a.min_score)
                .unwrap_or(Ordering::Equal)
        });
        Self {
            program_type,
            bands,
        }
    }

    pub fn program_type(&self) -> ProgramType {
        self.program_type
    }

    #[cfg(test)]
    pub fn bands(&self) -> &[GradingScaleEntry] {
        &self.bands
    }

    /// First band (top-down) whose lower bound is at or below `total`.
    /// `None` below every active band, and for NaN.
    pub fn band_for(&self, total: f64) -> Option<&GradingScaleEntry> {
        self.bands.iter().find(|b| total >= b.min_score)
    }

    /// Totals no band covers fail with no points.
    pub fn grade(&self, total: f64) -> GradeResult {
        match self.band_for(total) {
            Some(band) => GradeResult {
                total,
                letter_grade: band.letter_grade.clone(),
                grade_points: band.grade_points,
                is_passing: band.is_passing,
            },
            None => GradeResult {
                total,
                letter_grade: FAIL_LETTER.to_string(),
                grade_points: 0.0,
                is_passing: false,
            },
        }
    }
}

/// Aggregates the components and maps the total in one step.
pub fn compute_grade(
    input: &ScoreInput,
    weights: &ComponentWeights,
    scale: &GradingScale,
) -> GradeResult {
    scale.grade(aggregate_scores(input, weights))
}

/// Checks that the active bands of each program type do not overlap. Gaps
/// are allowed; the mapper resolves them to the next band down.
pub fn find_overlap(entries: &[GradingScaleEntry]) -> Option<(String, String)> {
    let mut active: Vec<&GradingScaleEntry> = entries.iter().filter(|e| e.is_active).collect();
    active.sort_by(|a, b| {
        a.program_type.as_str().cmp(b.program_type.as_str()).then(
            b.min_score
                .partial_cmp(&a.min_score)
                .unwrap_or(Ordering::Equal),
        )
    });
    for pair in active.windows(2) {
        let (upper, lower) = (pair[0], pair[1]);
        if upper.program_type == lower.program_type && lower.max_score >= upper.min_score {
            return Some((upper.letter_grade.clone(), lower.letter_grade.clone()));
        }
    }
    None
}

#[derive(Debug, Clone, Copy)]
pub struct GpaCourse {
    pub credits: f64,
    pub grade_points: f64,
    pub is_passing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpaSummary {
    pub gpa: f64,
    pub total_credits: f64,
    pub passed_credits: f64,
    pub courses_counted: usize,
}

/// Credit-weighted grade point average.
pub fn compute_gpa<I>(courses: I) -> GpaSummary
where
    I: IntoIterator<Item = GpaCourse>,
{
    let mut points = 0.0_f64;
    let mut credits = 0.0_f64;
    let mut passed = 0.0_f64;
    let mut counted = 0_usize;
    for c in courses {
        if c.credits <= 0.0 {
            continue;
        }
        points += c.grade_points * c.credits;
        credits += c.credits;
        if c.is_passing {
            passed += c.credits;
        }
        counted += 1;
    }
    GpaSummary {
        gpa: if credits > 0.0 {
            round_2(points / credits)
        } else {
            0.0
        },
        total_credits: credits,
        passed_credits: passed,
        courses_counted: counted,
    }
}
