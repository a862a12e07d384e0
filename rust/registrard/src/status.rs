//! Canonical status vocabularies. Input accepts the synonyms the various
//! front-end screens send; output is always the canonical spelling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} status: {value}")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

fn normalize_token(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().replace(|c: char| c == ' ' || c == '-', "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Enrolled,
    Dropped,
    Withdrawn,
    Completed,
    Failed,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enrolled => "enrolled",
            Self::Dropped => "dropped",
            Self::Withdrawn => "withdrawn",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Dropped and withdrawn enrollments carry no credit and free the
    /// (student, course, semester) slot.
    pub fn counts_toward_gpa(self) -> bool {
        !matches!(self, Self::Dropped | Self::Withdrawn)
    }
}

impl FromStr for EnrollmentStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "ENROLLED" | "ACTIVE" | "REGISTERED" | "CONFIRMED" => Ok(Self::Enrolled),
            "DROPPED" | "CANCELLED" | "CANCELED" => Ok(Self::Dropped),
            "WITHDRAWN" | "WITHDRAW" => Ok(Self::Withdrawn),
            "COMPLETED" | "PASSED" | "FINISHED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(StatusParseError {
                kind: "enrollment",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Suspended,
    Graduated,
    Withdrawn,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Graduated => "graduated",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for StudentStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "ACTIVE" | "ENROLLED" | "REGULAR" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            "GRADUATED" | "ALUMNI" => Ok(Self::Graduated),
            "WITHDRAWN" | "DROPPED_OUT" => Ok(Self::Withdrawn),
            _ => Err(StatusParseError {
                kind: "student",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeStatus {
    Pending,
    Submitted,
    Approved,
    Contested,
}

impl GradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Contested => "contested",
        }
    }
}

impl FromStr for GradeStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "PENDING" | "DRAFT" => Ok(Self::Pending),
            "SUBMITTED" => Ok(Self::Submitted),
            "APPROVED" | "FINAL" => Ok(Self::Approved),
            "CONTESTED" | "APPEALED" => Ok(Self::Contested),
            _ => Err(StatusParseError {
                kind: "grade",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for GradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
