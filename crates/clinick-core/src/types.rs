//! Core data types for Clinick incident reports

use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// Opaque report identifier assigned by the backend
///
/// Always serialized as a string; numeric identifiers are accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl<'de> Deserialize<'de> for ReportId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Signed(n) => Self(n.to_string()),
            RawId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

impl ReportId {
    /// Wrap a backend identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ReportId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Role of the person reporting or affected by the incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A student
    Student,
    /// A teacher
    Teacher,
    /// Non-teaching staff
    Staff,
    /// Any value the backend sends that this client does not know
    #[serde(other)]
    Other,
}

impl Role {
    /// Roles offered on the submission form
    pub const SELECTABLE: [Self; 3] = [Self::Student, Self::Teacher, Self::Staff];

    /// Wire and display label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Teacher => "Teacher",
            Self::Staff => "Staff",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::SELECTABLE
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation("role", format!("unknown role '{s}'")))
    }
}

/// Incident severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Mild
    Mild,
    /// Moderate
    Moderate,
    /// Severe
    Severe,
    /// Any value the backend sends that this client does not know
    #[serde(other)]
    Other,
}

impl Severity {
    /// Severities offered on the submission form
    pub const SELECTABLE: [Self; 3] = [Self::Mild, Self::Moderate, Self::Severe];

    /// Wire and display label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mild => "Mild",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::SELECTABLE
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation("severity", format!("unknown severity '{s}'")))
    }
}

/// A submitted incident report as returned by the backend
///
/// Text fields the backend omits decode as empty strings so a single sparse
/// record does not break the list. The identifier is read from `_id`, falling
/// back to `id`; records carrying both keep `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireReport")]
pub struct Report {
    /// Backend identifier
    #[serde(rename = "_id")]
    pub id: ReportId,

    /// Reporter role
    #[serde(default)]
    pub role: Option<Role>,

    /// Name of the patient
    #[serde(default)]
    pub patient_name: String,

    /// Where the incident happened
    #[serde(default)]
    pub location: String,

    /// Short incident description
    #[serde(default)]
    pub incident: String,

    /// Incident severity
    #[serde(default)]
    pub severity: Option<Severity>,

    /// Free-text symptoms
    #[serde(default)]
    pub symptoms: String,

    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Whether a dashboard has already observed the report
    #[serde(default)]
    pub seen: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReport {
    #[serde(rename = "_id", default)]
    mongo_id: Option<ReportId>,
    #[serde(default)]
    id: Option<ReportId>,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    patient_name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    incident: String,
    #[serde(default)]
    severity: Option<Severity>,
    #[serde(default)]
    symptoms: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    seen: bool,
}

impl TryFrom<WireReport> for Report {
    type Error = String;

    fn try_from(wire: WireReport) -> std::result::Result<Self, Self::Error> {
        let id = wire
            .mongo_id
            .or(wire.id)
            .ok_or_else(|| "missing field `_id`".to_string())?;

        Ok(Self {
            id,
            role: wire.role,
            patient_name: wire.patient_name,
            location: wire.location,
            incident: wire.incident,
            severity: wire.severity,
            symptoms: wire.symptoms,
            created_at: wire.created_at,
            seen: wire.seen,
        })
    }
}

/// Validated payload for `POST /report`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    /// Reporter role
    pub role: Role,
    /// Name of the patient
    pub patient_name: String,
    /// Where the incident happened
    pub location: String,
    /// Short incident description
    pub incident: String,
    /// Incident severity
    pub severity: Severity,
    /// Free-text symptoms
    pub symptoms: String,
}

/// The submission form as the user fills it in
///
/// Every field is required. The draft is kept intact when a submission fails
/// so the user can retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportDraft {
    /// Selected role
    pub role: Option<Role>,
    /// Patient name
    pub patient_name: String,
    /// Location
    pub location: String,
    /// Incident
    pub incident: String,
    /// Selected severity
    pub severity: Option<Severity>,
    /// Symptoms
    pub symptoms: String,
}

impl ReportDraft {
    /// Check every required field, in form order
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first missing field.
    pub fn validate(&self) -> Result<NewReport> {
        let role = match self.role {
            Some(Role::Other) => return Err(Error::validation("role", "Select a valid role")),
            Some(role) => role,
            None => return Err(Error::validation("role", "Field is required")),
        };
        let patient_name = required("patientName", &self.patient_name)?;
        let location = required("location", &self.location)?;
        let incident = required("incident", &self.incident)?;
        let severity = match self.severity {
            Some(Severity::Other) => {
                return Err(Error::validation("severity", "Select a valid severity"));
            }
            Some(severity) => severity,
            None => return Err(Error::validation("severity", "Field is required")),
        };
        let symptoms = required("symptoms", &self.symptoms)?;

        Ok(NewReport {
            role,
            patient_name,
            location,
            incident,
            severity,
            symptoms,
        })
    }

    /// Reset every field to empty
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether nothing has been entered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "Field is required"));
    }
    Ok(trimmed.to_string())
}

/// Month/year filter for the report list and exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthFilter {
    year: i32,
    month: u32,
}

impl MonthFilter {
    /// Build a filter, checking that the month is 1-12
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an out-of-range month.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::validation(
                "month",
                format!("month must be between 1 and 12, got {month}"),
            ));
        }
        Ok(Self { year, month })
    }

    /// The current month in local time
    #[must_use]
    pub fn current() -> Self {
        let now = Local::now();
        Self {
            year: now.year(),
            month: now.month(),
        }
    }

    /// Calendar year
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Month number, 1-12
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// Query pairs as the backend expects them: no leading zeros
    #[must_use]
    pub fn query_pairs(self) -> [(&'static str, String); 2] {
        [
            ("month", self.month.to_string()),
            ("year", self.year.to_string()),
        ]
    }
}

impl fmt::Display for MonthFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthFilter {
    type Err = Error;

    /// Parse the `YYYY-MM` form used by month pickers
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::validation("month", format!("expected YYYY-MM, got '{s}'"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}
