use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{EnrollmentId, SessionId};
use crate::progression::percentage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttendanceError {
    #[error("unknown attendance status: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    /// Does not count against the member.
    Excused,
}

impl AttendanceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Excused => "excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(AttendanceError::UnknownStatus(other.to_owned())),
        }
    }
}

/// Attendance of one enrollment at one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub session_id: SessionId,
    pub enrollment_id: EnrollmentId,
    pub status: AttendanceStatus,
    pub recorded_at: DateTime<Utc>,
}

impl AttendanceRecord {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        enrollment_id: EnrollmentId,
        status: AttendanceStatus,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            enrollment_id,
            status,
            recorded_at,
        }
    }
}

/// Attendance rate over the sessions held so far, as a percentage.
///
/// Held sessions without a record count as absences; excused sessions are
/// left out of the denominator. Records for sessions not in `held` are
/// ignored. Kept separate from lesson-completion progress: the two measure
/// different things.
#[must_use]
pub fn attendance_rate(
    held: impl IntoIterator<Item = SessionId>,
    records: &[AttendanceRecord],
) -> f64 {
    let by_session: HashMap<SessionId, AttendanceStatus> = records
        .iter()
        .map(|r| (r.session_id, r.status))
        .collect();

    let mut present = 0_u32;
    let mut counted = 0_u32;
    for session in held {
        match by_session.get(&session) {
            Some(AttendanceStatus::Excused) => {}
            Some(AttendanceStatus::Present) => {
                present += 1;
                counted += 1;
            }
            Some(AttendanceStatus::Absent) | None => counted += 1,
        }
    }

    percentage(present, counted)
}
