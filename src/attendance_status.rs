// src/attendance_status.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::schedule::schedule_for;

// --- Status Types ---

/// Server-declared leave state that supersedes window evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveKind {
    /// Approved leave ("Izin" on the wire).
    Approved,
    /// Leave request still under review ("Menunggu" on the wire).
    AwaitingReview,
}

impl LeaveKind {
    /// Maps a wire marker to a leave kind. Anything unrecognized is not a
    /// leave override and falls through to window evaluation.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "Izin" => Some(LeaveKind::Approved),
            "Menunggu" => Some(LeaveKind::AwaitingReview),
            _ => None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            LeaveKind::Approved => "Izin",
            LeaveKind::AwaitingReview => "Menunggu",
        }
    }
}

/// The verdict for one day's attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusVerdict {
    Valid,
    Invalid,
    Pending,
    Leave(LeaveKind),
}

impl fmt::Display for StatusVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Leave markers are rendered verbatim; export consumers take these
        // strings as-is.
        match self {
            StatusVerdict::Valid => write!(f, "Valid"),
            StatusVerdict::Invalid => write!(f, "Invalid"),
            StatusVerdict::Pending => write!(f, "Pending"),
            StatusVerdict::Leave(kind) => write!(f, "{}", kind.marker()),
        }
    }
}

// --- Record ---

/// One day's attendance for one person, as produced by the API.
///
/// Check-ins stay raw strings: the server mixes full timestamps and bare
/// `HH:MM[:SS]` values, and a malformed value must degrade to "absent"
/// rather than fail the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub subject_id: String,
    pub date: Option<NaiveDate>,
    pub morning_check_in: Option<String>,
    pub midday_check_in: Option<String>,
    pub evening_check_in: Option<String>,
    pub leave_status: Option<String>,
}

impl AttendanceRecord {
    pub fn check_in(&self, slot: crate::schedule::Slot) -> Option<&str> {
        use crate::schedule::Slot;
        match slot {
            Slot::Morning => self.morning_check_in.as_deref(),
            Slot::Midday => self.midday_check_in.as_deref(),
            Slot::Evening => self.evening_check_in.as_deref(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("attendance record for subject '{subject_id}' has no usable date")]
    MissingDate { subject_id: String },
}

// --- Time Parsing ---

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Extracts a time-of-day from either a full timestamp or a bare
/// `HH:MM[:SS]` string. Malformed input yields `None`; the slot is then
/// treated as absent, never as silently valid.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.time());
        }
    }
    for fmt in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(raw, fmt) {
            return Some(t);
        }
    }
    None
}

// --- Evaluator ---

/// Decides the verdict for one record at one moment.
///
/// Pure: no I/O, no ambient clock reads. Callers are expected to
/// re-invoke this against a live `now` (the watch loop does so every
/// minute) so a `Pending` verdict flips once the day's cutoff passes.
/// Timestamps must already be institution-local; see
/// `recap::normalize_check_in`.
pub fn evaluate(
    record: &AttendanceRecord,
    now: NaiveDateTime,
) -> Result<StatusVerdict, EvaluationError> {
    // A declared leave state wins over window math entirely.
    if let Some(kind) = record.leave_status.as_deref().and_then(LeaveKind::from_marker) {
        return Ok(StatusVerdict::Leave(kind));
    }

    // Without a date the slot set is unknowable; reject rather than guess.
    let date = record.date.ok_or_else(|| EvaluationError::MissingDate {
        subject_id: record.subject_id.clone(),
    })?;

    let schedule = schedule_for(date);

    let mut all_present = true;
    let mut all_within = true;
    for window in &schedule.windows {
        match record.check_in(window.slot).and_then(parse_time_of_day) {
            Some(t) => {
                if !window.contains(t) {
                    all_within = false;
                }
            }
            None => {
                all_present = false;
                all_within = false;
            }
        }
    }

    // Today's record stays pending until the cutoff, but only while a
    // required slot is actually missing. A present-but-mistimed check-in
    // counts toward completeness and the record is already invalid.
    let is_today = date == now.date();
    if is_today && now.time() < schedule.cutoff && !all_present {
        return Ok(StatusVerdict::Pending);
    }

    if all_present && all_within {
        Ok(StatusVerdict::Valid)
    } else {
        Ok(StatusVerdict::Invalid)
    }
}
