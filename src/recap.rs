// src/recap.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Asia::Jakarta;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attendance_status::{evaluate, AttendanceRecord, StatusVerdict};
use crate::presensi_client::{AttendanceRecordDto, PresensiClient, PresensiError};

// --- Normalization ---

/// Current institution-local wall-clock time. Read once at a call
/// boundary (CLI command, watch tick) and passed down; the evaluator
/// itself never touches the clock.
pub fn local_now() -> NaiveDateTime {
    Utc::now().with_timezone(&Jakarta).naive_local()
}

/// Normalizes a raw check-in string to institution-local time.
///
/// The API is inconsistent about offsets: some deployments emit RFC3339
/// timestamps in UTC, others naive local strings. Anything carrying an
/// explicit offset is shifted to Asia/Jakarta and re-rendered naive;
/// naive timestamps and bare `HH:MM[:SS]` values pass through untouched.
pub fn normalize_check_in(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(dt) => dt
            .with_timezone(&Jakarta)
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

fn normalize_opt(raw: Option<String>) -> Option<String> {
    raw.map(|s| normalize_check_in(&s))
}

/// Converts a wire record into the evaluator's domain record. An
/// unparseable date becomes `None` and surfaces later as an
/// `unevaluated` row rather than a dropped one.
pub fn to_domain(dto: AttendanceRecordDto) -> (AttendanceRecord, Option<String>) {
    let date = dto
        .date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());
    if date.is_none() {
        debug!(
            "Record for subject '{}' has unusable date field: {:?}",
            dto.user_id, dto.date
        );
    }

    let record = AttendanceRecord {
        subject_id: dto.user_id,
        date,
        morning_check_in: normalize_opt(dto.morning_check_in),
        midday_check_in: normalize_opt(dto.midday_check_in),
        evening_check_in: normalize_opt(dto.evening_check_in),
        leave_status: dto.leave_status,
    };
    (record, dto.user_name)
}

// --- Recap Types ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecapRow {
    pub subject_id: String,
    pub subject_name: Option<String>,
    pub record: AttendanceRecord,
    /// `None` when the record could not be evaluated (missing date).
    pub verdict: Option<StatusVerdict>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecapSummary {
    pub valid: usize,
    pub invalid: usize,
    pub pending: usize,
    pub leave: usize,
    pub unevaluated: usize,
}

impl RecapSummary {
    pub fn total(&self) -> usize {
        self.valid + self.invalid + self.pending + self.leave + self.unevaluated
    }
}

#[derive(Debug, Clone)]
pub struct DailyRecap {
    pub date: NaiveDate,
    pub rows: Vec<RecapRow>,
    pub summary: RecapSummary,
}

// --- Service ---

#[derive(Clone)]
pub struct RecapService {
    client: Arc<PresensiClient>,
}

impl RecapService {
    pub fn new(client: Arc<PresensiClient>) -> Self {
        Self { client }
    }

    /// Fetches and evaluates every subject's record for one date.
    pub async fn daily_recap(
        &self,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<DailyRecap, PresensiError> {
        info!("Fetching daily attendance for {}", date);
        let dtos = self.client.get_daily_records(date).await?;

        let (rows, summary) = evaluate_rows(dtos, now);
        info!(
            "Evaluated {} records for {}: {} valid, {} invalid, {} pending, {} leave, {} unevaluated",
            summary.total(),
            date,
            summary.valid,
            summary.invalid,
            summary.pending,
            summary.leave,
            summary.unevaluated
        );

        Ok(DailyRecap {
            date,
            rows,
            summary,
        })
    }

    /// One subject's evaluated history over an inclusive date range.
    pub async fn subject_history(
        &self,
        subject_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<RecapRow>, PresensiError> {
        info!(
            "Fetching attendance history for subject '{}' ({} to {})",
            subject_id, from, to
        );
        let dtos = self.client.get_subject_records(subject_id, from, to).await?;
        let (rows, _) = evaluate_rows(dtos, now);
        Ok(rows)
    }

    /// The authenticated user's own evaluated history.
    pub async fn own_history(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<RecapRow>, PresensiError> {
        info!("Fetching own attendance history ({} to {})", from, to);
        let dtos = self.client.get_own_records(from, to).await?;
        let (rows, _) = evaluate_rows(dtos, now);
        Ok(rows)
    }
}

/// Evaluates a batch of wire records against one moment. Pure apart from
/// logging, so the verdict bookkeeping is testable without a server.
pub fn evaluate_rows(
    dtos: Vec<AttendanceRecordDto>,
    now: NaiveDateTime,
) -> (Vec<RecapRow>, RecapSummary) {
    let mut rows = Vec::with_capacity(dtos.len());
    let mut summary = RecapSummary::default();

    for dto in dtos {
        let (record, subject_name) = to_domain(dto);
        let verdict = match evaluate(&record, now) {
            Ok(v) => {
                match v {
                    StatusVerdict::Valid => summary.valid += 1,
                    StatusVerdict::Invalid => summary.invalid += 1,
                    StatusVerdict::Pending => summary.pending += 1,
                    StatusVerdict::Leave(_) => summary.leave += 1,
                }
                Some(v)
            }
            Err(e) => {
                warn!("Skipping verdict for unevaluable record: {}", e);
                summary.unevaluated += 1;
                None
            }
        };
        rows.push(RecapRow {
            subject_id: record.subject_id.clone(),
            subject_name,
            record,
            verdict,
        });
    }

    (rows, summary)
}
