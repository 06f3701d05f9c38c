// src/attendance_status_tests.rs

#[cfg(test)]
mod tests {
    use crate::attendance_status::*;
    use chrono::{NaiveDate, NaiveDateTime};

    // Helper to build a test record. 2024-05-10 is a Friday, 2024-05-11 a
    // Saturday; most tests below lean on those two dates.
    fn record(
        date: Option<&str>,
        morning: Option<&str>,
        midday: Option<&str>,
        evening: Option<&str>,
        leave: Option<&str>,
    ) -> AttendanceRecord {
        AttendanceRecord {
            subject_id: "subject-1".to_string(),
            date: date.map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .expect("test date must be valid ISO date")
            }),
            morning_check_in: morning.map(String::from),
            midday_check_in: midday.map(String::from),
            evening_check_in: evening.map(String::from),
            leave_status: leave.map(String::from),
        }
    }

    fn at(datetime: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(datetime, "%Y-%m-%d %H:%M:%S")
            .expect("test datetime must be valid")
    }

    // --- Leave Override ---

    #[test]
    fn approved_leave_wins_regardless_of_check_ins() {
        let rec = record(Some("2024-05-10"), None, None, None, Some("Izin"));
        let verdict = evaluate(&rec, at("2024-05-20 09:00:00")).unwrap();
        assert_eq!(verdict, StatusVerdict::Leave(LeaveKind::Approved));

        // Even a fully-stamped record yields the leave verdict.
        let rec = record(
            Some("2024-05-10"),
            Some("07:45"),
            Some("12:30"),
            Some("17:00"),
            Some("Izin"),
        );
        let verdict = evaluate(&rec, at("2024-05-20 09:00:00")).unwrap();
        assert_eq!(verdict, StatusVerdict::Leave(LeaveKind::Approved));
        assert_eq!(verdict.to_string(), "Izin");
    }

    #[test]
    fn pending_leave_review_also_short_circuits() {
        let rec = record(Some("2024-05-10"), None, None, None, Some("Menunggu"));
        let verdict = evaluate(&rec, at("2024-05-10 09:00:00")).unwrap();
        assert_eq!(verdict, StatusVerdict::Leave(LeaveKind::AwaitingReview));
        assert_eq!(verdict.to_string(), "Menunggu");
    }

    #[test]
    fn unknown_leave_marker_falls_through_to_window_math() {
        let rec = record(
            Some("2024-05-10"),
            Some("07:45"),
            Some("12:30"),
            Some("17:00"),
            Some("Dinas Luar"),
        );
        let verdict = evaluate(&rec, at("2024-05-20 09:00:00")).unwrap();
        assert_eq!(
            verdict,
            StatusVerdict::Valid,
            "an unrecognized leave marker must not block normal evaluation"
        );
    }

    // --- Past Regular Days ---

    #[test]
    fn past_regular_day_all_slots_within_window_is_valid() {
        let rec = record(
            Some("2024-05-10"),
            Some("2024-05-10T07:45:00"),
            Some("2024-05-10T12:30:00"),
            Some("2024-05-10T17:00:00"),
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-20 09:00:00")).unwrap(),
            StatusVerdict::Valid
        );
    }

    #[test]
    fn past_regular_day_missing_any_slot_is_invalid_never_pending() {
        for (m, mid, e) in [
            (None, Some("12:30"), Some("17:00")),
            (Some("07:45"), None, Some("17:00")),
            (Some("07:45"), Some("12:30"), None),
        ] {
            let rec = record(Some("2024-05-10"), m, mid, e, None);
            assert_eq!(
                evaluate(&rec, at("2024-05-20 09:00:00")).unwrap(),
                StatusVerdict::Invalid,
                "a past date is never pending (missing slot: {:?}/{:?}/{:?})",
                m,
                mid,
                e
            );
        }
    }

    #[test]
    fn past_regular_day_mistimed_slot_is_invalid() {
        // Midday at 14:00 is outside the regular 12:00-13:30 window.
        let rec = record(
            Some("2024-05-10"),
            Some("07:45"),
            Some("14:00"),
            Some("17:00"),
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-20 09:00:00")).unwrap(),
            StatusVerdict::Invalid
        );
    }

    // --- Saturday (Short Day) ---

    #[test]
    fn saturday_two_slots_within_window_is_valid_and_evening_is_ignored() {
        // Concrete scenario from the attendance rules: Saturday 2024-05-11,
        // morning 07:45, midday 13:30, no evening, evaluated at 19:00.
        let rec = record(
            Some("2024-05-11"),
            Some("2024-05-11T07:45:00"),
            Some("2024-05-11T13:30:00"),
            None,
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-11 19:00:00")).unwrap(),
            StatusVerdict::Valid
        );

        // An evening stamp on a Saturday is irrelevant, even a nonsense one.
        let rec = record(
            Some("2024-05-11"),
            Some("07:45"),
            Some("13:30"),
            Some("not a time"),
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-11 19:00:00")).unwrap(),
            StatusVerdict::Valid
        );
    }

    #[test]
    fn saturday_midday_uses_the_alternate_window() {
        // 12:30 is inside the regular midday window but outside Saturday's
        // 13:00-18:00 one.
        let rec = record(
            Some("2024-05-11"),
            Some("2024-05-11T07:45:00"),
            Some("2024-05-11T12:30:00"),
            None,
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-11 19:00:00")).unwrap(),
            StatusVerdict::Invalid
        );
    }

    #[test]
    fn saturday_incomplete_record_is_pending_until_1800_then_invalid() {
        let rec = record(Some("2024-05-11"), Some("07:45"), None, None, None);
        assert_eq!(
            evaluate(&rec, at("2024-05-11 17:59:59")).unwrap(),
            StatusVerdict::Pending
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-11 18:00:00")).unwrap(),
            StatusVerdict::Invalid
        );
    }

    // --- Today / Cutoff ---

    #[test]
    fn todays_incomplete_record_is_pending_before_2100() {
        let rec = record(Some("2024-05-10"), Some("07:45"), None, None, None);
        assert_eq!(
            evaluate(&rec, at("2024-05-10 09:00:00")).unwrap(),
            StatusVerdict::Pending
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-10 20:59:59")).unwrap(),
            StatusVerdict::Pending
        );
    }

    #[test]
    fn todays_incomplete_record_is_invalid_at_or_after_2100() {
        let rec = record(Some("2024-05-10"), Some("07:45"), None, None, None);
        assert_eq!(
            evaluate(&rec, at("2024-05-10 21:00:00")).unwrap(),
            StatusVerdict::Invalid
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-10 22:30:00")).unwrap(),
            StatusVerdict::Invalid
        );
    }

    #[test]
    fn pending_requires_a_missing_slot_not_merely_a_mistimed_one() {
        // All three slots present but the morning one is mistimed: the record
        // is already invalid, before the cutoff or not.
        let rec = record(
            Some("2024-05-10"),
            Some("09:00"),
            Some("12:30"),
            Some("17:00"),
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-10 18:00:00")).unwrap(),
            StatusVerdict::Invalid
        );

        // A mistimed slot plus a genuinely missing one still pends before the
        // cutoff: the mistimed stamp counts toward completeness only.
        let rec = record(Some("2024-05-10"), Some("09:00"), None, None, None);
        assert_eq!(
            evaluate(&rec, at("2024-05-10 10:00:00")).unwrap(),
            StatusVerdict::Pending
        );
    }

    #[test]
    fn a_complete_valid_record_is_valid_even_before_the_cutoff() {
        let rec = record(
            Some("2024-05-10"),
            Some("07:45"),
            Some("12:30"),
            Some("17:00"),
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-10 18:00:00")).unwrap(),
            StatusVerdict::Valid
        );
    }

    // --- Boundaries ---

    #[test]
    fn window_boundaries_are_inclusive_to_the_second() {
        let rec = record(
            Some("2024-05-10"),
            Some("08:15:00"),
            Some("12:30"),
            Some("17:00"),
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-20 09:00:00")).unwrap(),
            StatusVerdict::Valid
        );

        let rec = record(
            Some("2024-05-10"),
            Some("08:15:01"),
            Some("12:30"),
            Some("17:00"),
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-20 09:00:00")).unwrap(),
            StatusVerdict::Invalid
        );
    }

    // --- Malformed Input ---

    #[test]
    fn malformed_check_in_counts_as_absent() {
        // Past date: absent slot makes the record invalid.
        let rec = record(
            Some("2024-05-10"),
            Some("garbage"),
            Some("12:30"),
            Some("17:00"),
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-20 09:00:00")).unwrap(),
            StatusVerdict::Invalid
        );

        // Today before the cutoff: the absent slot keeps the record pending.
        let rec = record(
            Some("2024-05-10"),
            Some("garbage"),
            Some("12:30"),
            Some("17:00"),
            None,
        );
        assert_eq!(
            evaluate(&rec, at("2024-05-10 18:00:00")).unwrap(),
            StatusVerdict::Pending
        );
    }

    #[test]
    fn missing_date_is_rejected() {
        let rec = record(None, Some("07:45"), Some("12:30"), Some("17:00"), None);
        let err = evaluate(&rec, at("2024-05-10 09:00:00")).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::MissingDate {
                subject_id: "subject-1".to_string()
            }
        );
    }

    // --- Purity ---

    #[test]
    fn evaluation_is_deterministic() {
        let rec = record(Some("2024-05-10"), Some("07:45"), None, None, None);
        let now = at("2024-05-10 09:00:00");
        let first = evaluate(&rec, now).unwrap();
        let second = evaluate(&rec, now).unwrap();
        assert_eq!(first, second);
    }

    // --- Time Parsing ---

    #[test]
    fn parse_time_of_day_accepts_both_encodings() {
        use chrono::NaiveTime;
        let expected = NaiveTime::from_hms_opt(7, 45, 0).unwrap();
        for raw in [
            "2024-05-11T07:45:00",
            "2024-05-11 07:45:00",
            "07:45:00",
            "07:45",
            " 07:45 ",
        ] {
            assert_eq!(parse_time_of_day(raw), Some(expected), "input: {:?}", raw);
        }
    }

    #[test]
    fn parse_time_of_day_rejects_garbage() {
        for raw in ["", "garbage", "25:00", "2024-05-11", "07:45+07:00"] {
            assert_eq!(parse_time_of_day(raw), None, "input: {:?}", raw);
        }
    }
}
