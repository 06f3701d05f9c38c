// src/schedule.rs
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;

// --- Schedule Tables ---
//
// Window bounds and cutoffs live here as data so a schedule change touches
// one table. Saturday midday is 13:00-18:00, not the regular 12:00-13:30;
// that difference is the intended business rule (confirm with the
// institution before changing it).

/// One of the daily check-in opportunities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Morning,
    Midday,
    Evening,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Morning => "morning",
            Slot::Midday => "midday",
            Slot::Evening => "evening",
        }
    }
}

/// A named slot with its `[start, end]` time-of-day boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotWindow {
    pub slot: Slot,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SlotWindow {
    fn new(slot: Slot, start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            slot,
            start: hm(start.0, start.1),
            end: hm(end.0, end.1),
        }
    }

    /// Inclusive on both ends: a check-in at exactly `end` is in-window.
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

/// The required slot set for one kind of day, plus the hour after which an
/// incomplete record for today stops being pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub windows: Vec<SlotWindow>,
    pub cutoff: NaiveTime,
}

static REGULAR_DAY: Lazy<DaySchedule> = Lazy::new(|| DaySchedule {
    windows: vec![
        SlotWindow::new(Slot::Morning, (7, 30), (8, 15)),
        SlotWindow::new(Slot::Midday, (12, 0), (13, 30)),
        SlotWindow::new(Slot::Evening, (16, 0), (21, 0)),
    ],
    cutoff: hm(21, 0),
});

static SHORT_DAY: Lazy<DaySchedule> = Lazy::new(|| DaySchedule {
    windows: vec![
        SlotWindow::new(Slot::Morning, (7, 30), (8, 15)),
        SlotWindow::new(Slot::Midday, (13, 0), (18, 0)),
    ],
    cutoff: hm(18, 0),
});

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("static schedule table time")
}

/// Saturday runs the reduced two-slot schedule.
pub fn is_short_day(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sat
}

pub fn schedule_for(date: NaiveDate) -> &'static DaySchedule {
    if is_short_day(date) {
        &SHORT_DAY
    } else {
        &REGULAR_DAY
    }
}
