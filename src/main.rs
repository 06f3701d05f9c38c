// src/main.rs
use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod attendance_status;
#[cfg(test)]
mod attendance_status_tests;
mod export;
mod presensi_client;
mod recap;
mod schedule;
mod watch;

use attendance_status::parse_time_of_day;
use presensi_client::{
    run_session_refresh, LeaveRequestPayload, LeaveType, PresensiClient, PresensiConfig,
};
use recap::{local_now, RecapRow, RecapService, RecapSummary};
use schedule::Slot;

#[derive(Parser)]
#[command(
    name = "presensi",
    version,
    about = "e-presensi attendance client: fetches records, evaluates check-in windows"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daily recap across all subjects (admin)
    Recap {
        /// Date to recap; defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// One subject's evaluated history (admin)
    History {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Your own attendance history
    Me {
        /// Defaults to 30 days before --to
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Defaults to today
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Poll today's records and log verdict transitions (admin)
    Watch {
        /// Polling interval in seconds
        #[arg(long, default_value_t = watch::DEFAULT_WATCH_INTERVAL_SECS)]
        interval: u64,
    },
    /// Export a daily recap as CSV (admin)
    Export {
        /// Date to export; defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Submit a check-in for a slot
    CheckIn {
        #[arg(long, value_enum)]
        slot: SlotArg,
    },
    /// Submit a leave request
    Leave {
        #[arg(long, value_enum)]
        kind: LeaveArg,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        reason: String,
    },
    /// List current announcements
    Announcements,
    /// List registered subjects and their roles (admin)
    Subjects,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SlotArg {
    Morning,
    Midday,
    Evening,
}

impl From<SlotArg> for Slot {
    fn from(arg: SlotArg) -> Self {
        match arg {
            SlotArg::Morning => Slot::Morning,
            SlotArg::Midday => Slot::Midday,
            SlotArg::Evening => Slot::Evening,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LeaveArg {
    Izin,
    Sakit,
    Cuti,
}

impl From<LeaveArg> for LeaveType {
    fn from(arg: LeaveArg) -> Self {
        match arg {
            LeaveArg::Izin => LeaveType::Izin,
            LeaveArg::Sakit => LeaveType::Sakit,
            LeaveArg::Cuti => LeaveType::Cuti,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config =
        PresensiConfig::from_env().context("Failed to load PRESENSI_* configuration")?;
    let client =
        Arc::new(PresensiClient::new(config).context("Failed to construct API client")?);
    let service = RecapService::new(client.clone());

    match cli.command {
        Command::Recap { date } => {
            require_admin(&client).await?;
            let now = local_now();
            let date = date.unwrap_or_else(|| now.date());
            let daily = service.daily_recap(date, now).await?;
            print_rows(&daily.rows);
            print_summary(&daily.summary);
        }
        Command::History { subject, from, to } => {
            require_admin(&client).await?;
            check_range(from, to)?;
            let rows = service
                .subject_history(&subject, from, to, local_now())
                .await?;
            print_rows(&rows);
        }
        Command::Me { from, to } => {
            client.ensure_session().await?;
            let now = local_now();
            let to = to.unwrap_or_else(|| now.date());
            let from = from.unwrap_or_else(|| to - Duration::days(30));
            check_range(from, to)?;
            let rows = service.own_history(from, to, now).await?;
            print_rows(&rows);
        }
        Command::Watch { interval } => {
            require_admin(&client).await?;
            tokio::spawn(run_session_refresh(client.clone()));
            watch::run_status_watch(Arc::new(service), interval).await;
        }
        Command::Export { date, output } => {
            require_admin(&client).await?;
            let now = local_now();
            let date = date.unwrap_or_else(|| now.date());
            let daily = service.daily_recap(date, now).await?;
            export::export_recap_to_file(&daily.rows, &output)?;
            println!("Wrote {} rows to {}", daily.rows.len(), output.display());
        }
        Command::CheckIn { slot } => {
            client.ensure_session().await?;
            let response = client.submit_check_in(slot.into()).await?;
            println!("{}", response.message);
        }
        Command::Leave {
            kind,
            from,
            to,
            reason,
        } => {
            check_range(from, to)?;
            client.ensure_session().await?;
            let payload = LeaveRequestPayload {
                kind: kind.into(),
                start_date: from,
                end_date: to,
                reason,
            };
            let response = client.submit_leave_request(&payload).await?;
            match response.status {
                Some(status) => println!("{} (status: {})", response.message, status),
                None => println!("{}", response.message),
            }
        }
        Command::Announcements => {
            client.ensure_session().await?;
            let announcements = client.get_announcements().await?;
            if announcements.is_empty() {
                println!("No announcements.");
            }
            for item in announcements {
                match item.published_at {
                    Some(ts) => println!("[{}] {}", ts, item.title),
                    None => println!("{}", item.title),
                }
                println!("    {}", item.body);
            }
        }
        Command::Subjects => {
            require_admin(&client).await?;
            let subjects = client.get_subjects().await?;
            println!("{:<14} {:<24} {}", "subject", "name", "role");
            for subject in subjects {
                println!("{:<14} {:<24} {}", subject.id, subject.name, subject.role);
            }
        }
    }

    Ok(())
}

async fn require_admin(client: &PresensiClient) -> Result<()> {
    client.ensure_session().await?;
    match client.session_role().await {
        Some(role) if role.is_admin() => Ok(()),
        Some(role) => bail!(
            "this command needs an admin session (current role: {})",
            role
        ),
        None => bail!("no active session"),
    }
}

fn check_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if to < from {
        bail!("--to ({}) must not be before --from ({})", to, from);
    }
    Ok(())
}

/// Renders a check-in cell: time-of-day when parseable, "-" when absent,
/// "??" when the server sent something unreadable.
fn cell(raw: Option<&str>) -> String {
    match raw.and_then(parse_time_of_day) {
        Some(t) => t.format("%H:%M").to_string(),
        None if raw.is_some() => "??".to_string(),
        None => "-".to_string(),
    }
}

fn print_rows(rows: &[RecapRow]) {
    println!(
        "{:<14} {:<20} {:<12} {:>8} {:>8} {:>8}  {}",
        "subject", "name", "date", "morning", "midday", "evening", "status"
    );
    for row in rows {
        let date = row
            .record
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = row
            .verdict
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<14} {:<20} {:<12} {:>8} {:>8} {:>8}  {}",
            row.subject_id,
            row.subject_name.as_deref().unwrap_or("-"),
            date,
            cell(row.record.morning_check_in.as_deref()),
            cell(row.record.midday_check_in.as_deref()),
            cell(row.record.evening_check_in.as_deref()),
            status
        );
    }
}

fn print_summary(summary: &RecapSummary) {
    println!(
        "\n{} records: {} valid, {} invalid, {} pending, {} leave, {} unevaluated",
        summary.total(),
        summary.valid,
        summary.invalid,
        summary.pending,
        summary.leave,
        summary.unevaluated
    );
}
