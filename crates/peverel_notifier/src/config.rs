//! Notifier configuration.
//!
//! # Responsibility
//! - Declare CLI flags with environment-variable fallbacks.
//! - Validate raw values into a typed [`NotifierConfig`] before anything
//!   touches the database or the network.
//!
//! # Invariants
//! - Configuration is read once at startup and never reloaded.
//! - A valid config always has at least one recipient and an interval
//!   between one hour and [`MAX_SCHEDULED_HOURS`].

use chrono::{FixedOffset, NaiveTime};
use clap::{ArgAction, Parser};
use once_cell::sync::Lazy;
use peverel_core::{default_log_level, LogOutput};
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

static TIME_OF_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}):(\d{2})(?:([+-])(\d{2}))?$").expect("valid time of day regex")
});

const SECONDS_PER_HOUR: u64 = 60 * 60;
/// Longest accepted interval between digests: one leap year.
pub const MAX_SCHEDULED_HOURS: i64 = 366 * 24;

/// Peverel notifier: emails a digest of overdue chores on a schedule.
#[derive(Parser, Debug, Clone)]
#[command(name = "peverel-notifier", version, about)]
pub struct Cli {
    /// SQLite database path (`:memory:` for a throwaway database).
    #[arg(long = "db", env = "DB_CONN_STRING")]
    pub db_conn_string: String,

    /// From address of digest emails.
    #[arg(long, env = "EMAIL_SENDER")]
    pub email_sender: String,

    /// Comma-separated recipient addresses.
    #[arg(long, env = "EMAIL_RECIPIENTS")]
    pub email_recipients: String,

    #[arg(long, env = "SMTP_SERVER")]
    pub smtp_server: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Use STARTTLS. `false` opens a plain connection.
    #[arg(long, env = "SMTP_TLS", default_value_t = true, action = ArgAction::Set)]
    pub smtp_tls: bool,

    /// Daily target as `HH:MM` or `HH:MM±hh`. Unset sends one digest and exits.
    #[arg(long, env = "SCHEDULED_TIME")]
    pub scheduled_time: Option<String>,

    /// Hours between digests.
    #[arg(long, env = "SCHEDULED_HOURS", default_value_t = 24, allow_negative_numbers = true)]
    pub scheduled_hours: i64,

    /// Days ahead listed as "coming up" in the digest; 0 disables the section.
    #[arg(long, env = "HORIZON_DAYS", default_value_t = 0, allow_negative_numbers = true)]
    pub horizon_days: i64,

    /// trace|debug|info|warn|error|off. Defaults by build mode.
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// `stdout`, `stderr` or a log file path.
    #[arg(long, env = "LOG_OUTPUT", default_value = "stderr")]
    pub log_output: String,
}

/// Target time of day, optionally pinned to a UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub time: NaiveTime,
    /// `None` means the clock's local offset.
    pub offset: Option<FixedOffset>,
}

impl TimeOfDay {
    /// Parses `HH:MM` or `HH:MM±hh`, e.g. `20:59` or `07:30+02`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTimeOfDay(value.to_string());
        let caps = TIME_OF_DAY_RE.captures(value.trim()).ok_or_else(invalid)?;

        let hour: u32 = caps[1].parse().map_err(|_| invalid())?;
        let minute: u32 = caps[2].parse().map_err(|_| invalid())?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)?;

        let offset = match (caps.get(3), caps.get(4)) {
            (Some(sign), Some(hours)) => {
                let hours: i32 = hours.as_str().parse().map_err(|_| invalid())?;
                let seconds = hours * 3600;
                let offset = if sign.as_str() == "-" {
                    FixedOffset::west_opt(seconds)
                } else {
                    FixedOffset::east_opt(seconds)
                };
                Some(offset.ok_or_else(invalid)?)
            }
            _ => None,
        };

        Ok(Self { time, offset })
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.time.format("%H:%M"))?;
        if let Some(offset) = self.offset {
            write!(f, "{offset}")?;
        }
        Ok(())
    }
}

/// When the scheduler fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// `None` runs a single tick immediately.
    pub target: Option<TimeOfDay>,
    pub interval: Duration,
}

/// SMTP connection and envelope settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub sender: String,
}

/// Validated notifier configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    pub db_path: String,
    pub smtp: SmtpSettings,
    pub recipients: Vec<String>,
    pub schedule: Schedule,
    pub horizon_days: u32,
    pub log_level: String,
    pub log_output: LogOutput,
}

/// Configuration error; always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingValue(&'static str),
    InvalidTimeOfDay(String),
    InvalidInterval(i64),
    InvalidHorizon(i64),
    NoRecipients,
    InvalidLogOutput(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingValue(name) => write!(f, "{name} must not be empty"),
            Self::InvalidTimeOfDay(value) => {
                write!(f, "invalid scheduled time `{value}`; expected HH:MM or HH:MM±hh")
            }
            Self::InvalidInterval(hours) => {
                write!(
                    f,
                    "invalid schedule interval {hours}h; must be between 1 and {MAX_SCHEDULED_HOURS}"
                )
            }
            Self::InvalidHorizon(days) => {
                write!(f, "invalid horizon {days}; must be zero or positive")
            }
            Self::NoRecipients => write!(f, "at least one email recipient is required"),
            Self::InvalidLogOutput(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {}

impl NotifierConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let db_path = required(cli.db_conn_string, "DB_CONN_STRING")?;
        let sender = required(cli.email_sender, "EMAIL_SENDER")?;
        let server = required(cli.smtp_server, "SMTP_SERVER")?;
        let recipients = parse_recipients(&cli.email_recipients)?;

        let target = cli
            .scheduled_time
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(TimeOfDay::parse)
            .transpose()?;
        let interval = parse_interval(cli.scheduled_hours)?;
        let horizon_days = u32::try_from(cli.horizon_days)
            .map_err(|_| ConfigError::InvalidHorizon(cli.horizon_days))?;

        let log_output = LogOutput::parse(&cli.log_output).map_err(ConfigError::InvalidLogOutput)?;
        let log_level = cli
            .log_level
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| default_log_level().to_string());

        Ok(Self {
            db_path,
            smtp: SmtpSettings {
                server,
                port: cli.smtp_port,
                username: cli.smtp_username.filter(|value| !value.is_empty()),
                password: cli.smtp_password.filter(|value| !value.is_empty()),
                tls: cli.smtp_tls,
                sender,
            },
            recipients,
            schedule: Schedule { target, interval },
            horizon_days,
            log_level,
            log_output,
        })
    }
}

fn required(value: String, name: &'static str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingValue(name));
    }
    Ok(trimmed.to_string())
}

/// Splits a comma-separated list, dropping blank entries.
pub fn parse_recipients(value: &str) -> Result<Vec<String>, ConfigError> {
    let recipients: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect();
    if recipients.is_empty() {
        return Err(ConfigError::NoRecipients);
    }
    Ok(recipients)
}

fn parse_interval(hours: i64) -> Result<Duration, ConfigError> {
    if !(1..=MAX_SCHEDULED_HOURS).contains(&hours) {
        return Err(ConfigError::InvalidInterval(hours));
    }
    let whole_hours = u64::try_from(hours).map_err(|_| ConfigError::InvalidInterval(hours))?;
    let seconds = whole_hours
        .checked_mul(SECONDS_PER_HOUR)
        .ok_or(ConfigError::InvalidInterval(hours))?;
    Ok(Duration::from_secs(seconds))
}
