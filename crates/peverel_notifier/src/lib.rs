//! Scheduled email digests of overdue chores.
//!
//! Reads tasks through `peverel_core`, renders a digest and mails it on a
//! daily (or custom) schedule.

pub mod config;
pub mod digest;
pub mod dispatch;
pub mod schedule;

pub use config::{
    Cli, ConfigError, NotifierConfig, Schedule, SmtpSettings, TimeOfDay, MAX_SCHEDULED_HOURS,
};
pub use digest::{Digest, DigestEntry, DigestSection, RenderError, RenderedDigest, NO_GROUP};
pub use dispatch::{DigestDispatcher, DispatchError, SmtpDispatcher};
pub use schedule::{initial_wait, DigestScheduler, TickOutcome};
