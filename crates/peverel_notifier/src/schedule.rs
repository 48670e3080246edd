//! Notification scheduler.
//!
//! # Responsibility
//! - Arm a timer for the next target time of day, then repeat on a fixed
//!   interval.
//! - On every tick, query overdue tasks and hand a rendered digest to the
//!   dispatcher.
//!
//! # Invariants
//! - Ticks are strictly serialized; a slow tick delays the next one.
//! - An empty overdue set never reaches the dispatcher.
//! - Store, render and dispatch failures are logged and never stop the loop.
//! - Cancellation only interrupts the timed wait, never a running tick.

use crate::config::{Schedule, TimeOfDay};
use crate::digest::{Digest, DigestEntry};
use crate::dispatch::DigestDispatcher;
use chrono::{DateTime, FixedOffset};
use log::{debug, error, info, warn};
use peverel_core::{
    Clock, DueTask, GroupSelector, RepoResult, TaskQuery, TaskQueryService, TaskStore,
};
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NothingDue,
    Sent { count: usize },
    QueryFailed,
    RenderFailed,
    DispatchFailed,
}

impl Display for TickOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NothingDue => write!(f, "nothing_due"),
            Self::Sent { count } => write!(f, "sent count={count}"),
            Self::QueryFailed => write!(f, "query_failed"),
            Self::RenderFailed => write!(f, "render_failed"),
            Self::DispatchFailed => write!(f, "dispatch_failed"),
        }
    }
}

/// Delay from `now` until the first tick.
///
/// The target is taken on today's date in the target's offset (or `now`'s
/// offset when unpinned). A target already in the past is pushed forward by
/// whole `interval`s until the wait is non-negative.
pub fn initial_wait(
    now: DateTime<FixedOffset>,
    target: &TimeOfDay,
    interval: Duration,
) -> Duration {
    let offset = target.offset.unwrap_or(*now.offset());
    let local_now = now.with_timezone(&offset).naive_local();
    let target_at = local_now.date().and_time(target.time);

    let wait_ms = (target_at - local_now).num_milliseconds();
    if wait_ms >= 0 {
        return Duration::from_millis(wait_ms.unsigned_abs());
    }

    let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
    if interval_ms <= 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(wait_ms.rem_euclid(interval_ms).unsigned_abs())
}

/// Periodically emails a digest of overdue tasks.
pub struct DigestScheduler<S: TaskStore, C: Clock, D: DigestDispatcher> {
    store: S,
    clock: C,
    dispatcher: D,
    recipients: Vec<String>,
    schedule: Schedule,
    horizon_days: u32,
}

impl<S: TaskStore, C: Clock, D: DigestDispatcher> DigestScheduler<S, C, D> {
    pub fn new(
        store: S,
        clock: C,
        dispatcher: D,
        recipients: Vec<String>,
        schedule: Schedule,
    ) -> Self {
        Self {
            store,
            clock,
            dispatcher,
            recipients,
            schedule,
            horizon_days: 0,
        }
    }

    /// Also list tasks due within `days` in a "coming up" section.
    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    /// Runs until `cancel` fires, or a single tick when no target time is set.
    pub async fn run(&self, cancel: CancellationToken) {
        let Some(target) = self.schedule.target else {
            info!("event=scheduler_start module=schedule status=ok mode=one_shot");
            if !cancel.is_cancelled() {
                self.tick().await;
            }
            return;
        };

        let interval = self.schedule.interval;
        let wait = initial_wait(self.clock.now(), &target, interval);
        info!(
            "event=scheduler_start module=schedule status=ok target={} interval_secs={} first_wait_secs={}",
            target,
            interval.as_secs(),
            wait.as_secs()
        );

        let mut deadline = Instant::now() + wait;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("event=scheduler_stop module=schedule status=ok reason=cancelled");
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }

            self.tick().await;
            let Some(next) = deadline.checked_add(interval) else {
                error!(
                    "event=scheduler_stop module=schedule status=error reason=deadline_overflow interval_secs={}",
                    interval.as_secs()
                );
                break;
            };
            deadline = next;
            debug!(
                "event=scheduler_armed module=schedule status=ok wait_secs={}",
                deadline.saturating_duration_since(Instant::now()).as_secs()
            );
        }
    }

    /// Queries overdue tasks and dispatches a digest if there are any.
    pub async fn tick(&self) -> TickOutcome {
        let digest = match self.collect_digest() {
            Ok(digest) => digest,
            Err(err) => {
                error!("event=digest_query module=schedule status=error error={err}");
                return TickOutcome::QueryFailed;
            }
        };

        if digest.is_empty() {
            info!("event=digest_skip module=schedule status=ok reason=nothing_due");
            return TickOutcome::NothingDue;
        }

        let rendered = match digest.render() {
            Ok(rendered) => rendered,
            Err(err) => {
                error!("event=digest_render module=schedule status=error error={err}");
                return TickOutcome::RenderFailed;
            }
        };

        match self
            .dispatcher
            .send_digest(&self.recipients, &rendered.subject, &rendered.body)
            .await
        {
            Ok(()) => {
                info!(
                    "event=digest_sent module=schedule status=ok overdue={}",
                    digest.overdue_count
                );
                TickOutcome::Sent {
                    count: digest.overdue_count,
                }
            }
            Err(err) => {
                warn!("event=digest_sent module=schedule status=error error={err}");
                TickOutcome::DispatchFailed
            }
        }
    }

    fn collect_digest(&self) -> RepoResult<Digest> {
        let queries = TaskQueryService::new(&self.store, &self.clock);

        let overdue = queries.query(&TaskQuery::overdue())?;
        if overdue.is_empty() {
            return Ok(Digest::build(Vec::new(), Vec::new()));
        }

        let upcoming: Vec<DueTask> = if self.horizon_days > 0 {
            queries
                .query(&TaskQuery {
                    group: GroupSelector::All,
                    horizon_days: Some(i64::from(self.horizon_days)),
                    include_not_yet_due: true,
                })?
                .into_iter()
                .filter(|item| item.due.days_offset > 0)
                .collect()
        } else {
            Vec::new()
        };

        Ok(Digest::build(self.entries(&overdue)?, self.entries(&upcoming)?))
    }

    /// Resolves group names. Tasks deleted since the query are dropped; only
    /// store failures fail the tick.
    fn entries(&self, items: &[DueTask]) -> RepoResult<Vec<DigestEntry>> {
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match self.store.group_name_for_task(item.task.id) {
                Ok(group) => entries.push(DigestEntry::new(item, group)),
                Err(err) if err.is_store_failure() => return Err(err),
                Err(err) => debug!(
                    "event=digest_entry module=schedule status=skip task_id={} error={}",
                    item.task.id, err
                ),
            }
        }
        Ok(entries)
    }
}
