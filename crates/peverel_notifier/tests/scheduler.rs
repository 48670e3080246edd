use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peverel_core::{
    FixedClock, Group, GroupId, GroupSelector, MemoryTaskStore, RepoError, RepoResult, Task,
    TaskFields, TaskId, TaskStore,
};
use peverel_notifier::{
    DigestDispatcher, DigestScheduler, DispatchError, Schedule, TickOutcome, TimeOfDay,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const NOW: &str = "2025-03-10T20:00:00+01:00";
const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone)]
struct SentDigest {
    recipients: Vec<String>,
    subject: String,
    body: String,
}

#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<SentDigest>>,
    fail: bool,
}

impl RecordingDispatcher {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<SentDigest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DigestDispatcher for RecordingDispatcher {
    async fn send_digest(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push(SentDigest {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        if self.fail {
            return Err(DispatchError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Store whose every read fails, as if the database went away.
struct BrokenStore;

impl TaskStore for BrokenStore {
    fn add_task(&self, _: &TaskFields, _: DateTime<Utc>) -> RepoResult<TaskId> {
        Err(RepoError::LockPoisoned)
    }
    fn add_group(&self, _: &str) -> RepoResult<GroupId> {
        Err(RepoError::LockPoisoned)
    }
    fn complete_task(&self, _: TaskId, _: DateTime<Utc>) -> RepoResult<()> {
        Err(RepoError::LockPoisoned)
    }
    fn update_task(&self, _: TaskId, _: &TaskFields) -> RepoResult<()> {
        Err(RepoError::LockPoisoned)
    }
    fn delete_task(&self, _: TaskId) -> RepoResult<()> {
        Err(RepoError::LockPoisoned)
    }
    fn delete_group(&self, _: GroupId) -> RepoResult<usize> {
        Err(RepoError::LockPoisoned)
    }
    fn set_task_group(&self, _: TaskId, _: Option<GroupId>) -> RepoResult<()> {
        Err(RepoError::LockPoisoned)
    }
    fn get_task(&self, _: TaskId) -> RepoResult<Option<Task>> {
        Err(RepoError::LockPoisoned)
    }
    fn get_group(&self, _: GroupId) -> RepoResult<Option<Group>> {
        Err(RepoError::LockPoisoned)
    }
    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        Err(RepoError::LockPoisoned)
    }
    fn list_tasks(&self, _: GroupSelector) -> RepoResult<Vec<Task>> {
        Err(RepoError::LockPoisoned)
    }
    fn group_name_for_task(&self, _: TaskId) -> RepoResult<Option<String>> {
        Err(RepoError::LockPoisoned)
    }
}

/// Memory store that deletes one task right after every listing, as a
/// concurrent writer would between the query and the group lookups.
struct VanishingStore {
    inner: MemoryTaskStore,
    vanishing: TaskId,
}

impl TaskStore for VanishingStore {
    fn add_task(&self, fields: &TaskFields, completed_at: DateTime<Utc>) -> RepoResult<TaskId> {
        self.inner.add_task(fields, completed_at)
    }
    fn add_group(&self, name: &str) -> RepoResult<GroupId> {
        self.inner.add_group(name)
    }
    fn complete_task(&self, id: TaskId, completed_at: DateTime<Utc>) -> RepoResult<()> {
        self.inner.complete_task(id, completed_at)
    }
    fn update_task(&self, id: TaskId, fields: &TaskFields) -> RepoResult<()> {
        self.inner.update_task(id, fields)
    }
    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        self.inner.delete_task(id)
    }
    fn delete_group(&self, id: GroupId) -> RepoResult<usize> {
        self.inner.delete_group(id)
    }
    fn set_task_group(&self, id: TaskId, group: Option<GroupId>) -> RepoResult<()> {
        self.inner.set_task_group(id, group)
    }
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        self.inner.get_task(id)
    }
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        self.inner.get_group(id)
    }
    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        self.inner.list_groups()
    }
    fn list_tasks(&self, selector: GroupSelector) -> RepoResult<Vec<Task>> {
        let tasks = self.inner.list_tasks(selector)?;
        match self.inner.delete_task(self.vanishing) {
            Ok(()) | Err(RepoError::NotFound(_)) => Ok(tasks),
            Err(err) => Err(err),
        }
    }
    fn group_name_for_task(&self, id: TaskId) -> RepoResult<Option<String>> {
        self.inner.group_name_for_task(id)
    }
}

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

fn clock() -> FixedClock {
    FixedClock::parse(NOW).unwrap()
}

fn recipients() -> Vec<String> {
    vec!["home@example.com".to_string()]
}

/// Two overdue tasks (one grouped) and one task due next week.
fn store_with_overdue_tasks() -> Arc<MemoryTaskStore> {
    let store = Arc::new(MemoryTaskStore::new());
    let kitchen = store.add_group("Kitchen").unwrap();
    let oven = store
        .add_task(&TaskFields::new("Clean oven", "", 7), at("2025-02-28T10:00:00Z"))
        .unwrap();
    store.set_task_group(oven, Some(kitchen)).unwrap();
    store
        .add_task(&TaskFields::new("Water plants", "", 3), at("2025-03-05T10:00:00Z"))
        .unwrap();
    store
        .add_task(&TaskFields::new("Defrost freezer", "", 10), at("2025-03-09T10:00:00Z"))
        .unwrap();
    store
}

fn one_shot() -> Schedule {
    Schedule {
        target: None,
        interval: DAY,
    }
}

/// Daily schedule whose first tick is one hour after `NOW`.
fn daily_in_one_hour() -> Schedule {
    Schedule {
        target: Some(TimeOfDay::parse("21:00").unwrap()),
        interval: DAY,
    }
}

#[tokio::test]
async fn tick_sends_overdue_digest() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = DigestScheduler::new(
        store_with_overdue_tasks(),
        clock(),
        dispatcher.clone(),
        recipients(),
        one_shot(),
    );

    assert_eq!(scheduler.tick().await, TickOutcome::Sent { count: 2 });

    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipients, recipients());
    assert_eq!(sent[0].subject, "Peverel has something for you: 2 overdue task(s)");
    assert!(sent[0].body.contains("Clean oven"));
    assert!(sent[0].body.contains("Water plants"));
    assert!(!sent[0].body.contains("Defrost freezer"));
}

#[tokio::test]
async fn empty_overdue_set_never_dispatches() {
    let store = Arc::new(MemoryTaskStore::new());
    store
        .add_task(&TaskFields::new("Defrost freezer", "", 30), at("2025-03-09T10:00:00Z"))
        .unwrap();
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler =
        DigestScheduler::new(store, clock(), dispatcher.clone(), recipients(), one_shot());

    assert_eq!(scheduler.tick().await, TickOutcome::NothingDue);
    scheduler.run(CancellationToken::new()).await;
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn store_failure_counts_as_nothing_sent() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = DigestScheduler::new(
        BrokenStore,
        clock(),
        dispatcher.clone(),
        recipients(),
        one_shot(),
    );

    assert_eq!(scheduler.tick().await, TickOutcome::QueryFailed);
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn task_deleted_during_tick_is_left_out_of_the_digest() {
    let inner = MemoryTaskStore::new();
    let kitchen = inner.add_group("Kitchen").unwrap();
    let oven = inner
        .add_task(&TaskFields::new("Clean oven", "", 7), at("2025-02-28T10:00:00Z"))
        .unwrap();
    inner.set_task_group(oven, Some(kitchen)).unwrap();
    inner
        .add_task(&TaskFields::new("Water plants", "", 3), at("2025-03-05T10:00:00Z"))
        .unwrap();
    let store = VanishingStore {
        inner,
        vanishing: oven,
    };
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler =
        DigestScheduler::new(store, clock(), dispatcher.clone(), recipients(), one_shot());

    assert_eq!(scheduler.tick().await, TickOutcome::Sent { count: 1 });

    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Peverel has something for you: 1 overdue task(s)");
    assert!(sent[0].body.contains("Water plants"));
    assert!(!sent[0].body.contains("Clean oven"));
}

#[tokio::test]
async fn only_deleted_overdue_task_means_nothing_due() {
    let inner = MemoryTaskStore::new();
    let oven = inner
        .add_task(&TaskFields::new("Clean oven", "", 7), at("2025-02-28T10:00:00Z"))
        .unwrap();
    let store = VanishingStore {
        inner,
        vanishing: oven,
    };
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler =
        DigestScheduler::new(store, clock(), dispatcher.clone(), recipients(), one_shot());

    assert_eq!(scheduler.tick().await, TickOutcome::NothingDue);
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn horizon_adds_upcoming_section_without_changing_count() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = DigestScheduler::new(
        store_with_overdue_tasks(),
        clock(),
        dispatcher.clone(),
        recipients(),
        one_shot(),
    )
    .with_horizon_days(14);

    assert_eq!(scheduler.tick().await, TickOutcome::Sent { count: 2 });
    let body = &dispatcher.sent()[0].body;
    assert!(body.contains("Coming up"));
    assert!(body.contains("Defrost freezer"));
}

#[tokio::test]
async fn one_shot_run_ticks_once_and_returns() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = DigestScheduler::new(
        store_with_overdue_tasks(),
        clock(),
        dispatcher.clone(),
        recipients(),
        one_shot(),
    );

    scheduler.run(CancellationToken::new()).await;
    assert_eq!(dispatcher.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn scheduled_run_fires_at_target_then_every_interval() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = DigestScheduler::new(
        store_with_overdue_tasks(),
        clock(),
        dispatcher.clone(),
        recipients(),
        daily_in_one_hour(),
    );
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { scheduler.run(run_cancel).await });

    tokio::time::sleep(HOUR - Duration::from_secs(1)).await;
    assert!(dispatcher.sent().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(dispatcher.sent().len(), 1);

    tokio::time::sleep(DAY).await;
    assert_eq!(dispatcher.sent().len(), 2);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dispatcher.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn dispatch_failure_does_not_stop_the_loop() {
    let dispatcher = Arc::new(RecordingDispatcher::failing());
    let scheduler = DigestScheduler::new(
        store_with_overdue_tasks(),
        clock(),
        dispatcher.clone(),
        recipients(),
        daily_in_one_hour(),
    );
    assert_eq!(scheduler.tick().await, TickOutcome::DispatchFailed);

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { scheduler.run(run_cancel).await });

    tokio::time::sleep(HOUR + DAY + Duration::from_secs(1)).await;
    // One direct tick plus two scheduled attempts.
    assert_eq!(dispatcher.sent().len(), 3);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unrepresentable_next_deadline_stops_after_first_tick() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = DigestScheduler::new(
        store_with_overdue_tasks(),
        clock(),
        dispatcher.clone(),
        recipients(),
        Schedule {
            target: Some(TimeOfDay::parse("21:00").unwrap()),
            interval: Duration::MAX,
        },
    );
    let handle = tokio::spawn(async move { scheduler.run(CancellationToken::new()).await });

    tokio::time::sleep(HOUR + Duration::from_secs(1)).await;
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dispatcher.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_wait_without_ticking() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = DigestScheduler::new(
        store_with_overdue_tasks(),
        clock(),
        dispatcher.clone(),
        recipients(),
        daily_in_one_hour(),
    );
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { scheduler.run(run_cancel).await });

    tokio::time::sleep(Duration::from_secs(60)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn already_cancelled_one_shot_does_nothing() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = DigestScheduler::new(
        store_with_overdue_tasks(),
        clock(),
        dispatcher.clone(),
        recipients(),
        one_shot(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    scheduler.run(cancel).await;
    assert!(dispatcher.sent().is_empty());
}
