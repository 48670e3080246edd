use chrono::Utc;
use peverel_core::{
    EntityRef, GroupSelector, MemoryTaskStore, RelationService, RepoError, SqliteTaskStore,
    SystemClock, TaskFields, TaskId, TaskQuery, TaskQueryService, TaskStore,
};

fn add_tasks(store: &dyn TaskStore, names: &[&str]) -> Vec<TaskId> {
    names
        .iter()
        .map(|name| {
            store
                .add_task(&TaskFields::new(*name, "", 7), Utc::now())
                .unwrap()
        })
        .collect()
}

fn group_of(store: &dyn TaskStore, id: TaskId) -> Option<i64> {
    store.get_task(id).unwrap().unwrap().group_id
}

#[test]
fn assign_overwrites_previous_group() {
    let store = SqliteTaskStore::open_in_memory().unwrap();
    let tasks = add_tasks(&store, &["Mow lawn", "Trim hedge"]);
    let garden = store.add_group("Garden").unwrap();
    let outside = store.add_group("Outside").unwrap();
    let relations = RelationService::new(&store);

    relations.assign(garden, &tasks).unwrap();
    assert_eq!(group_of(&store, tasks[0]), Some(garden));

    relations.assign(outside, &tasks[..1]).unwrap();
    assert_eq!(group_of(&store, tasks[0]), Some(outside));
    assert_eq!(group_of(&store, tasks[1]), Some(garden));
}

#[test]
fn assign_to_unknown_group_changes_nothing() {
    let store = MemoryTaskStore::new();
    let tasks = add_tasks(&store, &["Dust shelves"]);
    let relations = RelationService::new(&store);

    let err = relations.assign(404, &tasks).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(EntityRef::Group(404))));
    assert_eq!(group_of(&store, tasks[0]), None);
}

#[test]
fn assign_stops_at_first_unknown_task_keeping_earlier_ones() {
    let store = SqliteTaskStore::open_in_memory().unwrap();
    let tasks = add_tasks(&store, &["Sweep", "Mop", "Polish"]);
    let hall = store.add_group("Hall").unwrap();
    let relations = RelationService::new(&store);

    let missing = tasks[2] + 100;
    let err = relations
        .assign(hall, &[tasks[0], missing, tasks[1]])
        .unwrap_err();

    assert!(matches!(err, RepoError::NotFound(EntityRef::Task(id)) if id == missing));
    assert_eq!(group_of(&store, tasks[0]), Some(hall));
    assert_eq!(group_of(&store, tasks[1]), None);
}

#[test]
fn assign_with_empty_id_list_is_a_no_op() {
    let store = MemoryTaskStore::new();
    let group = store.add_group("Empty").unwrap();
    RelationService::new(&store).assign(group, &[]).unwrap();
    assert!(store
        .list_tasks(GroupSelector::Group(group))
        .unwrap()
        .is_empty());
}

#[test]
fn unassign_is_idempotent_and_rejects_unknown_task() {
    let store = MemoryTaskStore::new();
    let tasks = add_tasks(&store, &["Clean gutters"]);
    let roof = store.add_group("Roof").unwrap();
    let relations = RelationService::new(&store);

    relations.assign(roof, &tasks).unwrap();
    relations.unassign(tasks[0]).unwrap();
    relations.unassign(tasks[0]).unwrap();
    assert_eq!(group_of(&store, tasks[0]), None);

    assert!(matches!(
        relations.unassign(tasks[0] + 1).unwrap_err(),
        RepoError::NotFound(EntityRef::Task(_))
    ));
}

#[test]
fn delete_group_reports_unassigned_count_and_keeps_tasks() {
    let store = SqliteTaskStore::open_in_memory().unwrap();
    let tasks = add_tasks(&store, &["Change sheets", "Air mattress", "Fold laundry"]);
    let bedroom = store.add_group("Bedroom").unwrap();
    let relations = RelationService::new(&store);
    relations.assign(bedroom, &tasks[..2]).unwrap();

    assert_eq!(relations.delete_group(bedroom).unwrap(), 2);
    assert!(store.get_group(bedroom).unwrap().is_none());

    let queries = TaskQueryService::new(&store, SystemClock);
    let in_bedroom = queries
        .query(&TaskQuery::all().in_group(GroupSelector::Group(bedroom)))
        .unwrap();
    assert!(in_bedroom.is_empty());
    let mut unassigned: Vec<TaskId> = queries
        .query(&TaskQuery::all().in_group(GroupSelector::Unassigned))
        .unwrap()
        .into_iter()
        .map(|item| item.task.id)
        .collect();
    unassigned.sort_unstable();
    assert_eq!(unassigned, tasks);

    assert!(matches!(
        relations.delete_group(bedroom).unwrap_err(),
        RepoError::NotFound(EntityRef::Group(_))
    ));
}

#[test]
fn delete_task_removes_task_and_its_relation() {
    let store = MemoryTaskStore::new();
    let tasks = add_tasks(&store, &["Descale kettle", "Clean sink"]);
    let kitchen = store.add_group("Kitchen").unwrap();
    let relations = RelationService::new(&store);
    relations.assign(kitchen, &tasks).unwrap();

    relations.delete_task(tasks[0]).unwrap();

    assert!(store.get_task(tasks[0]).unwrap().is_none());
    let remaining: Vec<_> = store
        .list_tasks(GroupSelector::Group(kitchen))
        .unwrap()
        .into_iter()
        .map(|task| task.id)
        .collect();
    assert_eq!(remaining, vec![tasks[1]]);

    assert!(matches!(
        relations.delete_task(tasks[0]).unwrap_err(),
        RepoError::NotFound(EntityRef::Task(_))
    ));
}
