mod support;

use std::collections::HashSet;

use tasklens::error::Error;
use tasklens::storage::TaskStore;
use tasklens::task::{NewTask, SortOrder, TaskFilter, TaskPriority, TaskStatus, TaskUpdate};

use support::{days_ago, days_ahead, TestEnv};

#[test]
fn empty_filter_returns_every_task() {
    let env = TestEnv::new();
    let store = env.store();
    for idx in 0..5 {
        env.add(NewTask::new(format!("task {idx}"), days_ahead(idx)));
    }

    let all = store.list(&TaskFilter::default()).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all.len(), store.export_all().unwrap().len());
}

#[test]
fn raw_filters_are_anded_and_unknown_values_ignored() {
    let env = TestEnv::new();
    let store = env.store();
    env.add(NewTask::new("a", days_ahead(1)).with_priority(TaskPriority::High));
    env.add(
        NewTask::new("b", days_ahead(1))
            .with_priority(TaskPriority::High)
            .with_status(TaskStatus::Done),
    );
    env.add(NewTask::new("c", days_ahead(1)).with_priority(TaskPriority::Low));

    let high_pending = store
        .list(&TaskFilter::from_raw(Some("pending"), Some("high"), None, None))
        .unwrap();
    assert_eq!(high_pending.len(), 1);
    assert_eq!(high_pending[0].title, "a");

    let ignored = store
        .list(&TaskFilter::from_raw(Some("someday"), Some("urgent"), Some(""), Some("sideways")))
        .unwrap();
    assert_eq!(ignored.len(), 3);

    let by_title = store
        .list(&TaskFilter::from_raw(None, None, Some("c"), None))
        .unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].priority, TaskPriority::Low);
}

#[test]
fn sort_by_due_date_applies_after_filtering() {
    let env = TestEnv::new();
    let store = env.store();
    env.add(NewTask::new("late", days_ahead(9)));
    env.add(NewTask::new("early", days_ahead(1)));
    env.add(NewTask::new("middle", days_ahead(4)));
    env.add(NewTask::new("done", days_ahead(2)).with_status(TaskStatus::Done));

    let filter = TaskFilter {
        status: Some(TaskStatus::Pending),
        sort_by_due: Some(SortOrder::Descending),
        ..TaskFilter::default()
    };
    let titles: Vec<_> = store
        .list(&filter)
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["late", "middle", "early"]);
}

#[test]
fn update_is_visible_and_updated_at_never_decreases() {
    let env = TestEnv::new();
    let store = env.store();
    let id = env.add(NewTask::new("draft", days_ahead(3)));
    let before = store.list(&TaskFilter::default()).unwrap().remove(0);

    let updated = store
        .update(
            id,
            &TaskUpdate {
                title: Some("final".to_string()),
                status: Some(TaskStatus::InProgress),
                ..TaskUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "final");
    assert_eq!(updated.status, TaskStatus::InProgress);
    assert_eq!(updated.priority, before.priority);
    assert!(updated.updated_at >= before.updated_at);
    assert_eq!(updated.created_at, before.created_at);

    let listed = store.list(&TaskFilter::default()).unwrap().remove(0);
    assert_eq!(listed, updated);
}

#[test]
fn update_and_delete_of_missing_task_are_not_found() {
    let env = TestEnv::new();
    let store = env.store();
    let update = TaskUpdate {
        title: Some("x".to_string()),
        ..TaskUpdate::default()
    };
    assert!(matches!(store.update(404, &update), Err(Error::NotFound(404))));
    assert!(matches!(store.delete(404), Err(Error::NotFound(404))));
}

#[test]
fn delete_stale_only_removes_overdue_unfinished_tasks() {
    let env = TestEnv::new();
    let store = env.store();
    env.add(NewTask::new("overdue pending", days_ago(10)));
    env.add(NewTask::new("overdue in progress", days_ago(8)).with_status(TaskStatus::InProgress));
    env.add(NewTask::new("overdue done", days_ago(30)).with_status(TaskStatus::Done));
    env.add(NewTask::new("recently due", days_ago(2)));
    env.add(NewTask::new("upcoming", days_ahead(2)));

    assert_eq!(store.delete_stale().unwrap(), 2);
    assert_eq!(store.delete_stale().unwrap(), 0);

    let remaining: HashSet<_> = store
        .list(&TaskFilter::default())
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    let expected: HashSet<_> = ["overdue done", "recently due", "upcoming"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(remaining, expected);
}

#[test]
fn import_then_export_contains_the_batch() {
    let env = TestEnv::new();
    let store = env.store();
    env.add(NewTask::new("existing", days_ahead(1)));

    let batch = vec![
        NewTask::new("one", days_ahead(1)).with_description("first"),
        NewTask::new("two", days_ago(1)).with_status(TaskStatus::Done),
        NewTask::new("three", days_ahead(5)).with_priority(TaskPriority::High),
    ];
    let ids = store.import_batch(&batch).unwrap();
    assert_eq!(ids.len(), 3);

    let exported = store.export_all().unwrap();
    assert_eq!(exported.len(), 4);
    for (id, task) in ids.iter().zip(&batch) {
        let found = exported.iter().find(|row| row.id == *id).expect("imported row");
        assert_eq!(found.title, task.title);
        assert_eq!(found.status, task.status);
        assert_eq!(found.priority, task.priority);
        assert_eq!(found.description, task.description);
    }
}

#[test]
fn failing_import_leaves_nothing_behind() {
    let env = TestEnv::new();
    let store = env.store();
    env.add(NewTask::new("existing", days_ahead(1)));

    let batch = vec![
        NewTask::new("fine", days_ahead(1)),
        NewTask::new("also fine", days_ahead(2)),
        NewTask::new("  ", days_ahead(3)),
        NewTask::new("never reached", days_ahead(4)),
    ];
    match store.import_batch(&batch) {
        Err(Error::ImportFailure { index, .. }) => assert_eq!(index, 2),
        other => panic!("unexpected result: {other:?}"),
    }

    let titles: Vec<_> = store
        .export_all()
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["existing"]);
}

#[test]
fn export_is_readable_as_import_input() {
    let env = TestEnv::new();
    let store = env.store();
    env.add(NewTask::new("round trip", days_ahead(2)).with_priority(TaskPriority::Low));

    let raw = serde_json::to_string(&store.export_all().unwrap()).unwrap();
    let parsed: Vec<NewTask> = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].title, "round trip");
    assert_eq!(parsed[0].priority, TaskPriority::Low);
}

#[test]
fn store_rejects_blank_titles_as_validation() {
    let env = TestEnv::new();
    let store = env.store();
    let id = env.add(NewTask::new("kept", days_ahead(1)));

    assert!(matches!(store.create(&NewTask::new("  ", days_ahead(1))), Err(Error::Validation(_))));

    let blank = TaskUpdate {
        title: Some(String::new()),
        ..TaskUpdate::default()
    };
    assert!(matches!(store.update(id, &blank), Err(Error::Validation(_))));
    assert!(matches!(store.update(id, &TaskUpdate::default()), Err(Error::Validation(_))));
    assert_eq!(store.list(&TaskFilter::default()).unwrap()[0].title, "kept");
}
