use crate::error::{Error, TaskError};
use crate::registry::TaskUpdate;
use crate::service::test_helpers::{Script, create_test_service, wait_for_terminal};
use crate::types::{FailureKind, TaskId, TaskStatus};
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn status_of_unknown_task_is_not_found() {
    let (service, _engine, _temp) = create_test_service(Script::complete("clip.mp4")).await;

    let err = service.status(TaskId::new()).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::NotFound { .. })));
}

#[tokio::test]
async fn list_returns_every_submission() {
    let (service, _engine, _temp) = create_test_service(Script::complete("clip.mp4")).await;

    let a = service.submit("https://example.test/a", "best").await.unwrap();
    let b = service.submit("https://example.test/b", "best").await.unwrap();
    wait_for_terminal(&service, a).await;
    wait_for_terminal(&service, b).await;

    let ids: Vec<TaskId> = service.list().await.into_iter().map(|t| t.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&a) && ids.contains(&b));
}

#[tokio::test]
async fn cancel_rejects_unknown_and_finished_tasks() {
    let (service, _engine, _temp) = create_test_service(Script::complete("clip.mp4")).await;

    let err = service.cancel(TaskId::new()).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::NotFound { .. })));

    let id = service.submit("https://example.test/a", "best").await.unwrap();
    wait_for_terminal(&service, id).await;

    let err = service.cancel(id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Task(TaskError::AlreadyFinished {
            status: TaskStatus::Completed,
            ..
        })
    ));
}

#[tokio::test]
async fn open_file_streams_completed_artifact_under_lease() {
    let (service, _engine, _temp) = create_test_service(Script::complete("clip.mp4")).await;

    let id = service.submit("https://example.test/a", "best").await.unwrap();
    wait_for_terminal(&service, id).await;

    let mut file = service.open_file(id).await.unwrap();
    assert_eq!(file.filename, "clip.mp4");
    assert_eq!(file.len, b"fake media payload".len() as u64);
    assert_eq!(service.storage().active_leases(id), 1);

    let mut body = Vec::new();
    file.file.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"fake media payload");

    drop(file);
    assert_eq!(service.storage().active_leases(id), 0);
}

#[tokio::test]
async fn open_file_on_unfinished_task_is_not_ready() {
    let (service, _engine, _temp) = create_test_service(Script::Hang).await;

    let id = service.submit("https://example.test/a", "best").await.unwrap();
    let err = service.open_file(id).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::NotReady { .. })));

    service.cancel(id).await.unwrap();
    let task = wait_for_terminal(&service, id).await;
    assert_eq!(task.failure_kind, Some(FailureKind::Cancelled));

    let err = service.open_file(id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Task(TaskError::NotReady {
            status: TaskStatus::Failed,
            ..
        })
    ));
}

#[tokio::test]
async fn open_file_reports_missing_and_reclaimed_artifacts() {
    let (service, _engine, _temp) = create_test_service(Script::complete("clip.mp4")).await;

    let id = service.submit("https://example.test/a", "best").await.unwrap();
    let task = wait_for_terminal(&service, id).await;

    std::fs::remove_file(task.filepath.unwrap()).unwrap();
    let err = service.open_file(id).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::FileUnavailable { .. })));
    assert_eq!(service.storage().active_leases(id), 0);

    service.storage().cleanup(id).await;
    service.registry.mark_reclaimed(id).await;
    let err = service.open_file(id).await.unwrap_err();
    match err {
        Error::Task(TaskError::FileUnavailable { reason, .. }) => assert!(reason.contains("expired")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn cancel_without_job_keeps_a_completed_task() {
    let (service, _engine, _temp) = create_test_service(Script::complete("clip.mp4")).await;
    let mut events = service.subscribe();

    // A record whose job already finished and left the active set
    let id = service.registry.create("https://example.test/a", "best").await;
    service.registry.apply(id, TaskUpdate::Processing).await;
    service
        .registry
        .apply(
            id,
            TaskUpdate::Completed {
                filename: "clip.mp4".into(),
                filepath: std::path::PathBuf::from("/nonexistent/clip.mp4"),
            },
        )
        .await;

    let err = service.cancel_detached(id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Task(TaskError::AlreadyFinished {
            status: TaskStatus::Completed,
            ..
        })
    ));
    assert_eq!(service.status(id).await.unwrap().status, TaskStatus::Completed);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn cancel_without_job_fails_a_pending_task() {
    let (service, _engine, _temp) = create_test_service(Script::complete("clip.mp4")).await;

    let id = service.registry.create("https://example.test/a", "best").await;
    service.cancel(id).await.unwrap();

    let task = service.status(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.failure_kind, Some(FailureKind::Cancelled));
}
