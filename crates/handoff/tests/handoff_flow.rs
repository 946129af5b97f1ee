//! End-to-end tests for [`JobCoordinator`]: staging, launch, status watch
//! and every terminal outcome.

#![cfg(target_os = "linux")]

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{config_in, dir_names, png_input, read_status, write_png, FakeWorker, WorkerScript};
use mixbuild_core::probe::{image_dimensions, probe_face_image};
use mixbuild_core::{Face, FailureReason, JobOutcome, StatusRecord};
use mixbuild_handoff::{JobCoordinator, JobEvent, JobState};
use tokio::sync::broadcast;

const STAGED: [&str; 6] = ["-1.png", "0.png", "180.png", "270.png", "90.png", "status.json"];

fn completes_after(ms: u64) -> WorkerScript {
    WorkerScript::Complete {
        delay: Duration::from_millis(ms),
        result_path: "/out/model.obj".into(),
    }
}

async fn wait_for_waiting(events: &mut broadcast::Receiver<JobEvent>) {
    loop {
        match events.recv().await.expect("event stream open") {
            JobEvent::StateChanged {
                state: JobState::Waiting,
                ..
            } => return,
            JobEvent::Completed { outcome, .. } => panic!("completed early: {outcome}"),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Success
// ---------------------------------------------------------------------------

#[tokio::test]
async fn worker_completion_yields_success() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    let worker = FakeWorker::new(&config, completes_after(100));
    let launches = worker.launch_counter();
    let coord = JobCoordinator::with_launcher(&config, worker);

    let ticket = coord.submit(png_input(dir.path(), 8, 8)).expect("submit");
    let outcome = ticket.outcome().await;

    assert_eq!(outcome, JobOutcome::success("/out/model.obj"));
    assert_eq!(coord.state(), JobState::Completed { outcome });
    assert_eq!(launches.load(Ordering::SeqCst), 1);
    assert_eq!(dir_names(&config.staging_dir), STAGED);
}

#[tokio::test]
async fn real_process_worker_yields_success() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut config = config_in(dir.path());
    config.worker_program = "/bin/sh".into();
    config.worker_args = vec![
        "-c".into(),
        r#"sleep 0.2; printf '{"done":true,"resultPath":"/out/model.obj"}' > status.json"#.into(),
    ];
    let coord = JobCoordinator::new(&config);

    let ticket = coord
        .submit_with_timeout(png_input(dir.path(), 8, 8), Duration::from_secs(10))
        .expect("submit");

    assert_eq!(ticket.outcome().await, JobOutcome::success("/out/model.obj"));
}

#[tokio::test]
async fn partial_and_pending_writes_are_ignored() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    let worker = FakeWorker::new(
        &config,
        WorkerScript::Writes {
            delay: Duration::from_millis(100),
            contents: vec![
                br#"{"do"#.to_vec(),
                br#"{"done":false,"resultPath":""}"#.to_vec(),
                br#"{"done":true,"resultPath":"/out/first.obj"}"#.to_vec(),
                br#"{"done":true,"resultPath":"/out/second.obj"}"#.to_vec(),
            ],
        },
    );
    let coord = JobCoordinator::with_launcher(&config, worker);
    let mut events = coord.subscribe();

    let ticket = coord.submit(png_input(dir.path(), 8, 8)).expect("submit");
    assert_eq!(ticket.outcome().await, JobOutcome::success("/out/first.obj"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    let completions = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, JobEvent::Completed { .. }))
        .count();
    assert_eq!(completions, 1);
}

// ---------------------------------------------------------------------------
// Validation failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn size_mismatch_fails_without_touching_staging() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    let worker = FakeWorker::new(&config, completes_after(0));
    let launches = worker.launch_counter();
    let coord = JobCoordinator::with_launcher(&config, worker);

    let mut input = png_input(dir.path(), 8, 8);
    let odd = write_png(dir.path(), "odd.png", 8, 9);
    input.set(probe_face_image(Face::Top, &odd).expect("probe"));

    let outcome = coord.submit(input).expect("submit").outcome().await;

    assert_eq!(outcome, JobOutcome::failure(FailureReason::SizeMismatch));
    assert!(!config.staging_dir.exists());
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_face_fails_as_incomplete() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    let coord = JobCoordinator::with_launcher(&config, FakeWorker::new(&config, WorkerScript::Hang));

    let mut input = png_input(dir.path(), 8, 8);
    input.clear(Face::Back);

    let outcome = coord.submit(input).expect("submit").outcome().await;
    assert_eq!(outcome, JobOutcome::failure(FailureReason::IncompleteInput));
    assert!(!config.staging_dir.exists());
}

#[tokio::test]
async fn vanished_source_fails_as_staging_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    let worker = FakeWorker::new(&config, completes_after(0));
    let launches = worker.launch_counter();
    let coord = JobCoordinator::with_launcher(&config, worker);

    let input = png_input(dir.path(), 8, 8);
    std::fs::remove_file(dir.path().join("left.png")).expect("remove source");

    let outcome = coord.submit(input).expect("submit").outcome().await;
    assert_matches!(
        outcome,
        JobOutcome::Failure {
            reason: FailureReason::StagingFailed(_)
        }
    );
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Launch failure and retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn launch_failure_then_retry_overwrites_staged_files() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());

    let refusing = JobCoordinator::with_launcher(&config, FakeWorker::new(&config, WorkerScript::Refuse));
    let outcome = refusing
        .submit(png_input(dir.path(), 8, 8))
        .expect("submit")
        .outcome()
        .await;
    assert_matches!(
        outcome,
        JobOutcome::Failure {
            reason: FailureReason::LaunchFailed(_)
        }
    );
    assert_eq!(dir_names(&config.staging_dir), STAGED);
    assert_eq!(read_status(&config.status_path()), StatusRecord::pending());

    let retry = JobCoordinator::with_launcher(&config, FakeWorker::new(&config, completes_after(50)));
    let outcome = retry
        .submit(png_input(dir.path(), 16, 12))
        .expect("resubmit")
        .outcome()
        .await;

    assert!(outcome.is_success());
    assert_eq!(dir_names(&config.staging_dir), STAGED);
    let front = config.staging_dir.join(Face::Front.staged_file_name("png"));
    assert_eq!(image_dimensions(&front).expect("probe staged"), (16, 12));
}

#[tokio::test]
async fn missing_worker_binary_fails_launch() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut config = config_in(dir.path());
    config.worker_program = dir.path().join("no-such-worker");
    let coord = JobCoordinator::new(&config);

    let outcome = coord
        .submit(png_input(dir.path(), 8, 8))
        .expect("submit")
        .outcome()
        .await;
    assert_matches!(
        outcome,
        JobOutcome::Failure {
            reason: FailureReason::LaunchFailed(_)
        }
    );
}

// ---------------------------------------------------------------------------
// Cancellation, timeout and exclusivity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_while_waiting_ignores_later_completion() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    let coord = JobCoordinator::with_launcher(&config, FakeWorker::new(&config, completes_after(400)));
    let mut events = coord.subscribe();

    let ticket = coord.submit(png_input(dir.path(), 8, 8)).expect("submit");
    wait_for_waiting(&mut events).await;
    assert!(coord.cancel());

    assert_eq!(ticket.outcome().await, JobOutcome::Cancelled);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(read_status(&config.status_path()).done, "worker still wrote its record");
    assert_eq!(
        coord.state(),
        JobState::Completed {
            outcome: JobOutcome::Cancelled
        }
    );
    assert_eq!(dir_names(&config.staging_dir), STAGED);
}

#[tokio::test]
async fn ticket_cancel_before_launch_skips_worker() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    let worker = FakeWorker::new(&config, completes_after(0));
    let launches = worker.launch_counter();
    let coord = JobCoordinator::with_launcher(&config, worker);

    let ticket = coord.submit(png_input(dir.path(), 8, 8)).expect("submit");
    ticket.cancel();

    assert_eq!(ticket.outcome().await, JobOutcome::Cancelled);
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn silent_worker_times_out() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    let coord = JobCoordinator::with_launcher(&config, FakeWorker::new(&config, WorkerScript::Hang));

    let outcome = coord
        .submit_with_timeout(png_input(dir.path(), 8, 8), Duration::from_millis(300))
        .expect("submit")
        .outcome()
        .await;
    assert_eq!(outcome, JobOutcome::failure(FailureReason::Timeout));
}

#[tokio::test]
async fn configured_timeout_applies_to_plain_submit() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut config = config_in(dir.path());
    config.job_timeout = Some(Duration::from_millis(300));
    let coord = JobCoordinator::with_launcher(&config, FakeWorker::new(&config, WorkerScript::Hang));

    let outcome = coord
        .submit(png_input(dir.path(), 8, 8))
        .expect("submit")
        .outcome()
        .await;
    assert_eq!(outcome, JobOutcome::failure(FailureReason::Timeout));
}

#[tokio::test]
async fn completed_record_from_previous_job_is_not_reused() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    std::fs::create_dir_all(&config.staging_dir).expect("create staging dir");
    std::fs::write(config.status_path(), StatusRecord::completed("/out/old.obj").encode())
        .expect("write old record");
    let coord = JobCoordinator::with_launcher(&config, FakeWorker::new(&config, WorkerScript::Hang));

    let outcome = coord
        .submit_with_timeout(png_input(dir.path(), 8, 8), Duration::from_millis(300))
        .expect("submit")
        .outcome()
        .await;
    assert_eq!(outcome, JobOutcome::failure(FailureReason::Timeout));
}

#[tokio::test]
async fn new_job_allowed_after_completion() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = config_in(dir.path());
    let coord = JobCoordinator::with_launcher(&config, FakeWorker::new(&config, completes_after(50)));

    let input = png_input(dir.path(), 8, 8);

    let first = coord.submit(input.clone()).expect("first submit");
    assert!(coord.state().is_busy());
    assert_matches!(coord.submit(input.clone()), Err(_));
    assert!(first.outcome().await.is_success());

    let second = coord.submit(input).expect("second submit");
    assert!(second.outcome().await.is_success());
}
