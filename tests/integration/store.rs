/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Job store tests: creation, listing, claiming, leases, results, and
//! cancellation semantics.

use std::time::Duration;

use bosun::dal::NewJobRequest;
use bosun::database::types::ms_to_datetime;
use bosun::error::StoreError;
use bosun::models::{JobStatus, TaskResult, TaskStatus};

use crate::fixtures::{create_job, job_request, memory_dal};

fn result_for(task_id: &str, success: bool) -> TaskResult {
    TaskResult {
        task_id: task_id.to_string(),
        success,
        error: if success { None } else { Some("boom".into()) },
        output: None,
        finished_at: ms_to_datetime(1_700_000_000_000),
    }
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let dal = memory_dal().await;
    let (job, tasks) = create_job(&dal, "local", &["acct-1", "acct-2", "acct-3"]).await;

    assert_eq!(job.id.len(), 32);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.targets, vec!["acct-1", "acct-2", "acct-3"]);
    assert_eq!(job.created_at, job.updated_at);

    let (fetched, fetched_tasks) = dal.jobs().get(&job.id).await.expect("get");
    assert_eq!(fetched.id, job.id);
    assert_eq!(fetched.action, "ping");
    assert_eq!(fetched_tasks.len(), 3);

    // Tasks come back in input order and share the job's creation instant.
    let targets: Vec<&str> = fetched_tasks.iter().map(|t| t.target.as_str()).collect();
    assert_eq!(targets, vec!["acct-1", "acct-2", "acct-3"]);
    for task in &fetched_tasks {
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.attempt, 0);
        assert_eq!(task.job_id, job.id);
        assert_eq!(task.created_at, job.created_at);
        assert!(task.updated_at >= task.created_at);
    }
    assert_eq!(tasks.len(), fetched_tasks.len());
}

#[tokio::test]
async fn create_rejects_empty_action_and_targets() {
    let dal = memory_dal().await;

    let mut no_action = job_request("", &["acct-1"]);
    no_action.action = "  ".into();
    assert!(matches!(
        dal.jobs().create(no_action).await,
        Err(StoreError::InvalidArgument(_))
    ));

    let no_targets = NewJobRequest {
        action: "ping".into(),
        ..Default::default()
    };
    assert!(matches!(
        dal.jobs().create(no_targets).await,
        Err(StoreError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn get_unknown_job_is_not_found() {
    let dal = memory_dal().await;
    let err = dal.jobs().get("deadbeef").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn list_orders_newest_first_and_clamps() {
    let dal = memory_dal().await;
    let (first, _) = create_job(&dal, "", &["a"]).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let (second, _) = create_job(&dal, "", &["b"]).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let (third, _) = create_job(&dal, "", &["c"]).await;

    let jobs = dal.jobs().list(50).await.expect("list");
    let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec![&third.id, &second.id, &first.id]);

    // limit=0 clamps up to 1; oversized limits clamp down to 500.
    assert_eq!(dal.jobs().list(0).await.expect("list").len(), 1);
    assert_eq!(dal.jobs().list(10_000).await.expect("list").len(), 3);
}

#[tokio::test]
async fn claim_is_fifo_and_region_scoped() {
    let dal = memory_dal().await;
    let (eu_job, _) = create_job(&dal, "eu", &["acct-1"]).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let (any_job, _) = create_job(&dal, "", &["acct-2"]).await;

    // The eu claim prefers the older eu task over the younger any-region one.
    let claimed = dal.tasks().claim_next_queued("eu").await.expect("claim");
    let claimed = claimed.expect("a task to claim");
    assert_eq!(claimed.job_id, eu_job.id);
    assert_eq!(claimed.status, TaskStatus::Running);
    assert_eq!(claimed.attempt, 1);
    assert!(claimed.updated_at >= claimed.created_at);

    // Empty-region tasks are claimable from any region.
    let second = dal
        .tasks()
        .claim_next_queued("mars")
        .await
        .expect("claim")
        .expect("any-region task");
    assert_eq!(second.job_id, any_job.id);

    // Nothing left anywhere.
    assert!(dal.tasks().claim_next_queued("eu").await.expect("claim").is_none());
}

#[tokio::test]
async fn claim_moves_job_to_running() {
    let dal = memory_dal().await;
    let (job, _) = create_job(&dal, "eu", &["acct-1", "acct-2"]).await;

    dal.tasks()
        .claim_next_queued("eu")
        .await
        .expect("claim")
        .expect("task");
    let (job, _) = dal.jobs().get(&job.id).await.expect("get");
    assert_eq!(job.status, JobStatus::Running);
}

#[tokio::test]
async fn claim_returns_none_for_unmatched_region() {
    let dal = memory_dal().await;
    create_job(&dal, "eu", &["acct-1"]).await;
    assert!(dal
        .tasks()
        .claim_next_queued("us")
        .await
        .expect("claim")
        .is_none());
}

#[tokio::test]
async fn requeue_returns_running_task_to_queue_without_touching_attempt() {
    let dal = memory_dal().await;
    let (job, _) = create_job(&dal, "eu", &["acct-1"]).await;
    let claimed = dal
        .tasks()
        .claim_next_queued("eu")
        .await
        .expect("claim")
        .expect("task");

    dal.tasks().requeue(&claimed.id).await.expect("requeue");
    let (_, tasks) = dal.jobs().get(&job.id).await.expect("get");
    assert_eq!(tasks[0].status, TaskStatus::Queued);
    assert_eq!(tasks[0].attempt, 1);

    // Requeue of a non-running task is a no-op.
    dal.tasks().requeue(&claimed.id).await.expect("requeue");
    let (_, tasks) = dal.jobs().get(&job.id).await.expect("get");
    assert_eq!(tasks[0].status, TaskStatus::Queued);

    // A second claim accrues the next attempt.
    let reclaimed = dal
        .tasks()
        .claim_next_queued("eu")
        .await
        .expect("claim")
        .expect("task");
    assert_eq!(reclaimed.attempt, 2);
}

#[tokio::test]
async fn stale_lease_sweep_requeues_only_expired_tasks() {
    let dal = memory_dal().await;
    create_job(&dal, "eu", &["acct-1"]).await;
    let claimed = dal
        .tasks()
        .claim_next_queued("eu")
        .await
        .expect("claim")
        .expect("task");

    // Within the lease nothing is swept.
    let swept = dal
        .tasks()
        .requeue_stale_running(Duration::from_secs(300))
        .await
        .expect("sweep");
    assert_eq!(swept, 0);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let swept = dal
        .tasks()
        .requeue_stale_running(Duration::from_millis(1))
        .await
        .expect("sweep");
    assert_eq!(swept, 1);

    let (_, tasks) = dal.jobs().get(&claimed.job_id).await.expect("get");
    assert_eq!(tasks[0].status, TaskStatus::Queued);
    assert_eq!(tasks[0].attempt, 1, "sweep must preserve the attempt counter");
}

#[tokio::test]
async fn result_mix_resolves_job_failed() {
    let dal = memory_dal().await;
    let (job, tasks) = create_job(&dal, "eu", &["acct-1", "acct-2", "acct-3"]).await;

    for _ in 0..3 {
        dal.tasks().claim_next_queued("eu").await.expect("claim");
    }

    dal.tasks()
        .set_result(&result_for(&tasks[0].id, true))
        .await
        .expect("result");
    let (task, mid_job) = dal
        .tasks()
        .set_result(&result_for(&tasks[1].id, false))
        .await
        .expect("result");
    assert_eq!(task.status, TaskStatus::Failed);
    // One task still running, so the job is not settled yet.
    assert_eq!(mid_job.status, JobStatus::Running);

    let (_, final_job) = dal
        .tasks()
        .set_result(&result_for(&tasks[2].id, true))
        .await
        .expect("result");
    assert_eq!(final_job.status, JobStatus::Failed);

    let (_, tasks) = dal.jobs().get(&job.id).await.expect("get");
    let statuses: Vec<TaskStatus> = tasks.iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        vec![TaskStatus::Finished, TaskStatus::Failed, TaskStatus::Finished]
    );
}

#[tokio::test]
async fn all_successes_resolve_job_finished() {
    let dal = memory_dal().await;
    let (job, tasks) = create_job(&dal, "eu", &["acct-1"]).await;
    dal.tasks().claim_next_queued("eu").await.expect("claim");
    let (_, job_after) = dal
        .tasks()
        .set_result(&result_for(&tasks[0].id, true))
        .await
        .expect("result");
    assert_eq!(job_after.status, JobStatus::Finished);
    assert_eq!(job_after.id, job.id);
}

#[tokio::test]
async fn result_for_unknown_task_is_not_found() {
    let dal = memory_dal().await;
    let err = dal
        .tasks()
        .set_result(&result_for("feedface", true))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn result_lands_even_after_lease_requeue() {
    // At-least-once: a result for a task the sweep already requeued still
    // records its terminal status.
    let dal = memory_dal().await;
    let (_, tasks) = create_job(&dal, "eu", &["acct-1"]).await;
    dal.tasks().claim_next_queued("eu").await.expect("claim");
    tokio::time::sleep(Duration::from_millis(10)).await;
    dal.tasks()
        .requeue_stale_running(Duration::from_millis(1))
        .await
        .expect("sweep");

    let (task, job) = dal
        .tasks()
        .set_result(&result_for(&tasks[0].id, true))
        .await
        .expect("result");
    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(job.status, JobStatus::Finished);
}

#[tokio::test]
async fn cancel_mid_flight_is_sticky() {
    let dal = memory_dal().await;
    let (job, tasks) = create_job(&dal, "eu", &["acct-1", "acct-2"]).await;

    // acct-1 in flight, acct-2 still queued.
    dal.tasks().claim_next_queued("eu").await.expect("claim");
    dal.jobs().cancel(&job.id).await.expect("cancel");

    let (job_after, tasks_after) = dal.jobs().get(&job.id).await.expect("get");
    assert_eq!(job_after.status, JobStatus::Canceled);
    assert_eq!(tasks_after[0].status, TaskStatus::Canceled);
    assert_eq!(tasks_after[1].status, TaskStatus::Canceled);

    // A late success still lands on the task, but the job stays canceled.
    let (late_task, late_job) = dal
        .tasks()
        .set_result(&result_for(&tasks[0].id, true))
        .await
        .expect("late result");
    assert_eq!(late_task.status, TaskStatus::Finished);
    assert_eq!(late_job.status, JobStatus::Canceled);

    // And no claim revives the canceled job.
    assert!(dal
        .tasks()
        .claim_next_queued("eu")
        .await
        .expect("claim")
        .is_none());
}

#[tokio::test]
async fn cancel_leaves_terminal_tasks_alone() {
    let dal = memory_dal().await;
    let (job, tasks) = create_job(&dal, "eu", &["acct-1", "acct-2"]).await;
    dal.tasks().claim_next_queued("eu").await.expect("claim");
    dal.tasks()
        .set_result(&result_for(&tasks[0].id, true))
        .await
        .expect("result");

    dal.jobs().cancel(&job.id).await.expect("cancel");
    let (_, tasks_after) = dal.jobs().get(&job.id).await.expect("get");
    assert_eq!(tasks_after[0].status, TaskStatus::Finished);
    assert_eq!(tasks_after[1].status, TaskStatus::Canceled);
}

#[tokio::test]
async fn cancel_is_idempotent_and_checks_existence() {
    let dal = memory_dal().await;
    let (job, _) = create_job(&dal, "eu", &["acct-1"]).await;

    dal.jobs().cancel(&job.id).await.expect("first cancel");
    dal.jobs().cancel(&job.id).await.expect("second cancel");
    let (job_after, _) = dal.jobs().get(&job.id).await.expect("get");
    assert_eq!(job_after.status, JobStatus::Canceled);

    assert!(dal.jobs().cancel("deadbeef").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn updated_at_never_precedes_created_at() {
    let dal = memory_dal().await;
    let (job, tasks) = create_job(&dal, "eu", &["acct-1"]).await;
    dal.tasks().claim_next_queued("eu").await.expect("claim");
    dal.tasks()
        .set_result(&result_for(&tasks[0].id, false))
        .await
        .expect("result");

    let (job_after, tasks_after) = dal.jobs().get(&job.id).await.expect("get");
    assert!(job_after.updated_at >= job_after.created_at);
    for task in tasks_after {
        assert!(task.updated_at >= task.created_at);
        assert!(task.attempt >= 0);
    }
}
