//! End-to-end scheduling tests: queueing, resource exclusivity, failure
//! containment and the inline (sync) path.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{start, wait_terminal, Event, BROKEN_ADAPTER};
use tokio_test::assert_ok;
use vox_runtime::adapters::ConfigKey;
use vox_runtime::resources::ResourceId;
use vox_runtime::scheduler::{SubmitError, SubmitStatus};
use vox_runtime::tasks::{
    ExecutionMode, ReferenceAudio, TaskPayload, TaskStatus, ValidationError,
};

fn speak(text: &str) -> TaskPayload {
    TaskPayload::new(text)
}

#[tokio::test]
async fn unknown_adapter_is_rejected_without_a_record() {
    let (runtime, stats) = start(&[0], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());

    let err = gateway
        .submit(speak("hello").with_adapter(ConfigKey::new("nobody")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SubmitError::Validation(ValidationError::UnknownAdapter(ref name)) if name == "nobody"
    ));
    assert!(runtime.store().is_empty());
    assert_eq!(gateway.queue_depth(), 0);
    assert_eq!(stats.runs(), 0);

    runtime.shutdown().await;
}

#[tokio::test]
async fn malformed_payload_is_rejected_without_a_record() {
    let (runtime, _stats) = start(&[0], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());

    let err = gateway.submit(speak("   ")).await.unwrap_err();
    assert!(matches!(err, SubmitError::Validation(ValidationError::Malformed(_))));
    assert!(runtime.store().is_empty());

    runtime.shutdown().await;
}

#[tokio::test]
async fn reference_audio_is_checked_before_a_record_exists() {
    let (runtime, _stats) = start(&[0], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());

    let err = gateway
        .submit(speak("clone me").with_reference(ReferenceAudio {
            audio_path: PathBuf::new(),
            text: Some("reference words".to_string()),
        }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SubmitError::Validation(ValidationError::Malformed(ref m)) if m.contains("reference audio")
    ));
    assert!(runtime.store().is_empty());

    let submitted = gateway
        .submit(speak("clone me").with_reference(ReferenceAudio {
            audio_path: PathBuf::from("refs/voice.wav"),
            text: None,
        }))
        .await
        .unwrap();
    let done = wait_terminal(&gateway, &submitted.task_id).await;
    assert_eq!(done.status, TaskStatus::Completed);

    runtime.shutdown().await;
}

#[tokio::test]
async fn single_resource_runs_tasks_one_after_another() {
    let (runtime, stats) = start(&[0], Duration::from_millis(40));
    let gateway = Arc::clone(runtime.gateway());

    let first = assert_ok!(gateway.submit(speak("first")).await);
    let second = assert_ok!(gateway.submit(speak("second")).await);
    assert_eq!(first.status, SubmitStatus::Submitted);
    assert_eq!(second.status, SubmitStatus::Submitted);
    assert_eq!(first.progress, 0.0);
    assert!(first.estimated_time >= 30.0);

    // The second task waits behind the first.
    let pending = gateway.get_status(&second.task_id).unwrap();
    assert_eq!(pending.status, TaskStatus::Pending);

    // Sample the store while both run: at most one PROCESSING at a time.
    let sampler_gateway = Arc::clone(&gateway);
    let sampler = tokio::spawn(async move {
        let mut max_processing = 0;
        for _ in 0..200 {
            let processing = sampler_gateway.list(Some(TaskStatus::Processing), None).total;
            max_processing = max_processing.max(processing);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        max_processing
    });

    let a = wait_terminal(&gateway, &first.task_id).await;
    let b = wait_terminal(&gateway, &second.task_id).await;
    assert_eq!(a.status, TaskStatus::Completed);
    assert_eq!(b.status, TaskStatus::Completed);
    assert!(a.updated_at <= b.updated_at);
    assert_eq!(sampler.await.unwrap(), 1);

    // First task fully finished (including persistence) before the second ran.
    let events: Vec<Event> = stats
        .events()
        .into_iter()
        .filter(|e| !matches!(e, Event::Load { .. }))
        .collect();
    let r = ResourceId::new(0);
    assert_eq!(
        events,
        vec![
            Event::RunStart { resource: r, text: "first".into() },
            Event::RunEnd { resource: r, text: "first".into() },
            Event::Persist { task_id: first.task_id.clone() },
            Event::RunStart { resource: r, text: "second".into() },
            Event::RunEnd { resource: r, text: "second".into() },
            Event::Persist { task_id: second.task_id.clone() },
        ]
    );

    runtime.shutdown().await;
}

#[tokio::test]
async fn inference_failure_does_not_poison_the_resource() {
    let (runtime, _stats) = start(&[0], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());

    let bad = gateway.submit(speak("fail")).await.unwrap();
    let good = gateway.submit(speak("after the failure")).await.unwrap();

    let failed = wait_terminal(&gateway, &bad.task_id).await;
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("synthetic failure"));
    assert!(failed.message.starts_with("Task failed:"));
    assert!(failed.result.is_none());

    let ok = wait_terminal(&gateway, &good.task_id).await;
    assert_eq!(ok.status, TaskStatus::Completed);
    assert_eq!(ok.resource_id, Some(ResourceId::new(0)));
    assert!(ok.error.is_none());

    runtime.shutdown().await;
}

#[tokio::test]
async fn load_failure_leaves_resource_unloaded_and_reusable() {
    let (runtime, _stats) = start(&[0], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());

    let broken = gateway
        .submit(speak("hello").with_adapter(ConfigKey::new(BROKEN_ADAPTER)))
        .await
        .unwrap();
    let failed = wait_terminal(&gateway, &broken.task_id).await;
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("checkpoint is corrupt"));
    assert_eq!(runtime.cache().loaded_key(ResourceId::new(0)), None);

    let next = gateway
        .submit(speak("hello").with_adapter(ConfigKey::new("speaker_a")))
        .await
        .unwrap();
    assert_eq!(wait_terminal(&gateway, &next.task_id).await.status, TaskStatus::Completed);
    assert_eq!(
        runtime.cache().loaded_key(ResourceId::new(0)),
        Some(ConfigKey::new("speaker_a"))
    );

    runtime.shutdown().await;
}

#[tokio::test]
async fn engine_panic_fails_only_its_task() {
    let (runtime, _stats) = start(&[0], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());

    let boom = gateway.submit(speak("panic")).await.unwrap();
    let next = gateway.submit(speak("still alive")).await.unwrap();

    let failed = wait_terminal(&gateway, &boom.task_id).await;
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("engine exploded"));
    assert_eq!(wait_terminal(&gateway, &next.task_id).await.status, TaskStatus::Completed);

    runtime.shutdown().await;
}

#[tokio::test]
async fn sync_submission_returns_result_inline() {
    let (runtime, stats) = start(&[0, 1], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());

    let result = gateway
        .submit(speak("right now").with_mode(ExecutionMode::Sync))
        .await
        .unwrap();
    assert_eq!(result.status, SubmitStatus::Completed);
    assert_eq!(result.progress, 1.0);
    assert_eq!(result.message, "Synthesis complete (resource 0)");
    assert!(result.result.is_some());
    assert!(result.error.is_none());
    assert_eq!(gateway.queue_depth(), 0);
    assert_eq!(stats.runs(), 1);

    let record = gateway.get_status(&result.task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.result, result.result);

    runtime.shutdown().await;
}

#[tokio::test]
async fn sync_submission_reports_failure_inline() {
    let (runtime, _stats) = start(&[0], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());

    let result = gateway
        .submit_on(speak("fail").with_mode(ExecutionMode::Sync), ResourceId::new(0))
        .await
        .unwrap();
    assert_eq!(result.status, SubmitStatus::Failed);
    assert!(result.result.is_none());
    assert!(result.error.unwrap().contains("synthetic failure"));

    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_sync_submission_still_owns_its_resource() {
    let (runtime, stats) = start(&[0], Duration::from_millis(300));
    let gateway = Arc::clone(runtime.gateway());

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        gateway.submit(speak("first").with_mode(ExecutionMode::Sync)),
    )
    .await;
    assert!(abandoned.is_err());

    let running = runtime.store().list(Some(TaskStatus::Processing), 10);
    assert_eq!(running.len(), 1);
    let first = running[0].task_id.clone();

    let second = gateway.submit(speak("second")).await.unwrap();
    let second = wait_terminal(&gateway, &second.task_id).await;
    assert_eq!(second.status, TaskStatus::Completed);

    let first = wait_terminal(&gateway, &first).await;
    assert_eq!(first.status, TaskStatus::Completed);
    assert_eq!(first.progress, 1.0);
    assert_eq!(stats.max_concurrent_per_resource(), 1);
    assert_eq!(stats.runs(), 2);

    let order: Vec<_> = stats
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::RunStart { text, .. } | Event::RunEnd { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(order, ["first", "first", "second", "second"]);

    runtime.shutdown().await;
}

#[tokio::test]
async fn sync_submission_on_unknown_resource_is_rejected() {
    let (runtime, _stats) = start(&[0], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());

    let err = gateway
        .submit_on(speak("hello").with_mode(ExecutionMode::Sync), ResourceId::new(7))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::UnknownResource(id) if id == ResourceId::new(7)));
    assert!(runtime.store().is_empty());

    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn resources_are_never_shared_between_tasks() {
    let (runtime, stats) = start(&[0, 1, 2], Duration::from_millis(3));
    let gateway = Arc::clone(runtime.gateway());
    let adapters = ["none", "speaker_a", "speaker_b"];

    let mut queued = Vec::new();
    for i in 0..30 {
        let payload = speak(&format!("queued {i}"))
            .with_adapter(ConfigKey::new(adapters[i % adapters.len()]));
        queued.push(gateway.submit(payload).await.unwrap().task_id);
    }

    // Sync callers compete with the workers for the same locks.
    let mut inline = Vec::new();
    for i in 0..9 {
        let gateway = Arc::clone(&gateway);
        let resource = ResourceId::new((i % 3) as u32);
        let payload = speak(&format!("inline {i}"))
            .with_adapter(ConfigKey::new(adapters[(i + 1) % adapters.len()]))
            .with_mode(ExecutionMode::Sync);
        inline.push(tokio::spawn(async move { gateway.submit_on(payload, resource).await }));
    }

    for handle in inline {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.status, SubmitStatus::Completed);
    }
    for id in &queued {
        assert_eq!(wait_terminal(&gateway, id).await.status, TaskStatus::Completed);
    }

    assert_eq!(stats.max_concurrent_per_resource(), 1);
    assert_eq!(stats.runs(), 39);
    let counts = runtime.store().stats();
    assert_eq!(counts.completed, 39);
    assert_eq!(counts.processing, 0);

    runtime.shutdown().await;
}

#[tokio::test]
async fn repeated_adapter_is_loaded_once_per_resource() {
    let (runtime, stats) = start(&[0], Duration::ZERO);
    let gateway = Arc::clone(runtime.gateway());
    let a = ConfigKey::new("speaker_a");
    let b = ConfigKey::new("speaker_b");

    let mut last = None;
    for key in [&a, &a, &a, &b, &b] {
        let submitted = gateway
            .submit(speak("hello").with_adapter(key.clone()))
            .await
            .unwrap();
        last = Some(submitted.task_id);
    }
    wait_terminal(&gateway, &last.unwrap()).await;

    assert_eq!(stats.loads(), 2);
    assert_eq!(runtime.cache().load_count(ResourceId::new(0)), 2);
    assert_eq!(runtime.cache().loaded_key(ResourceId::new(0)), Some(b));

    runtime.shutdown().await;
}

#[tokio::test]
async fn progress_milestones_are_visible_while_generating() {
    let (runtime, _stats) = start(&[0], Duration::from_millis(300));
    let gateway = Arc::clone(runtime.gateway());

    let submitted = gateway.submit(speak("slow")).await.unwrap();
    let generating = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let record = gateway.get_status(&submitted.task_id).unwrap();
            if record.status == TaskStatus::Processing && record.progress >= 0.3 {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(generating.progress, 0.3);
    assert_eq!(generating.message, "Generating audio");
    assert_eq!(generating.resource_id, Some(ResourceId::new(0)));

    let done = wait_terminal(&gateway, &submitted.task_id).await;
    assert_eq!(done.progress, 1.0);
    assert_eq!(done.message, "Synthesis complete (resource 0)");
    assert_eq!(done.result.unwrap().to_string(), format!("mem/{}.wav", submitted.task_id));

    runtime.shutdown().await;
}

#[tokio::test]
async fn status_only_moves_forward() {
    let (runtime, _stats) = start(&[0], Duration::from_millis(30));
    let gateway = Arc::clone(runtime.gateway());

    let blocker = gateway.submit(speak("blocker")).await.unwrap();
    let watched = gateway.submit(speak("watched")).await.unwrap();

    let mut seen = vec![gateway.get_status(&watched.task_id).unwrap().status];
    let mut progress = 0.0;
    loop {
        let record = gateway.get_status(&watched.task_id).unwrap();
        assert!(record.progress >= progress, "progress went backwards");
        progress = record.progress;
        if seen.last() != Some(&record.status) {
            seen.push(record.status);
        }
        if record.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let ranks: Vec<u8> = seen.iter().map(|s| s.rank()).collect();
    assert!(ranks.windows(2).all(|w| w[0] < w[1]), "statuses: {seen:?}");
    assert_eq!(seen.first(), Some(&TaskStatus::Pending));
    assert_eq!(seen.last(), Some(&TaskStatus::Completed));
    wait_terminal(&gateway, &blocker.task_id).await;

    runtime.shutdown().await;
}

#[tokio::test]
async fn work_spreads_across_resources() {
    let (runtime, _stats) = start(&[0, 1], Duration::from_millis(50));
    let gateway = Arc::clone(runtime.gateway());

    let a = gateway.submit(speak("one")).await.unwrap();
    let b = gateway.submit(speak("two")).await.unwrap();
    let ra = wait_terminal(&gateway, &a.task_id).await;
    let rb = wait_terminal(&gateway, &b.task_id).await;

    let mut used = vec![ra.resource_id.unwrap(), rb.resource_id.unwrap()];
    used.sort();
    assert_eq!(used, vec![ResourceId::new(0), ResourceId::new(1)]);

    runtime.shutdown().await;
}
