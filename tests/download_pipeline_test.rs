//! Download pipeline tests: progress rendering, failure reporting and
//! job directory lifecycle, driven through the conversation.

mod common;

use common::{create_test_chat_id, TestEnvironment};
use pretty_assertions::assert_eq;

use ytdl_bot::download::orchestrator::PREPARING_TEXT;
use ytdl_bot::download::{JobStatus, ProgressSnapshot};
use ytdl_bot::testing::{FakeBackend, FakeOutput, OutboundCall};

async fn run_audio_job(env: &TestEnvironment) -> ytdl_bot::download::DownloadJob {
    let chat = create_test_chat_id();
    env.send_text(chat, "https://youtu.be/abc123").await;
    env.press(chat, "audio").await.expect("job started").await.unwrap()
}

/// Texts edited into the job's status message, in order.
fn status_texts(env: &TestEnvironment) -> Vec<String> {
    let calls = env.transport.calls();
    let status_id = calls.iter().find_map(|call| match call {
        OutboundCall::Send { message_id, text, .. } if text == PREPARING_TEXT => Some(*message_id),
        _ => None,
    });
    calls
        .into_iter()
        .filter_map(|call| match call {
            OutboundCall::Edit { message_id, text, .. } if Some(message_id) == status_id => Some(text),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_progress_bar_then_phases() {
    let env = TestEnvironment::new(FakeBackend::new().with_progress(vec![
        ProgressSnapshot::downloading(0, Some(2_000)),
        ProgressSnapshot::downloading(1_000, Some(2_000)),
        ProgressSnapshot::downloading(2_000, Some(2_000)),
    ]));
    let job = run_audio_job(&env).await;
    assert_eq!(job.status, JobStatus::Succeeded);

    let texts = status_texts(&env);
    assert_eq!(
        texts,
        vec![
            format!("⬇️ Downloading...\n[{}] 0.0%", "░".repeat(20)),
            format!("⬇️ Downloading...\n[{}{}] 50.0%", "█".repeat(10), "░".repeat(10)),
            format!("⬇️ Downloading...\n[{}] 100.0%", "█".repeat(20)),
            "🔄 Converting / Finalizing...".to_string(),
            "📤 Uploading...".to_string(),
            "✅ Done!".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_unknown_total_shows_megabytes() {
    let env = TestEnvironment::new(FakeBackend::new().with_progress(vec![
        ProgressSnapshot::downloading(1_048_576, Some(0)),
        ProgressSnapshot::downloading(3_145_728, None),
    ]));
    run_audio_job(&env).await;

    let texts = status_texts(&env);
    assert_eq!(texts[0], "⬇️ Downloading...\n1.0 MB");
    assert_eq!(texts[1], "⬇️ Downloading...\n3.0 MB");
    assert!(texts.iter().all(|t| !t.contains('%')));
}

#[tokio::test]
async fn test_failure_reported_once() {
    let env = TestEnvironment::new(
        FakeBackend::new()
            .with_progress(vec![ProgressSnapshot::downloading(10, Some(100))])
            .failing_download("The video is unavailable."),
    );
    let job = run_audio_job(&env).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure.as_deref(), Some("⚠️ Error: The video is unavailable."));

    let texts = status_texts(&env);
    let failures: Vec<_> = texts.iter().filter(|t| t.starts_with("⚠️")).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(texts.last().map(String::as_str), Some("⚠️ Error: The video is unavailable."));
    assert!(env.transport.documents().is_empty());
    assert_eq!(env.download_dir_entries(), 0);
}

#[tokio::test]
async fn test_missing_output_fails_job() {
    let env = TestEnvironment::new(FakeBackend::new().with_output(FakeOutput::Missing));
    let job = run_audio_job(&env).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.failure.unwrap().contains("could not be found"));
    assert!(env.transport.documents().is_empty());
}

#[tokio::test]
async fn test_upload_failure_is_reported() {
    let env = TestEnvironment::new(FakeBackend::new());
    env.transport.fail_documents(true);
    let job = run_audio_job(&env).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.failure.unwrap().starts_with("⚠️ Could not send the file"));
    assert_eq!(env.download_dir_entries(), 0);
}

#[tokio::test]
async fn test_keep_artifacts_leaves_job_directory() {
    let env = TestEnvironment::with_config(FakeBackend::new().with_content(b"mp3 bytes"), |config| {
        config.keep_artifacts(true).with_throttle(std::time::Duration::ZERO)
    });
    let job = run_audio_job(&env).await;

    assert_eq!(job.status, JobStatus::Succeeded);
    let artifact = job.result_artifact_path.expect("artifact path");
    assert!(artifact.starts_with(env.download_dir.path().join(job.id.to_string())));
    assert_eq!(std::fs::read(&artifact).unwrap(), b"mp3 bytes");
    assert_eq!(env.download_dir_entries(), 1);
}

#[tokio::test]
async fn test_status_message_failure_does_not_stop_job() {
    let env = TestEnvironment::new(FakeBackend::new().with_progress(vec![ProgressSnapshot::downloading(1, Some(2))]));
    env.transport.fail_edits(true);
    let job = run_audio_job(&env).await;

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(env.transport.documents().len(), 1);
}
