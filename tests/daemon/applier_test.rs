use std::sync::Arc;
use std::time::{Duration, Instant};

use deltawatch_core::{ApplyResult, ChangedFile, DeltaApplier, WatchSession};
use deltawatch_daemon::channel::connect;
use deltawatch_daemon::{AgentClient, AgentDeltaApplier};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::{config_for, sample_batch, unique_channel, MockBrowser};

async fn wait_connected(applier: &AgentDeltaApplier) {
    for _ in 0..100 {
        if applier.is_connected().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("agent never connected to {}", applier.channel_name());
}

#[tokio::test]
async fn test_refresh_ack_reloads_browser_once() {
    let mut browser = MockBrowser::new();
    browser.expect_reload().times(1).returning(|_| Ok(()));
    browser.expect_send().never();

    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let applier =
        AgentDeltaApplier::new(channel.clone(), Duration::from_secs(2), Some(Arc::new(browser)));
    let cancel = CancellationToken::new();
    applier.initialize(&mut session, &cancel).await.unwrap();

    let client = AgentClient::connect(&channel).await.unwrap();
    let agent = tokio::spawn(client.serve(|payload| {
        assert_eq!(payload.changed_file, "Component.src");
        ApplyResult::SuccessRefreshBrowser
    }));
    wait_connected(&applier).await;

    let started = Instant::now();
    let applied = applier
        .apply(&session, &ChangedFile::new("Component.src"), &sample_batch(), &cancel)
        .await;
    assert!(applied);
    assert!(started.elapsed() < Duration::from_millis(500));

    drop(applier);
    assert_eq!(agent.await.unwrap().unwrap(), 1);
}

#[tokio::test]
async fn test_silent_agent_times_out() {
    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let applier = AgentDeltaApplier::new(channel.clone(), session.config().ack_timeout(), None);
    let cancel = CancellationToken::new();
    applier.initialize(&mut session, &cancel).await.unwrap();

    let mut client = AgentClient::connect(&channel).await.unwrap();
    wait_connected(&applier).await;

    let started = Instant::now();
    let applied = applier
        .apply(&session, &ChangedFile::new("Component.src"), &sample_batch(), &cancel)
        .await;
    let elapsed = started.elapsed();

    assert!(!applied);
    assert!(elapsed >= Duration::from_millis(1900), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3000), "returned after {:?}", elapsed);

    // The request was delivered even though it was never acknowledged.
    assert!(client.next_payload().await.unwrap().is_some());

    // The channel is closed so a late acknowledgment cannot answer a new request.
    assert!(client.next_payload().await.unwrap().is_none());
    assert!(!applier.is_connected().await);
    assert!(!applier
        .apply(&session, &ChangedFile::new("Component.src"), &sample_batch(), &cancel)
        .await);
}

#[tokio::test]
async fn test_no_client_fails_without_writing() {
    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let applier = AgentDeltaApplier::new(channel.clone(), Duration::from_secs(2), None);
    let cancel = CancellationToken::new();
    applier.initialize(&mut session, &cancel).await.unwrap();

    let started = Instant::now();
    let applied = applier
        .apply(&session, &ChangedFile::new("Component.src"), &sample_batch(), &cancel)
        .await;
    assert!(!applied);
    assert!(started.elapsed() < Duration::from_millis(100));

    // An agent that connects afterwards sees nothing from the skipped update.
    let mut client = AgentClient::connect(&channel).await.unwrap();
    assert!(timeout(Duration::from_millis(200), client.next_payload()).await.is_err());
}

#[tokio::test]
async fn test_failed_ack_reports_failure() {
    let mut browser = MockBrowser::new();
    browser.expect_reload().never();
    browser.expect_send().never();

    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let applier =
        AgentDeltaApplier::new(channel.clone(), Duration::from_secs(2), Some(Arc::new(browser)));
    let cancel = CancellationToken::new();
    applier.initialize(&mut session, &cancel).await.unwrap();

    let client = AgentClient::connect(&channel).await.unwrap();
    tokio::spawn(client.serve(|_| ApplyResult::Failed));
    wait_connected(&applier).await;

    assert!(!applier
        .apply(&session, &ChangedFile::new("Component.src"), &sample_batch(), &cancel)
        .await);
    // A clean failure keeps the channel usable.
    assert!(applier.is_connected().await);
}

#[tokio::test]
async fn test_extra_ack_bytes_fail() {
    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let applier = AgentDeltaApplier::new(channel.clone(), Duration::from_secs(2), None);
    let cancel = CancellationToken::new();
    applier.initialize(&mut session, &cancel).await.unwrap();

    // Two acknowledgment bytes are already waiting when the request goes out.
    let mut raw = connect(&channel).await.unwrap();
    raw.write_all(&[1, 1]).await.unwrap();
    wait_connected(&applier).await;

    assert!(!applier
        .apply(&session, &ChangedFile::new("Component.src"), &sample_batch(), &cancel)
        .await);
    assert!(!applier.is_connected().await);
}

#[tokio::test]
async fn test_reinitialize_accepts_new_agent() {
    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let applier = AgentDeltaApplier::new(channel.clone(), Duration::from_secs(2), None);
    let cancel = CancellationToken::new();

    applier.initialize(&mut session, &cancel).await.unwrap();
    let first = AgentClient::connect(&channel).await.unwrap();
    let first_agent = tokio::spawn(first.serve(|_| ApplyResult::Success));
    wait_connected(&applier).await;
    assert!(applier
        .apply(&session, &ChangedFile::new("a.src"), &sample_batch(), &cancel)
        .await);

    // Target restarted.
    session.begin_iteration();
    applier.initialize(&mut session, &cancel).await.unwrap();
    assert_eq!(first_agent.await.unwrap().unwrap(), 1);

    let second = AgentClient::connect(&channel).await.unwrap();
    let second_agent = tokio::spawn(second.serve(|_| ApplyResult::Success));
    wait_connected(&applier).await;
    assert!(applier
        .apply(&session, &ChangedFile::new("b.src"), &sample_batch(), &cancel)
        .await);

    drop(applier);
    assert_eq!(second_agent.await.unwrap().unwrap(), 1);
}

#[tokio::test]
async fn test_late_extra_ack_is_not_taken_as_next_reply() {
    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let applier = AgentDeltaApplier::new(channel.clone(), Duration::from_secs(2), None);
    let cancel = CancellationToken::new();
    applier.initialize(&mut session, &cancel).await.unwrap();

    let mut client = AgentClient::connect(&channel).await.unwrap();
    wait_connected(&applier).await;

    let agent = tokio::spawn(async move {
        client.next_payload().await.unwrap();
        client.respond(ApplyResult::Success).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.acknowledge(ApplyResult::SuccessRefreshBrowser.as_byte()).await.unwrap();
        client
    });

    assert!(applier
        .apply(&session, &ChangedFile::new("a.src"), &sample_batch(), &cancel)
        .await);
    let mut client = agent.await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    assert!(!applier
        .apply(&session, &ChangedFile::new("b.src"), &sample_batch(), &cancel)
        .await);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(!applier.is_connected().await);

    // The second request was never sent; the channel was closed instead.
    assert!(client.next_payload().await.unwrap().is_none());
}

#[tokio::test]
async fn test_departed_agent_is_not_connected() {
    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let applier = AgentDeltaApplier::new(channel.clone(), Duration::from_secs(2), None);
    let cancel = CancellationToken::new();
    applier.initialize(&mut session, &cancel).await.unwrap();

    let client = AgentClient::connect(&channel).await.unwrap();
    wait_connected(&applier).await;
    drop(client);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    assert!(!applier
        .apply(&session, &ChangedFile::new("Component.src"), &sample_batch(), &cancel)
        .await);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(!applier.is_connected().await);
}
