use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use deltawatch_core::{
    ApplyResult, BrowserNotice, ChangedFile, CompileOutput, HotReloadError, WatchSession,
    STARTUP_HOOKS_VAR,
};
use deltawatch_daemon::{AgentClient, HotReloadOrchestrator};
use tokio_util::sync::CancellationToken;

use crate::{config_for, sample_batch, unique_channel, MockBrowser, MockCompiler, MockStaticFiles};

fn static_files(handled: bool) -> Arc<MockStaticFiles> {
    let mut static_files = MockStaticFiles::new();
    static_files.expect_try_handle().returning(move |_, _, _| handled);
    Arc::new(static_files)
}

fn compiler_with_updates() -> Arc<MockCompiler> {
    let mut compiler = MockCompiler::new();
    compiler
        .expect_compile()
        .returning(|_, _, _| Ok(CompileOutput::updates(sample_batch())));
    Arc::new(compiler)
}

/// Retry until the agent's connection has been accepted
async fn handle_when_connected(
    orchestrator: &HotReloadOrchestrator,
    session: &WatchSession,
    file: &str,
    cancel: &CancellationToken,
) -> bool {
    for _ in 0..100 {
        if orchestrator
            .try_handle_file_change(session, &ChangedFile::new(file), cancel)
            .await
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_static_change_skips_compilation() {
    let mut compiler = MockCompiler::new();
    compiler.expect_compile().never();

    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let cancel = CancellationToken::new();
    let mut orchestrator = HotReloadOrchestrator::new(static_files(true), Arc::new(compiler), None);
    orchestrator.initialize(&mut session, &cancel).await.unwrap();

    assert!(orchestrator
        .try_handle_file_change(&session, &ChangedFile::new("wwwroot/site.css"), &cancel)
        .await);
}

#[tokio::test]
async fn test_compiler_failure_falls_through() {
    let mut compiler = MockCompiler::new();
    compiler
        .expect_compile()
        .returning(|_, _, _| Err(HotReloadError::compilation("workspace not loaded")));

    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let cancel = CancellationToken::new();
    let mut orchestrator =
        HotReloadOrchestrator::new(static_files(false), Arc::new(compiler), None);
    orchestrator.initialize(&mut session, &cancel).await.unwrap();

    assert!(!orchestrator
        .try_handle_file_change(&session, &ChangedFile::new("Component.src"), &cancel)
        .await);
}

#[tokio::test]
async fn test_diagnostics_reach_browser() {
    let mut compiler = MockCompiler::new();
    compiler
        .expect_compile()
        .returning(|_, _, _| {
            Ok(CompileOutput::diagnostics(vec!["error: unknown name `x`".to_string()]))
        });

    let mut browser = MockBrowser::new();
    browser
        .expect_send()
        .withf(|notice, _| *notice == BrowserNotice::diagnostics(["error: unknown name `x`"]))
        .times(1)
        .returning(|_, _| Ok(()));
    browser.expect_reload().never();

    let channel = unique_channel();
    let mut session = WatchSession::new(config_for(&channel));
    let cancel = CancellationToken::new();
    let mut orchestrator = HotReloadOrchestrator::new(
        static_files(false),
        Arc::new(compiler),
        Some(Arc::new(browser)),
    );
    orchestrator.initialize(&mut session, &cancel).await.unwrap();

    assert!(!orchestrator
        .try_handle_file_change(&session, &ChangedFile::new("Component.src"), &cancel)
        .await);

    if let Some(compilation) = orchestrator.compilation() {
        compilation.settle_diagnostics().await;
    }
}

#[tokio::test]
async fn test_agent_round_trip_across_restarts() {
    let mut browser = MockBrowser::new();
    browser
        .expect_send()
        .withf(|notice, _| *notice == BrowserNotice::HotReloadApplied)
        .times(2)
        .returning(|_, _| Ok(()));
    browser.expect_reload().never();

    let channel = unique_channel();
    let agent_path = PathBuf::from("/opt/deltawatch/agent.so");
    let mut config = config_for(&channel);
    config.agent_path = Some(agent_path);

    let mut session = WatchSession::new(config);
    let cancel = CancellationToken::new();
    let mut orchestrator = HotReloadOrchestrator::new(
        static_files(false),
        compiler_with_updates(),
        Some(Arc::new(browser)),
    );

    orchestrator.initialize(&mut session, &cancel).await.unwrap();
    assert_eq!(session.launch().get_env(STARTUP_HOOKS_VAR), Some("/opt/deltawatch/agent.so"));

    let first = AgentClient::connect(&channel).await.unwrap();
    let first_agent = tokio::spawn(first.serve(|_| ApplyResult::Success));
    assert!(handle_when_connected(&orchestrator, &session, "Component.src", &cancel).await);

    // Target restarted; the startup hook must not be added again.
    session.begin_iteration();
    orchestrator.initialize(&mut session, &cancel).await.unwrap();
    assert_eq!(session.launch().get_env(STARTUP_HOOKS_VAR), Some("/opt/deltawatch/agent.so"));
    assert_eq!(first_agent.await.unwrap().unwrap(), 1);

    let second = AgentClient::connect(&channel).await.unwrap();
    let second_agent = tokio::spawn(second.serve(|payload| {
        assert_eq!(payload.changed_file, "Component.src");
        ApplyResult::Success
    }));
    assert!(handle_when_connected(&orchestrator, &session, "Component.src", &cancel).await);

    drop(orchestrator);
    assert_eq!(second_agent.await.unwrap().unwrap(), 1);
}
