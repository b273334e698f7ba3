//! Registry and session lifecycle: pooling, sweep timeouts, LRU eviction.

use std::sync::Arc;
use std::time::Duration;
use strand_client::{
    ConnectionRegistry, RegistryConfig, RegistryError, SessionError, SessionState,
};
use strand_thread::RunRequest;
use strand_transport::{AuthHeaders, RunOptions, StaticTokenProvider, Transport};

fn transport() -> Transport {
    Transport::new(
        "http://127.0.0.1:9",
        AuthHeaders::none(),
        Arc::new(StaticTokenProvider(AuthHeaders::none())),
    )
    .unwrap()
}

fn short_config() -> RegistryConfig {
    RegistryConfig {
        // Keep the background sweeper quiet; tests drive sweep_now().
        sweep_interval: Duration::from_secs(7 * 24 * 60 * 60),
        room_inactivity: Duration::from_secs(30 * 60),
        server_inactivity: Duration::from_secs(60 * 60),
        suspend_after: Duration::from_secs(24 * 60 * 60),
        max_backgrounded: 2,
    }
}

#[tokio::test]
async fn server_registration_is_strict() {
    let registry = ConnectionRegistry::new(RegistryConfig::default());
    registry.register_server("srv", transport()).unwrap();
    assert!(matches!(
        registry.register_server("srv", transport()),
        Err(RegistryError::DuplicateServer { .. })
    ));
    assert!(matches!(
        registry.session("ghost", "room1"),
        Err(RegistryError::UnknownServer { .. })
    ));
    registry.shutdown();
}

#[tokio::test]
async fn sessions_are_pooled_per_room() {
    let registry = ConnectionRegistry::new(RegistryConfig::default());
    registry.register_server("srv", transport()).unwrap();

    let a = registry.session("srv", "room1").unwrap();
    let b = registry.session("srv", "room1").unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let other = registry.session("srv", "room2").unwrap();
    assert!(!Arc::ptr_eq(&a, &other));
    registry.shutdown();
}

#[tokio::test]
async fn disposed_session_is_replaced_on_next_access() {
    let registry = ConnectionRegistry::new(RegistryConfig::default());
    let server = registry.register_server("srv", transport()).unwrap();

    let first = server.session("room1");
    first.dispose();
    let second = server.session("room1");
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.state(), SessionState::Active);
    registry.shutdown();
}

#[tokio::test(start_paused = true)]
async fn idle_active_room_is_backgrounded_by_sweep() {
    let registry = ConnectionRegistry::new(short_config());
    let server = registry.register_server("srv", transport()).unwrap();
    let session = server.session("room1");

    tokio::time::advance(Duration::from_secs(31 * 60)).await;
    registry.sweep_now();
    assert_eq!(session.state(), SessionState::Backgrounded);
    registry.shutdown();
}

#[tokio::test(start_paused = true)]
async fn backgrounded_room_is_suspended_then_disposed() {
    let registry = ConnectionRegistry::new(short_config());
    let server = registry.register_server("srv", transport()).unwrap();
    let session = server.session("room1");
    session.background().unwrap();

    tokio::time::advance(Duration::from_secs(25 * 60 * 60)).await;
    registry.sweep_now();
    assert_eq!(session.state(), SessionState::Suspended);

    registry.sweep_now();
    assert!(session.is_disposed());
    assert!(server.sessions().is_empty());
    registry.shutdown();
}

#[tokio::test(start_paused = true)]
async fn lru_cap_evicts_oldest_backgrounded_sessions() {
    let registry = ConnectionRegistry::new(short_config());
    let server = registry.register_server("srv", transport()).unwrap();

    let mut sessions = Vec::new();
    for room in ["r1", "r2", "r3", "r4"] {
        let session = server.session(room);
        session.background().unwrap();
        sessions.push(session);
        tokio::time::advance(Duration::from_secs(1)).await;
    }

    registry.sweep_now();

    // Cap is 2: the two least-recently-used are disposed.
    assert!(sessions[0].is_disposed());
    assert!(sessions[1].is_disposed());
    assert_eq!(sessions[2].state(), SessionState::Backgrounded);
    assert_eq!(sessions[3].state(), SessionState::Backgrounded);
    assert_eq!(server.sessions().len(), 2);
    registry.shutdown();
}

#[tokio::test(start_paused = true)]
async fn idle_server_with_no_sessions_is_dropped() {
    let registry = ConnectionRegistry::new(short_config());
    let server = registry.register_server("srv", transport()).unwrap();
    server.session("room1").dispose();
    registry.sweep_now();

    tokio::time::advance(Duration::from_secs(61 * 60)).await;
    registry.sweep_now();
    assert!(registry.server("srv").is_none());
    registry.shutdown();
}

#[tokio::test]
async fn backgrounding_cancels_in_flight_run() {
    let (base_url, _server) = strand_transport::testing::start_stalled_sse_server()
        .await
        .unwrap();
    let registry = ConnectionRegistry::new(RegistryConfig::default());
    let server = registry
        .register_server(
            "srv",
            Transport::new(
                &base_url,
                AuthHeaders::none(),
                Arc::new(StaticTokenProvider(AuthHeaders::none())),
            )
            .unwrap(),
        )
        .unwrap();
    let session = server.session("room1");

    let runner = session.clone();
    let run_transport = server.transport().clone();
    let handle = tokio::spawn(async move {
        runner
            .start_run(
                &run_transport,
                RunRequest::new("run_1", "hello"),
                RunOptions::default(),
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.state(), SessionState::Streaming);
    session.background().unwrap();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(SessionError::Run(_))));
    assert_eq!(session.state(), SessionState::Backgrounded);
    registry.shutdown();
}

#[tokio::test]
async fn start_run_requires_active_state() {
    let registry = ConnectionRegistry::new(RegistryConfig::default());
    let server = registry.register_server("srv", transport()).unwrap();
    let session = server.session("room1");
    session.background().unwrap();

    let result = session
        .start_run(
            server.transport(),
            RunRequest::new("run_1", "hello"),
            RunOptions::default(),
        )
        .await;
    assert!(matches!(
        result,
        Err(SessionError::InvalidTransition { .. })
    ));
    registry.shutdown();
}
