//! End-to-end tests for the WebSocket gateway
//!
//! Each test spawns its own server on an ephemeral port.

use anyhow::Result;
use integration_tests::*;
use reqwest::StatusCode;
use socket_gateway::hooks::HookType;
use socket_gateway::{App, Pipeline};

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let server = TestServer::start().await?;

    let response = server.get("/health").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

#[tokio::test]
async fn test_handshake_is_first_frame() -> Result<()> {
    let server = TestServer::start().await?;
    let mut hooks = server.hooks();

    let client = server.connect().await?;
    assert!(!client.owner_id.is_empty());

    let added = hooks.recv_type(HookType::ClientAdded).await.expect("hook");
    assert_eq!(added.data, client.owner_id);
    server.wait_for_sessions(1).await?;

    Ok(())
}

#[tokio::test]
async fn test_unknown_action_keeps_connection_open() -> Result<()> {
    let server = TestServer::start().await?;
    let mut hooks = server.hooks();
    let mut client = server.connect().await?;

    client.send("RANDOM", "").await?;
    let reply = client.recv().await?;
    assert_eq!(reply.action, "ERR_HANDLER");
    assert_eq!(reply.payload, "cannot define handler: RANDOM");

    let error = hooks.recv_type(HookType::Error).await.expect("hook");
    assert_eq!(error.data, "cannot define handler: RANDOM");

    // Still usable afterwards
    client.send("RANDOM", "").await?;
    assert_eq!(client.recv().await?.action, "ERR_HANDLER");
    assert_eq!(server.app.clients().session_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() -> Result<()> {
    let server = TestServer::start().await?;
    let mut sender = server.connect().await?;
    let mut receiver = server.connect().await?;

    sender.send_raw("{definitely not json").await?;
    let reply = sender.recv().await?;
    assert_eq!(reply.action, "ERR_DECODE");
    assert!(reply.payload.starts_with("cannot decode your message"));

    let payload = serde_json::json!({
        "receiverId": receiver.owner_id,
        "message": "still here",
    });
    sender.send("SEND_MESSAGE", &payload.to_string()).await?;

    let delivered = receiver.recv().await?;
    assert_eq!(delivered.action, "NEW_MESSAGE");
    assert_eq!(delivered.payload, "still here");

    Ok(())
}

#[tokio::test]
async fn test_direct_message_reaches_every_device() -> Result<()> {
    let server = TestServer::start_with(sample_app(secured_config()).build()).await?;
    let mut alice = server.connect_as("alice").await?;
    let mut bob_phone = server.connect_as("bob").await?;
    let mut bob_laptop = server.connect_as("bob").await?;
    server.wait_for_sessions(3).await?;

    assert_eq!(server.app.clients().owner_count(), 2);

    alice
        .send("SEND_MESSAGE", r#"{"receiverId":"bob","message":"Hello"}"#)
        .await?;

    for device in [&mut bob_phone, &mut bob_laptop] {
        let frame = device.recv().await?;
        assert_eq!(frame.action, "NEW_MESSAGE");
        assert_eq!(frame.payload, "Hello");
    }

    Ok(())
}

#[tokio::test]
async fn test_message_to_offline_owner_is_noop() -> Result<()> {
    let server = TestServer::start().await?;
    let mut client = server.connect().await?;

    client
        .send("SEND_MESSAGE", r#"{"receiverId":"nobody","message":"hi"}"#)
        .await?;
    client.send("RANDOM", "").await?;

    // The first reply is for RANDOM: the message itself produced no error frame.
    assert_eq!(client.recv().await?.action, "ERR_HANDLER");

    Ok(())
}

#[tokio::test]
async fn test_disconnect_emits_single_close_hook() -> Result<()> {
    let server = TestServer::start().await?;
    let mut hooks = server.hooks();
    let client = server.connect().await?;
    server.wait_for_sessions(1).await?;

    client.close().await?;
    server.wait_for_sessions(0).await?;

    let mut closed = 0;
    while let Some(hook) = hooks.try_recv() {
        if hook.hook_type == HookType::ClientClosedConnection {
            closed += 1;
        }
    }
    assert_eq!(closed, 1);
    assert!(server.app.clients().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_throttle_closes_after_allowed_attempts() -> Result<()> {
    let server = TestServer::start().await?;
    let mut client = server.connect().await?;
    let allowed = server.app.config().session.attempts_allowed;

    for _ in 0..allowed {
        client.send_raw("garbage").await?;
    }
    for _ in 0..allowed {
        assert_eq!(client.recv().await?.action, "ERR_DECODE");
    }

    client.expect_closed().await?;
    server.wait_for_sessions(0).await?;

    Ok(())
}

#[tokio::test]
async fn test_success_resets_throttle() -> Result<()> {
    let server = TestServer::start().await?;
    let mut client = server.connect().await?;
    let allowed = server.app.config().session.attempts_allowed;

    for _ in 0..3 {
        for _ in 1..allowed {
            client.send_raw("garbage").await?;
            assert_eq!(client.recv().await?.action, "ERR_DECODE");
        }
        client
            .send("SEND_MESSAGE", r#"{"receiverId":"nobody","message":"ok"}"#)
            .await?;
    }

    client.send("RANDOM", "").await?;
    assert_eq!(client.recv().await?.action, "ERR_HANDLER");
    assert_eq!(server.app.clients().session_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_pipeline_broadcast_reaches_everyone() -> Result<()> {
    let server = TestServer::start().await?;
    let mut sender = server.connect().await?;
    let mut other = server.connect().await?;
    server.wait_for_sessions(2).await?;

    sender
        .send_raw(r#"{"actionType":"BROADCAST","data":"hello all"}"#)
        .await?;

    for client in [&mut sender, &mut other] {
        let frame = client.recv().await?;
        assert_eq!(frame.action, "NOTICE");
        let notice: serde_json::Value = serde_json::from_str(&frame.payload)?;
        assert_eq!(notice["message"], "hello all");
    }

    Ok(())
}

#[tokio::test]
async fn test_pipeline_missing_trigger_is_reported() -> Result<()> {
    let app = App::builder(test_config())
        .pipeline(Pipeline::new().on_action(
            socket_gateway::pipeline::BroadcastAction::ACTION,
            socket_gateway::pipeline::BroadcastAction,
        ))
        .build();
    let server = TestServer::start_with(app).await?;
    let mut client = server.connect().await?;

    client.send("BROADCAST", "hi").await?;
    let reply = client.recv().await?;
    assert_eq!(reply.action, "ERR_HANDLER");
    assert!(reply.payload.contains("NOTIFY_ALL"));

    Ok(())
}

#[tokio::test]
async fn test_secured_gateway_rejects_missing_token() -> Result<()> {
    let server = TestServer::start_with(sample_app(secured_config()).build()).await?;

    let result = WsClient::connect(&server.ws_url(), None).await;
    assert!(result.is_err());

    let result = WsClient::connect(&server.ws_url(), Some("not-a-token")).await;
    assert!(result.is_err());
    assert!(server.app.clients().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_secured_gateway_uses_token_owner() -> Result<()> {
    let server = TestServer::start_with(sample_app(secured_config()).build()).await?;

    let client = server.connect_as("carol").await?;
    assert_eq!(client.owner_id, "carol");
    server.wait_for_sessions(1).await?;
    assert_eq!(server.app.clients().sessions("carol").len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_server_started_hook() -> Result<()> {
    let app = sample_app(test_config()).build();
    let mut hooks = app.hooks().subscribe();

    let server = TestServer::start_with(app).await?;
    let started = hooks.recv_type(HookType::ServerStarted).await.expect("hook");
    assert!(started.data.contains(&server.addr.to_string()));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_listening_client_survives_idle_deadline() -> Result<()> {
    let mut config = test_config();
    config.session.idle_timeout_secs = 1;
    let server = TestServer::start_with(sample_app(config).build()).await?;

    let mut listener = server.connect().await?;
    let mut sender = server.connect().await?;
    server.wait_for_sessions(2).await?;

    let payload = serde_json::json!({
        "receiverId": listener.owner_id,
        "message": "push",
    })
    .to_string();

    // Pushes span several deadlines; the listener never sends a frame itself.
    let pushes = 8;
    let send_all = async {
        for _ in 0..pushes {
            tokio::time::sleep(std::time::Duration::from_millis(400)).await;
            sender.send("SEND_MESSAGE", &payload).await?;
        }
        anyhow::Ok(())
    };
    let receive_all = async {
        for _ in 0..pushes {
            let frame = listener.recv().await?;
            assert_eq!(frame.action, "NEW_MESSAGE");
        }
        anyhow::Ok(())
    };
    let (sent, received) = tokio::join!(send_all, receive_all);
    sent?;
    received?;

    assert_eq!(server.app.clients().session_count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_silent_client_is_dropped_after_deadline() -> Result<()> {
    let mut config = test_config();
    config.session.idle_timeout_secs = 1;
    let server = TestServer::start_with(sample_app(config).build()).await?;
    let mut hooks = server.hooks();

    // A raw client that never reads cannot answer pings.
    let _client = server.connect().await?;
    server.wait_for_sessions(1).await?;

    let error = hooks.recv_type(HookType::Error).await.expect("hook");
    assert!(error.data.contains("idle"));
    server.wait_for_sessions(0).await?;

    Ok(())
}
