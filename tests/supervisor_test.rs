//! Message flow through one supervised connection

mod common;

use std::time::Duration;

use common::{echo_agent, inbound_dm, inbound_mention, test_context, MockGateway, SessionProbe};
use hydra::pool::{Backoff, ConnectionSupervisor, LifecycleState, PoolContext};
use std::sync::Arc;

fn test_backoff() -> Backoff {
    Backoff::new(Duration::from_millis(20), Duration::from_millis(200))
}

async fn wait_sent(probe: &SessionProbe, count: usize) -> Vec<(String, String)> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let sent = probe.sent().await;
        if sent.len() >= count || tokio::time::Instant::now() >= deadline {
            return sent;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn spawn_running(
    gateway: &Arc<MockGateway>,
    ctx: Arc<PoolContext>,
    config: hydra::agents::config::AgentConfig,
) -> (hydra::pool::ConnectionHandle, SessionProbe) {
    let handle = ConnectionSupervisor::spawn(config, ctx, test_backoff()).expect("valid config");
    assert!(
        common::wait_for(Duration::from_secs(2), || {
            handle.state() == LifecycleState::Running
        })
        .await
    );
    let probe = gateway.latest_probe().expect("session established");
    (handle, probe)
}

#[tokio::test]
async fn dm_gets_an_echo_reply_in_its_channel() {
    let gateway = MockGateway::new();
    let ctx = test_context(gateway.clone());

    let (_handle, probe) = spawn_running(&gateway, ctx.clone(), echo_agent(1, "alpha")).await;

    probe.push(inbound_dm("user-1", "hello there")).await;

    let sent = wait_sent(&probe, 1).await;
    assert_eq!(sent, vec![("dm-user-1".to_string(), "hello there".to_string())]);

    // both sides of the exchange were recorded under the author's scope
    let history = ctx.memory.history(1, "user-1").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].text, "hello there");
    assert_eq!(history[1].text, "hello there");
}

#[tokio::test]
async fn guild_message_requires_a_mention() {
    let gateway = MockGateway::new();
    let ctx = test_context(gateway.clone());

    let (_handle, probe) = spawn_running(&gateway, ctx, echo_agent(1, "alpha")).await;

    let mut unaddressed = inbound_mention("user-1", "chan-1", "just chatting");
    unaddressed.mentions.clear();
    probe.push(unaddressed).await;
    probe.push(inbound_mention("user-1", "chan-1", "ping")).await;

    let sent = wait_sent(&probe, 1).await;
    assert_eq!(sent, vec![("chan-1".to_string(), "ping".to_string())]);
}

#[tokio::test]
async fn dm_is_dropped_when_disabled() {
    let gateway = MockGateway::new();
    let ctx = test_context(gateway.clone());

    let mut config = echo_agent(1, "alpha");
    config.respond_to_dm = false;
    let (_handle, probe) = spawn_running(&gateway, ctx, config).await;

    probe.push(inbound_dm("user-1", "hello?")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(probe.sent().await.is_empty());
}

#[tokio::test]
async fn replies_within_one_scope_keep_arrival_order() {
    let gateway = MockGateway::new();
    let ctx = test_context(gateway.clone());

    let (_handle, probe) = spawn_running(&gateway, ctx, echo_agent(1, "alpha")).await;

    for i in 0..5 {
        probe.push(inbound_dm("user-1", &format!("message {i}"))).await;
    }

    let sent = wait_sent(&probe, 5).await;
    let texts: Vec<&str> = sent.iter().map(|(_, text)| text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["message 0", "message 1", "message 2", "message 3", "message 4"]
    );
}

#[tokio::test]
async fn long_reply_is_sent_in_chunks() {
    let gateway = MockGateway::new();
    let ctx = test_context(gateway.clone());

    let (_handle, probe) = spawn_running(&gateway, ctx.clone(), echo_agent(1, "alpha")).await;

    let long = "a word. ".repeat(600);
    probe.push(inbound_dm("user-1", &long)).await;

    let sent = wait_sent(&probe, 2).await;
    assert!(sent.len() > 1);
    for (_, chunk) in &sent {
        assert!(chunk.chars().count() <= 2_000);
    }

    // memory keeps the unchunked reply
    let history = ctx.memory.history(1, "user-1").await;
    assert_eq!(history[1].text.trim_end(), long.trim_end());
}

#[tokio::test]
async fn lost_event_stream_marks_the_connection_errored() {
    let gateway = MockGateway::new();
    let ctx = test_context(gateway.clone());

    let (handle, probe) = spawn_running(&gateway, ctx, echo_agent(1, "alpha")).await;

    probe.sever().await;
    assert!(
        common::wait_for(Duration::from_secs(2), || {
            matches!(handle.state(), LifecycleState::Errored(_))
        })
        .await
    );
}

#[tokio::test]
async fn stop_aborts_a_reply_still_in_flight_within_the_grace() {
    let gateway = MockGateway::new();
    // every send stalls far longer than the 500ms stop grace
    gateway.set_send_delay(Duration::from_secs(30));
    let ctx = test_context(gateway.clone());

    let (mut handle, probe) = spawn_running(&gateway, ctx, echo_agent(1, "alpha")).await;

    probe.push(inbound_dm("user-1", "still thinking")).await;
    // let the scope worker pick the message up and block inside the send
    tokio::time::sleep(Duration::from_millis(50)).await;

    let issued = tokio::time::Instant::now();
    handle.request_stop();
    assert!(
        common::wait_for(Duration::from_secs(2), || {
            handle.state() == LifecycleState::Stopped
        })
        .await
    );
    assert!(
        issued.elapsed() < Duration::from_millis(1_500),
        "stop must not wait out the stalled send"
    );
    assert!(probe.sent().await.is_empty(), "the late reply is dropped");
    assert!(common::wait_for(Duration::from_secs(2), || handle.is_finished()).await);
}

#[tokio::test]
async fn requested_stop_disconnects_and_settles_stopped() {
    let gateway = MockGateway::new();
    let ctx = test_context(gateway.clone());

    let (mut handle, probe) = spawn_running(&gateway, ctx, echo_agent(1, "alpha")).await;

    handle.request_stop();
    assert!(
        common::wait_for(Duration::from_secs(2), || {
            handle.state() == LifecycleState::Stopped
        })
        .await
    );
    assert!(probe.is_disconnected());
    assert!(common::wait_for(Duration::from_secs(2), || handle.is_finished()).await);
}
