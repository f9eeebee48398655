//! Per-connection session loop.
//!
//! A session owns one connection's transport halves. It announces the
//! connection id, routes inbound events through the hub, drains the
//! connection's outbox onto the sink and probes liveness on a fixed
//! interval. Whatever ends the loop, the connection is removed from the
//! hub exactly once before the sink is closed.

use crate::config::HeartbeatConfig;
use crate::metrics;
use relay_core::Hub;
use relay_protocol::{codes, ClientEvent, ConnectionId, ServerEvent};
use relay_transport::{EventSink, EventSource, Received, TransportError};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the connection.
    Closed,
    /// Nothing was heard from the peer within the heartbeat timeout.
    TimedOut,
    /// The transport failed.
    TransportFailed,
}

/// Drive a connection until it closes.
pub async fn run<S, K>(
    connection_id: ConnectionId,
    mut source: S,
    mut sink: K,
    hub: &Hub,
    heartbeat: &HeartbeatConfig,
) -> SessionEnd
where
    S: EventSource,
    K: EventSink,
{
    let mut outbox = hub.connect(connection_id.clone());

    let connected = ServerEvent::Connected {
        id: connection_id.clone(),
    };
    let end = if let Err(e) = sink.send(&connected).await {
        warn!(connection = %connection_id, error = %e, "Failed to send connected event");
        SessionEnd::TransportFailed
    } else {
        info!(connection = %connection_id, "Client connected");

        let interval = heartbeat.interval();
        let timeout = heartbeat.timeout();
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                biased;

                Some(event) = outbox.recv() => {
                    if let Err(e) = sink.send(&event).await {
                        debug!(connection = %connection_id, error = %e, "Send failed");
                        break SessionEnd::TransportFailed;
                    }
                    metrics::record_event(event.name(), "outbound");
                }

                received = source.recv() => match received {
                    Ok(Some(Received::Event(event))) => {
                        last_seen = Instant::now();
                        route(hub, &connection_id, event);
                    }
                    Ok(Some(Received::Heartbeat)) => {
                        last_seen = Instant::now();
                    }
                    Ok(None) => break SessionEnd::Closed,
                    Err(e) if e.is_recoverable() => {
                        last_seen = Instant::now();
                        reject(hub, &connection_id, &e);
                    }
                    Err(e) => {
                        warn!(connection = %connection_id, error = %e, "Transport error");
                        metrics::record_error("transport");
                        break SessionEnd::TransportFailed;
                    }
                },

                _ = ticker.tick() => {
                    if last_seen.elapsed() >= timeout {
                        info!(connection = %connection_id, "Heartbeat timeout");
                        break SessionEnd::TimedOut;
                    }
                    if let Err(e) = sink.ping().await {
                        debug!(connection = %connection_id, error = %e, "Ping failed");
                        break SessionEnd::TransportFailed;
                    }
                }
            }
        }
    };

    let notified = hub.disconnect(&connection_id);
    metrics::set_active_rooms(hub.room_count());
    if let Err(e) = sink.close().await {
        debug!(connection = %connection_id, error = %e, "Close failed");
    }

    info!(connection = %connection_id, reason = ?end, notified, "Client disconnected");
    end
}

/// Route one inbound event, answering a rejected one with an error event.
fn route(hub: &Hub, connection_id: &ConnectionId, event: ClientEvent) {
    let name = event.name();
    let start = std::time::Instant::now();
    debug!(connection = %connection_id, event = name, room = event.room_id(), "Inbound event");
    metrics::record_event(name, "inbound");

    match hub.handle(connection_id, event) {
        Ok(delivered) => {
            debug!(connection = %connection_id, event = name, delivered, "Event routed");
        }
        Err(e) => {
            warn!(connection = %connection_id, event = name, error = %e, "Event rejected");
            metrics::record_error("rejected");
            hub.send_to(connection_id, e.to_event());
        }
    }

    if matches!(name, "join-room" | "leave-room") {
        metrics::set_active_rooms(hub.room_count());
    }
    metrics::record_latency(start.elapsed().as_secs_f64());
}

/// Answer an unreadable message. The connection stays open.
fn reject(hub: &Hub, connection_id: &ConnectionId, error: &TransportError) {
    warn!(connection = %connection_id, error = %error, "Malformed message");
    metrics::record_error("malformed");
    hub.send_to(
        connection_id,
        ServerEvent::error(codes::MALFORMED_EVENT, error.to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::RouterConfig;
    use relay_protocol::client;
    use relay_transport::memory::{self, MemoryPeer};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    fn id(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    fn spawn_session(hub: &Arc<Hub>, name: &str) -> (MemoryPeer, JoinHandle<SessionEnd>) {
        let (source, sink, peer) = memory::channel();
        let hub = Arc::clone(hub);
        let connection_id = id(name);
        let handle = tokio::spawn(async move {
            run(
                connection_id,
                source,
                sink,
                &hub,
                &HeartbeatConfig::default(),
            )
            .await
        });
        (peer, handle)
    }

    async fn expect(peer: &mut MemoryPeer, expected: ServerEvent) {
        assert_eq!(peer.recv().await, Some(expected));
    }

    #[tokio::test]
    async fn test_two_clients_reach_ready_to_call() {
        let hub = Arc::new(Hub::new());
        let (mut a, _) = spawn_session(&hub, "a");
        let (mut b, _) = spawn_session(&hub, "b");

        expect(&mut a, ServerEvent::Connected { id: id("a") }).await;
        expect(&mut b, ServerEvent::Connected { id: id("b") }).await;

        a.send_text(r#"{"event":"join-room","data":"room-1"}"#);
        expect(
            &mut a,
            ServerEvent::RoomUsers {
                count: 1,
                users: vec![id("a")],
            },
        )
        .await;

        b.send(ClientEvent::JoinRoom("room-1".into()));
        let both = ServerEvent::RoomUsers {
            count: 2,
            users: vec![id("a"), id("b")],
        };
        expect(&mut b, both.clone()).await;
        expect(&mut b, ServerEvent::ReadyToCall).await;
        expect(&mut a, ServerEvent::UserJoined(id("b"))).await;
        expect(&mut a, both).await;
        expect(&mut a, ServerEvent::ReadyToCall).await;

        a.send(ClientEvent::Offer(client::Offer {
            room_id: "room-1".into(),
            offer: json!({"type": "offer", "sdp": "v=0"}),
        }));
        expect(
            &mut b,
            ServerEvent::Offer(relay_protocol::server::Offer {
                offer: json!({"type": "offer", "sdp": "v=0"}),
                from: id("a"),
            }),
        )
        .await;
        assert!(a.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_malformed_message_keeps_session_open() {
        let hub = Arc::new(Hub::new());
        let (mut peer, _) = spawn_session(&hub, "a");
        expect(&mut peer, ServerEvent::Connected { id: id("a") }).await;

        peer.send_text("not json");
        match peer.recv().await {
            Some(ServerEvent::Error { code, .. }) => assert_eq!(code, codes::MALFORMED_EVENT),
            other => panic!("expected error event, got {:?}", other),
        }

        peer.send_text(r#"{"event":"join-room","data":"r"}"#);
        expect(
            &mut peer,
            ServerEvent::RoomUsers {
                count: 1,
                users: vec![id("a")],
            },
        )
        .await;
    }

    #[tokio::test]
    async fn test_rejected_join_reports_error() {
        let hub = Arc::new(Hub::with_config(RouterConfig {
            max_room_size: Some(1),
            ..RouterConfig::default()
        }));
        let (mut a, _) = spawn_session(&hub, "a");
        let (mut b, _) = spawn_session(&hub, "b");
        expect(&mut a, ServerEvent::Connected { id: id("a") }).await;
        expect(&mut b, ServerEvent::Connected { id: id("b") }).await;

        a.send(ClientEvent::JoinRoom("solo".into()));
        expect(
            &mut a,
            ServerEvent::RoomUsers {
                count: 1,
                users: vec![id("a")],
            },
        )
        .await;

        b.send(ClientEvent::JoinRoom("solo".into()));
        match b.recv().await {
            Some(ServerEvent::Error { code, .. }) => assert_eq!(code, codes::ROOM_FULL),
            other => panic!("expected error event, got {:?}", other),
        }
        assert_eq!(hub.router().room_len("solo"), 1);
    }

    #[tokio::test]
    async fn test_hang_up_notifies_room() {
        let hub = Arc::new(Hub::new());
        let (mut a, _) = spawn_session(&hub, "a");
        let (mut b, b_session) = spawn_session(&hub, "b");
        expect(&mut a, ServerEvent::Connected { id: id("a") }).await;
        expect(&mut b, ServerEvent::Connected { id: id("b") }).await;

        a.send(ClientEvent::JoinRoom("r".into()));
        a.recv().await;
        b.send(ClientEvent::JoinRoom("r".into()));
        for _ in 0..3 {
            a.recv().await;
        }

        b.hang_up();
        assert_eq!(b_session.await.unwrap(), SessionEnd::Closed);
        expect(&mut a, ServerEvent::UserLeft(id("b"))).await;
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.router().members("r"), vec![id("a")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let hub = Arc::new(Hub::new());
        let (mut peer, session) = spawn_session(&hub, "a");
        expect(&mut peer, ServerEvent::Connected { id: id("a") }).await;
        peer.send(ClientEvent::JoinRoom("r".into()));

        assert_eq!(session.await.unwrap(), SessionEnd::TimedOut);
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_keep_session_alive() {
        let hub = Arc::new(Hub::new());
        let (mut peer, session) = spawn_session(&hub, "a");
        expect(&mut peer, ServerEvent::Connected { id: id("a") }).await;

        for _ in 0..6 {
            time::sleep(Duration::from_secs(20)).await;
            assert!(peer.heartbeat());
        }
        assert!(!session.is_finished());
        assert_eq!(hub.connection_count(), 1);

        peer.hang_up();
        assert_eq!(session.await.unwrap(), SessionEnd::Closed);
    }
}
