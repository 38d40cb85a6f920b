//! WebSocket handshake and per-connection tasks
//!
//! A peer is authenticated before the protocol switch, so a rejected
//! handshake gets a plain HTTP status: 400 when the request cannot be
//! upgraded, 401 when the credential or the profile behind it is not
//! accepted. After the switch the connection is registered with the hub and
//! served by two tasks:
//!
//! - the writer drains the outbound queue onto the socket and sends pings
//! - the reader watches the socket for close or error and discards inbound
//!   frames
//!
//! Either side ending unregisters the connection, which stops the other.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use rolecast_core::config::HubConfig;
use rolecast_core::models::{ModuleId, Profile};
use rolecast_core::service::JwtValidator;
use rolecast_hub::{Connection, Hub, OutboundQueue};
use serde::Deserialize;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::http::{AppError, AppResult, AppState};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: Option<String>,
}

/// `GET /ws/{token}/{module}`
pub async fn websocket_path_handler(
    State(state): State<AppState>,
    Path((token, module)): Path<(String, String)>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let ws = ws.map_err(upgrade_rejected)?;
    let profile = authenticate(&state, &token).await?;
    Ok(accept(ws, state, profile, module))
}

/// `GET /ws/{module}`
///
/// The credential comes from the `Authorization` header (`Bearer <token>` or
/// the bare token), or from the `token` query parameter for clients that
/// cannot set headers.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let ws = ws.map_err(upgrade_rejected)?;
    let token = credential_from_request(&headers, query)?;
    let profile = authenticate(&state, &token).await?;
    Ok(accept(ws, state, profile, module))
}

fn upgrade_rejected(rejection: WebSocketUpgradeRejection) -> AppError {
    debug!(error = %rejection, "WebSocket upgrade rejected");
    AppError::bad_request(rejection.body_text())
}

fn credential_from_request(headers: &HeaderMap, query: WsQuery) -> AppResult<String> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AppError::unauthorized("unauthorized"))?;
        return Ok(JwtValidator::extract_header_token(value)?);
    }

    query
        .token
        .ok_or_else(|| AppError::unauthorized("unauthorized"))
}

/// Verify the credential and resolve the profile it names
///
/// Every failure maps to the same 401 so peers learn nothing about which
/// check rejected them.
pub async fn authenticate(state: &AppState, token: &str) -> AppResult<Profile> {
    let validator = JwtValidator::new(Arc::clone(&state.verifier));

    let user_id = validator.validate_and_extract_user_id(token).map_err(|e| {
        warn!(error = %e, "Handshake rejected: invalid credential");
        AppError::from(e)
    })?;

    match state.profiles.resolve(&user_id).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => {
            warn!(user_id = %user_id, "Handshake rejected: profile not found");
            Err(AppError::unauthorized("unauthorized"))
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Handshake rejected: profile lookup failed");
            Err(AppError::unauthorized("unauthorized"))
        }
    }
}

fn accept(ws: WebSocketUpgrade, state: AppState, profile: Profile, module: String) -> Response {
    let config = state.hub_config.clone();
    let hub = state.hub;

    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, hub, profile, ModuleId::from(module), config))
}

async fn handle_socket(
    socket: WebSocket,
    hub: Hub,
    profile: Profile,
    module: ModuleId,
    config: HubConfig,
) {
    let (conn, queue) = Connection::new(
        profile.id.clone(),
        profile.role_set(),
        module,
        config.outbound_capacity,
    );

    info!(
        user_id = %conn.identity(),
        connection_id = %conn.id(),
        module = %conn.module(),
        "WebSocket connection established"
    );

    hub.register(Arc::clone(&conn));

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_loop(
        sink,
        queue,
        Arc::clone(&conn),
        hub.clone(),
        config.ping_interval(),
    ));

    read_loop(stream, &conn, &hub).await;

    if let Err(e) = writer.await {
        error!(connection_id = %conn.id(), "WebSocket writer task failed: {}", e);
    }

    info!(
        user_id = %conn.identity(),
        connection_id = %conn.id(),
        "WebSocket connection closed"
    );
}

/// Drain the outbound queue onto the socket until the connection closes
///
/// A failed send unregisters the connection. Once closed, a close frame is
/// sent on a best-effort basis and the sink is shut.
pub async fn write_loop<S>(
    mut sink: S,
    mut queue: OutboundQueue,
    conn: Arc<Connection>,
    hub: Hub,
    ping_interval: Option<Duration>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut heartbeat = ping_interval.and_then(|period| {
        let Some(start) = Instant::now().checked_add(period) else {
            warn!(
                connection_id = %conn.id(),
                period_secs = period.as_secs(),
                "Ping interval out of range, heartbeat disabled"
            );
            return None;
        };
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(interval)
    });

    loop {
        let sent = tokio::select! {
            frame = queue.next() => match frame {
                Some(frame) => sink.send(Message::Text((&*frame).into())).await,
                None => break,
            },
            () = tick(&mut heartbeat) => sink.send(Message::Ping(Bytes::new())).await,
        };

        if let Err(e) = sent {
            warn!(
                user_id = %conn.identity(),
                connection_id = %conn.id(),
                error = %e,
                "Failed to send WebSocket message"
            );
            hub.unregister(&conn);
            return;
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Watch the socket until the peer leaves or the connection is closed
///
/// Inbound frames are ignored. Unregisters the connection on the way out.
pub async fn read_loop<St, E>(mut stream: St, conn: &Arc<Connection>, hub: &Hub)
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        tokio::select! {
            () = conn.closed() => {
                debug!(connection_id = %conn.id(), "Connection closed by hub");
                break;
            }
            message = stream.next() => match message {
                Some(Ok(Message::Close(_))) | None => {
                    debug!(connection_id = %conn.id(), "Peer closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(
                        user_id = %conn.identity(),
                        connection_id = %conn.id(),
                        error = %e,
                        "WebSocket read failed"
                    );
                    break;
                }
            },
        }
    }

    hub.unregister(conn);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures::channel::mpsc;
    use mockall::mock;
    use rolecast_core::config::JwtConfig;
    use rolecast_core::models::{RoleSet, UserId};
    use rolecast_core::service::{JwtService, ProfileResolver};
    use tower::ServiceExt;

    mock! {
        pub Resolver {}

        #[async_trait]
        impl ProfileResolver for Resolver {
            async fn resolve(&self, user_id: &UserId) -> rolecast_core::Result<Option<Profile>>;
        }
    }

    fn jwt() -> JwtService {
        JwtService::new(&JwtConfig {
            secret: "test-secret".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn profile(id: &str, roles: &[&str]) -> Profile {
        Profile {
            id: UserId::from(id),
            name: id.to_string(),
            email: format!("{id}@example.com"),
            roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    fn state(resolver: MockResolver) -> AppState {
        AppState::new(
            Hub::spawn(),
            Arc::new(jwt()),
            Arc::new(resolver),
            HubConfig::default(),
        )
    }

    fn connection() -> (Arc<Connection>, OutboundQueue) {
        let roles: RoleSet = ["admin"].into_iter().collect();
        Connection::new(UserId::from("u1"), roles, ModuleId::from("1"), 8)
    }

    #[tokio::test]
    async fn test_authenticate_resolves_profile() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .withf(|id| id.as_str() == "u1")
            .times(1)
            .returning(|_| Ok(Some(profile("u1", &["admin"]))));
        let state = state(resolver);
        let token = jwt().sign_token(&UserId::from("u1")).unwrap();

        let resolved = authenticate(&state, &token).await.unwrap();
        assert_eq!(resolved.id.as_str(), "u1");
        assert!(resolved.role_set().contains("admin"));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_bad_token_without_lookup() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().never();
        let state = state(resolver);

        let err = authenticate(&state, "not-a-jwt").await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "unauthorized");
    }

    #[tokio::test]
    async fn test_authenticate_rejects_unknown_profile() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().returning(|_| Ok(None));
        let state = state(resolver);
        let token = jwt().sign_token(&UserId::from("ghost")).unwrap();

        let err = authenticate(&state, &token).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authenticate_hides_resolver_failure() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| Err(rolecast_core::Error::Internal("store down".into())));
        let state = state(resolver);
        let token = jwt().sign_token(&UserId::from("u1")).unwrap();

        let err = authenticate(&state, &token).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "unauthorized");
    }

    #[test]
    fn test_credential_prefers_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());
        let query = WsQuery {
            token: Some("from-query".to_string()),
        };

        assert_eq!(credential_from_request(&headers, query).unwrap(), "from-header");
    }

    #[test]
    fn test_credential_falls_back_to_query() {
        let query = WsQuery {
            token: Some("from-query".to_string()),
        };
        assert_eq!(
            credential_from_request(&HeaderMap::new(), query).unwrap(),
            "from-query"
        );

        let err = credential_from_request(&HeaderMap::new(), WsQuery { token: None }).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_bare_authorization_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, " eyJhbGciOiJIUzI1NiJ9.e30.sig ".parse().unwrap());
        let query = WsQuery {
            token: Some("from-query".to_string()),
        };

        assert_eq!(
            credential_from_request(&headers, query).unwrap(),
            "eyJhbGciOiJIUzI1NiJ9.e30.sig"
        );
    }

    #[test]
    fn test_blank_authorization_header_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());

        let err = credential_from_request(&headers, WsQuery { token: None }).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bare_header_token_authenticates() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| Ok(Some(profile("u1", &["admin"]))));
        let state = state(resolver);

        let mut headers = HeaderMap::new();
        let token = jwt().sign_token(&UserId::from("u1")).unwrap();
        headers.insert(AUTHORIZATION, token.parse().unwrap());

        let credential = credential_from_request(&headers, WsQuery { token: None }).unwrap();
        let resolved = authenticate(&state, &credential).await.unwrap();
        assert_eq!(resolved.id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_plain_http_request_is_bad_request() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().never();
        let app = crate::http::create_router(state(resolver));

        let response = app
            .oneshot(Request::get("/ws/some-token/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_writer_forwards_frames_then_closes() {
        let hub = Hub::spawn();
        let (conn, queue) = connection();
        hub.register(Arc::clone(&conn));
        let (sink, mut sent) = mpsc::unbounded::<Message>();

        let writer = tokio::spawn(write_loop(sink, queue, Arc::clone(&conn), hub.clone(), None));

        let delivered = hub
            .broadcast(&serde_json::json!({"code": "0000"}), ["admin"], ["1"])
            .await
            .unwrap();
        assert_eq!(delivered, 1);

        match sent.next().await {
            Some(Message::Text(text)) => assert_eq!(text.as_str(), r#"{"code":"0000"}"#),
            other => panic!("expected text frame, got {other:?}"),
        }

        conn.close();
        assert!(matches!(sent.next().await, Some(Message::Close(None))));
        assert!(sent.next().await.is_none());
        writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_writer_sends_heartbeat() {
        let hub = Hub::spawn();
        let (conn, queue) = connection();
        let (sink, mut sent) = mpsc::unbounded::<Message>();

        tokio::spawn(write_loop(
            sink,
            queue,
            Arc::clone(&conn),
            hub,
            Some(Duration::from_secs(30)),
        ));

        assert!(matches!(sent.next().await, Some(Message::Ping(_))));
        conn.close();
    }

    #[tokio::test]
    async fn test_writer_survives_out_of_range_ping_interval() {
        let hub = Hub::spawn();
        let (conn, queue) = connection();
        hub.register(Arc::clone(&conn));
        let (sink, mut sent) = mpsc::unbounded::<Message>();

        let writer = tokio::spawn(write_loop(
            sink,
            queue,
            Arc::clone(&conn),
            hub.clone(),
            Some(Duration::from_secs(u64::MAX)),
        ));

        let delivered = hub
            .broadcast(&serde_json::json!("still alive"), ["admin"], ["1"])
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert!(matches!(sent.next().await, Some(Message::Text(_))));

        conn.close();
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_unregisters_on_send_failure() {
        let hub = Hub::spawn();
        let (conn, queue) = connection();
        hub.register(Arc::clone(&conn));
        assert_eq!(hub.connection_count().await.unwrap(), 1);

        let (sink, sent) = mpsc::unbounded::<Message>();
        drop(sent);
        conn.try_enqueue("frame".into()).unwrap();

        write_loop(sink, queue, Arc::clone(&conn), hub.clone(), None).await;

        assert!(conn.is_closed());
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reader_ignores_inbound_frames_until_close() {
        let hub = Hub::spawn();
        let (conn, _queue) = connection();
        hub.register(Arc::clone(&conn));

        let inbound = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(Message::Text("hello".into())),
            Ok(Message::Binary(Bytes::from_static(b"\x01"))),
            Ok(Message::Close(None)),
            Ok(Message::Text("after close".into())),
        ]);

        read_loop(inbound, &conn, &hub).await;

        assert!(conn.is_closed());
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reader_unregisters_on_error() {
        let hub = Hub::spawn();
        let (conn, _queue) = connection();
        hub.register(Arc::clone(&conn));

        let inbound = futures::stream::iter(vec![Err::<Message, _>(std::io::Error::other("reset"))]);
        read_loop(inbound, &conn, &hub).await;

        assert!(conn.is_closed());
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reader_exits_when_connection_closed() {
        let hub = Hub::spawn();
        let (conn, _queue) = connection();
        let inbound = futures::stream::pending::<Result<Message, std::io::Error>>();

        let reader = {
            let conn = Arc::clone(&conn);
            let hub = hub.clone();
            tokio::spawn(async move { read_loop(inbound, &conn, &hub).await })
        };
        conn.close();

        tokio::time::timeout(Duration::from_millis(200), reader)
            .await
            .expect("reader did not stop")
            .unwrap();
    }
}
