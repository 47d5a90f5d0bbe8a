//! Actix Web server exposing a bridge's viewer page, streams, and status APIs.
//!
//! The server runs on a dedicated thread so the ingest loops never share a
//! runtime with network I/O. Handlers only ever touch feeds through
//! subscriptions; no lock is held across a write to a client.

use std::{sync::Arc, time::Duration};

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer,
    http::header,
    web::{self, Bytes},
};
use anyhow::{Context, Result, anyhow};
use async_stream::stream;
use sensor_ingest::StopToken;
use serde_json::to_string;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::{
    bridge::{
        config::{BridgeKind, Timing},
        data::{FrameFeed, PointFeed, StatusResponse, StreamStatus, TelemetryEvent, TelemetryFeed},
        relay::{CommandBuffer, RelaySession, teleop_session},
        telemetry::prometheus_handle,
        transport::{
            ConnectionGuard, MULTIPART_CONTENT_TYPE, multipart_stream, point_cloud_session,
            snapshot,
        },
        watchdog::IngestHealth,
    },
    html,
};

/// Wait between keep-alive comments on an idle telemetry stream.
const SSE_KEEPALIVE: Duration = Duration::from_secs(1);

/// Shared state backing HTTP handlers.
pub struct ServerState {
    pub kind: BridgeKind,
    pub frames: Option<FrameFeed>,
    pub points: Option<PointFeed>,
    pub commands: Option<Arc<CommandBuffer>>,
    pub telemetry: Option<TelemetryFeed>,
    pub health: Vec<Arc<IngestHealth>>,
    pub timing: Timing,
    pub stop: StopToken,
}

impl ServerState {
    pub fn new(kind: BridgeKind, timing: Timing, stop: StopToken) -> Self {
        Self {
            kind,
            frames: None,
            points: None,
            commands: None,
            telemetry: None,
            health: Vec::new(),
            timing,
            stop,
        }
    }

    pub fn with_frames(mut self, frames: FrameFeed) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn with_points(mut self, points: PointFeed) -> Self {
        self.points = Some(points);
        self
    }

    pub fn with_commands(mut self, commands: Arc<CommandBuffer>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryFeed) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_health(mut self, health: Arc<IngestHealth>) -> Self {
        self.health.push(health);
        self
    }

    /// Status of the bridge's primary feed.
    pub fn status(&self) -> StatusResponse {
        let queue_size = match self.kind {
            BridgeKind::Points => self.points.as_ref().map_or(0, |feed| feed.pending()),
            BridgeKind::Camera | BridgeKind::Teleop => {
                self.frames.as_ref().map_or(0, |feed| feed.pending())
            }
        };
        let status = if self.health.iter().any(|health| health.is_stale()) {
            StreamStatus::Error
        } else if queue_size > 0 {
            StreamStatus::Active
        } else {
            StreamStatus::Waiting
        };
        StatusResponse { status, queue_size }
    }
}

/// Register the routes served by `kind`.
pub fn configure_routes(cfg: &mut web::ServiceConfig, kind: BridgeKind) {
    cfg.route("/status", web::get().to(status_handler))
        .route("/metrics", web::get().to(metrics_handler));
    match kind {
        BridgeKind::Camera => {
            cfg.route("/", web::get().to(camera_index))
                .route("/stream", web::get().to(stream_handler))
                .route("/frame", web::get().to(frame_handler));
        }
        BridgeKind::Points => {
            cfg.route("/", web::get().to(points_index))
                .route("/ws/points", web::get().to(points_ws_handler));
        }
        BridgeKind::Teleop => {
            cfg.route("/", web::get().to(teleop_index))
                .route("/feed", web::get().to(feed_handler))
                .route("/frame", web::get().to(frame_handler))
                .route("/ws", web::get().to(teleop_ws_handler))
                .route("/telemetry", web::get().to(telemetry_handler));
        }
    }
}

/// Handle for the server thread.
pub struct BridgeServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl BridgeServer {
    /// Signal the server to stop and block until the thread exits.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spawn the server thread once the listener is bound.
pub fn spawn_server(state: ServerState, bind: &str, port: u16) -> Result<BridgeServer> {
    let kind = state.kind;
    let data = web::Data::new(state);
    let bind = bind.to_string();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (bound_tx, bound_rx) = crossbeam_channel::bounded::<std::io::Result<()>>(1);

    let handle = std::thread::Builder::new()
        .name(format!("{kind}-server"))
        .spawn(move || {
            let result = actix_web::rt::System::new().block_on(async move {
                let server = match HttpServer::new(move || {
                    App::new()
                        .app_data(data.clone())
                        .configure(|cfg| configure_routes(cfg, kind))
                })
                .disable_signals()
                .shutdown_timeout(2)
                .bind((bind.as_str(), port))
                {
                    Ok(server) => server.run(),
                    Err(err) => {
                        let _ = bound_tx.send(Err(err));
                        return Ok(());
                    }
                };
                let _ = bound_tx.send(Ok(()));
                info!(bridge = %kind, "serving on http://{bind}:{port}");

                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                server.await
            });
            if let Err(err) = result {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn bridge server thread")?;

    let bound = bound_rx
        .recv()
        .map_err(|_| anyhow!("bridge server thread exited before binding"));
    match bound {
        Ok(Ok(())) => Ok(BridgeServer {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }),
        Ok(Err(err)) => {
            let _ = handle.join();
            Err(err).with_context(|| format!("Failed to bind {kind} bridge to port {port}"))
        }
        Err(err) => {
            let _ = handle.join();
            Err(err)
        }
    }
}

fn html_page(body: &'static str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

async fn camera_index() -> HttpResponse {
    html_page(html::CAMERA_HTML)
}

async fn points_index() -> HttpResponse {
    html_page(html::POINTS_HTML)
}

async fn teleop_index() -> HttpResponse {
    html_page(html::TELEOP_HTML)
}

async fn status_handler(state: web::Data<ServerState>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .json(state.status())
}

async fn metrics_handler() -> HttpResponse {
    match prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().body("metrics recorder not installed"),
    }
}

fn mjpeg_response(state: &ServerState, endpoint: &'static str) -> HttpResponse {
    let Some(frames) = state.frames.as_ref() else {
        return HttpResponse::NotFound().finish();
    };
    let body = multipart_stream(
        frames.subscribe(),
        state.timing,
        state.stop.clone(),
        endpoint,
    );

    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"))
        .insert_header((header::PRAGMA, "no-cache"))
        .insert_header((header::EXPIRES, "0"))
        .insert_header(("X-Accel-Buffering", "no"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .content_type(MULTIPART_CONTENT_TYPE)
        .force_close()
        .streaming(body)
}

/// Camera bridge MJPEG feed.
async fn stream_handler(state: web::Data<ServerState>) -> HttpResponse {
    mjpeg_response(&state, "/stream")
}

/// Teleop bridge MJPEG feed.
async fn feed_handler(state: web::Data<ServerState>) -> HttpResponse {
    mjpeg_response(&state, "/feed")
}

/// One JPEG, or 503 when nothing arrives within the snapshot timeout.
async fn frame_handler(state: web::Data<ServerState>) -> HttpResponse {
    let Some(frames) = state.frames.as_ref() else {
        return HttpResponse::NotFound().finish();
    };
    match snapshot(frames, &state.timing).await {
        Some(jpeg) => HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, "no-cache"))
            .content_type("image/jpeg")
            .body(jpeg),
        None => HttpResponse::ServiceUnavailable().body("No frame available"),
    }
}

async fn points_ws_handler(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<ServerState>,
) -> actix_web::Result<HttpResponse> {
    let Some(points) = state.points.as_ref() else {
        return Ok(HttpResponse::NotFound().finish());
    };
    let (response, session, messages) = actix_ws::handle(&req, body)?;
    actix_web::rt::spawn(point_cloud_session(
        session,
        messages,
        points.subscribe(),
        state.timing,
        state.stop.clone(),
    ));
    Ok(response)
}

async fn teleop_ws_handler(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<ServerState>,
) -> actix_web::Result<HttpResponse> {
    let Some(commands) = state.commands.as_ref() else {
        return Ok(HttpResponse::NotFound().finish());
    };
    let (response, session, messages) = actix_ws::handle(&req, body)?;
    actix_web::rt::spawn(teleop_session(
        session,
        messages,
        RelaySession::open(commands.clone()),
        state.stop.clone(),
    ));
    Ok(response)
}

/// Drive telemetry as Server-Sent Events of flattened series.
async fn telemetry_handler(state: web::Data<ServerState>) -> HttpResponse {
    let Some(telemetry) = state.telemetry.as_ref() else {
        return HttpResponse::NotFound().finish();
    };
    let mut sub = telemetry.subscribe();
    let stop = state.stop.clone();
    let body = stream! {
        let _guard = ConnectionGuard::open("/telemetry");
        yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"retry: 500\n\n"));
        while !stop.is_cancelled() {
            let Some(record) = sub.next_within(SSE_KEEPALIVE).await else {
                yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b": keep-alive\n\n"));
                continue;
            };
            match to_string(&TelemetryEvent::from(record.as_ref())) {
                Ok(json) => {
                    let mut sse_chunk = String::with_capacity(json.len() + 8);
                    sse_chunk.push_str("data: ");
                    sse_chunk.push_str(&json);
                    sse_chunk.push_str("\n\n");
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(sse_chunk));
                }
                Err(err) => {
                    let error_chunk = format!("event: error\ndata: {err}\n\n");
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(error_chunk));
                }
            }
        }
    };

    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .content_type("text/event-stream")
        .streaming(body)
}

#[cfg(test)]
mod tests {
    use sensor_ingest::{Delivery, Feed};

    use super::*;

    #[test]
    fn status_tracks_primary_feed() {
        let frames: FrameFeed = Feed::new("camera", Delivery::Exclusive);
        let state = ServerState::new(BridgeKind::Camera, Timing::default(), StopToken::new())
            .with_frames(frames.clone())
            .with_health(IngestHealth::new("camera"));

        let status = state.status();
        assert_eq!(status.status, StreamStatus::Waiting);
        assert_eq!(status.queue_size, 0);

        frames.publish(Bytes::from_static(b"jpeg"));
        let status = state.status();
        assert_eq!(status.status, StreamStatus::Active);
        assert_eq!(status.queue_size, 1);
    }

    #[test]
    fn points_status_ignores_frame_feed() {
        let points: PointFeed = Feed::new("points", Delivery::Broadcast);
        let state = ServerState::new(BridgeKind::Points, Timing::default(), StopToken::new())
            .with_points(points.clone());
        assert_eq!(state.status().queue_size, 0);

        points.publish(Arc::new(sensor_ingest::PointCloud::new(
            vec![[0.0; 3]],
            None,
        )));
        assert_eq!(state.status().status, StreamStatus::Active);
    }
}
