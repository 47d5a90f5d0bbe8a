//! Per-connection drain loops that move the freshest sample from a feed onto the wire.
//!
//! Every transport follows the same cadence: wait up to `drain_timeout` for a
//! sample, send it if one arrived, otherwise back off for `idle_backoff` and
//! retry. Loops end when the client goes away or the stop token is cancelled.

use std::sync::Arc;

use actix_web::web::Bytes;
use actix_ws::{CloseCode, CloseReason, Message, MessageStream, Session};
use async_stream::stream;
use futures_util::{Stream, StreamExt};
use sensor_ingest::{Feed, PointCloud, StopToken, Subscription};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::bridge::{codec::encode_point_cloud, config::Timing};

const BOUNDARY_HEAD: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

/// Content type announced for the MJPEG endpoints.
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Tracks one open client connection in the `bridge_connections_active` gauge.
pub struct ConnectionGuard {
    endpoint: &'static str,
}

impl ConnectionGuard {
    pub fn open(endpoint: &'static str) -> Self {
        metrics::gauge!("bridge_connections_active", "endpoint" => endpoint).increment(1.0);
        info!(endpoint, "client connected");
        Self { endpoint }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::gauge!("bridge_connections_active", "endpoint" => self.endpoint).decrement(1.0);
        info!(endpoint = self.endpoint, "client disconnected");
    }
}

/// Wrap one JPEG in its multipart boundary block.
pub fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let mut payload = Vec::with_capacity(BOUNDARY_HEAD.len() + jpeg.len() + 2);
    payload.extend_from_slice(BOUNDARY_HEAD);
    payload.extend_from_slice(jpeg);
    payload.extend_from_slice(b"\r\n");
    Bytes::from(payload)
}

/// One drain attempt: the next unseen sample, or `None` after backing off.
async fn drain_next<T>(sub: &mut Subscription<T>, timing: &Timing) -> Option<T>
where
    T: Clone + Send + Sync + 'static,
{
    let item = sub.next_within(timing.drain_timeout).await;
    if item.is_none() {
        tokio::time::sleep(timing.idle_backoff).await;
    }
    item
}

/// Endless multipart body for `/stream` and `/feed`.
///
/// Dropping the stream (client disconnect) ends the session.
pub fn multipart_stream(
    mut sub: Subscription<Bytes>,
    timing: Timing,
    stop: StopToken,
    endpoint: &'static str,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> + 'static {
    stream! {
        let _guard = ConnectionGuard::open(endpoint);
        while !stop.is_cancelled() {
            if let Some(jpeg) = drain_next(&mut sub, &timing).await {
                metrics::counter!("bridge_frames_sent_total", "transport" => "mjpeg").increment(1);
                yield Ok::<Bytes, actix_web::Error>(multipart_chunk(&jpeg));
            }
        }
        debug!(endpoint, "multipart stream closed by shutdown");
    }
}

/// Single-frame wait used by `/frame`.
pub async fn snapshot<T>(feed: &Arc<Feed<T>>, timing: &Timing) -> Option<T>
where
    T: Clone + Send + Sync + 'static,
{
    feed.subscribe().next_within(timing.snapshot_timeout).await
}

/// Push encoded point clouds to one `/ws/points` client until it leaves.
///
/// Inbound messages are only inspected for pings and close frames.
pub async fn point_cloud_session(
    mut session: Session,
    mut messages: MessageStream,
    mut sub: Subscription<Arc<PointCloud>>,
    timing: Timing,
    stop: StopToken,
) {
    let _guard = ConnectionGuard::open("/ws/points");
    let span = info_span!("transport.points", delivery = %sub.feed().delivery());

    async move {
        loop {
            if stop.is_cancelled() {
                let _ = session.close(Some(CloseCode::Normal.into())).await;
                return;
            }

            tokio::select! {
                inbound = messages.next() => match inbound {
                    Some(Ok(Message::Ping(payload))) => {
                        if session.pong(&payload).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => {
                        debug!(?reason, "client closed point stream");
                        let _ = session.close(reason).await;
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "websocket protocol error");
                        let _ = session.close(Some(protocol_close())).await;
                        return;
                    }
                    None => return,
                },
                cloud = drain_next(&mut sub, &timing) => {
                    let Some(cloud) = cloud else { continue };
                    match encode_point_cloud(&cloud) {
                        Ok(frame) => {
                            if session.binary(frame).await.is_err() {
                                return;
                            }
                            metrics::counter!("bridge_frames_sent_total", "transport" => "ws_points")
                                .increment(1);
                        }
                        Err(err) => {
                            warn!(error = %err, "dropping point cloud that cannot be encoded");
                            metrics::counter!("bridge_encode_failures_total", "stream" => "points")
                                .increment(1);
                        }
                    }
                }
            }
        }
    }
    .instrument(span)
    .await
}

fn protocol_close() -> CloseReason {
    CloseReason {
        code: CloseCode::Protocol,
        description: None,
    }
}
