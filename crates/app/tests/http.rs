use std::{sync::Arc, time::Duration};

use actix_web::{
    App,
    http::{StatusCode, header},
    test, web,
};
use robot_bridge::bridge::{
    BridgeKind, Timing,
    data::{FrameFeed, TelemetryFeed},
    relay::{CommandBuffer, CommandRecord},
    server::{ServerState, configure_routes},
};
use sensor_ingest::{Delivery, Feed, StopToken, TelemetryRecord};
use serde_json::Value;

fn fast_timing() -> Timing {
    Timing {
        poll_interval: Duration::from_millis(1),
        drain_timeout: Duration::from_millis(10),
        idle_backoff: Duration::from_millis(1),
        snapshot_timeout: Duration::from_millis(50),
    }
}

fn camera_state(frames: &FrameFeed, stop: &StopToken) -> web::Data<ServerState> {
    web::Data::new(
        ServerState::new(BridgeKind::Camera, fast_timing(), stop.clone()).with_frames(frames.clone()),
    )
}

fn cancel_after(stop: &StopToken, delay: Duration) {
    let stop = stop.clone();
    actix_web::rt::spawn(async move {
        tokio::time::sleep(delay).await;
        stop.cancel();
    });
}

#[actix_web::test]
async fn frame_is_unavailable_until_published() {
    let frames: FrameFeed = Feed::new("camera", Delivery::Exclusive);
    let stop = StopToken::new();
    let app = test::init_service(
        App::new()
            .app_data(camera_state(&frames, &stop))
            .configure(|cfg| configure_routes(cfg, BridgeKind::Camera)),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/frame").to_request()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    frames.publish(web::Bytes::from_static(b"\xFF\xD8jpeg\xFF\xD9"));
    let resp = test::call_service(&app, test::TestRequest::get().uri("/frame").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"\xFF\xD8jpeg\xFF\xD9");
}

#[actix_web::test]
async fn status_reports_waiting_then_active() {
    let frames: FrameFeed = Feed::new("camera", Delivery::Exclusive);
    let stop = StopToken::new();
    let app = test::init_service(
        App::new()
            .app_data(camera_state(&frames, &stop))
            .configure(|cfg| configure_routes(cfg, BridgeKind::Camera)),
    )
    .await;

    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/status").to_request())
            .await;
    assert_eq!(body["status"], "waiting");
    assert_eq!(body["queue_size"], 0);

    frames.publish(web::Bytes::from_static(b"jpeg"));
    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/status").to_request())
            .await;
    assert_eq!(body["status"], "active");
    assert_eq!(body["queue_size"], 1);
}

#[actix_web::test]
async fn stream_disables_caching_and_frames_jpegs() {
    let frames: FrameFeed = Feed::new("camera", Delivery::Exclusive);
    let stop = StopToken::new();
    let app = test::init_service(
        App::new()
            .app_data(camera_state(&frames, &stop))
            .configure(|cfg| configure_routes(cfg, BridgeKind::Camera)),
    )
    .await;

    frames.publish(web::Bytes::from_static(b"first"));
    let resp = test::call_service(&app, test::TestRequest::get().uri("/stream").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "multipart/x-mixed-replace; boundary=frame"
    );
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers.get(header::PRAGMA).unwrap(), "no-cache");
    assert_eq!(headers.get(header::EXPIRES).unwrap(), "0");
    assert_eq!(headers.get("X-Accel-Buffering").unwrap(), "no");

    cancel_after(&stop, Duration::from_millis(100));
    let body = test::read_body(resp).await;
    assert_eq!(
        &body[..],
        b"--frame\r\nContent-Type: image/jpeg\r\n\r\nfirst\r\n"
    );
}

#[actix_web::test]
async fn routes_follow_bridge_kind() {
    let frames: FrameFeed = Feed::new("camera", Delivery::Exclusive);
    let stop = StopToken::new();
    let app = test::init_service(
        App::new()
            .app_data(camera_state(&frames, &stop))
            .configure(|cfg| configure_routes(cfg, BridgeKind::Camera)),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/ws/points").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/feed").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn telemetry_streams_flattened_series() {
    let telemetry: TelemetryFeed = Feed::new("drive", Delivery::Broadcast);
    let stop = StopToken::new();
    let state = web::Data::new(
        ServerState::new(BridgeKind::Teleop, fast_timing(), stop.clone())
            .with_telemetry(telemetry.clone()),
    );
    let app = test::init_service(
        App::new()
            .app_data(state)
            .configure(|cfg| configure_routes(cfg, BridgeKind::Teleop)),
    )
    .await;

    telemetry.publish(Arc::new(
        TelemetryRecord::new(Some(42))
            .with_vector("pose", vec![1.0, -2.0, 0.5])
            .with_scalar("timestamp", 42.0),
    ));

    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/telemetry").to_request()).await;
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    cancel_after(&stop, Duration::from_millis(100));
    let body = test::read_body(resp).await;
    let text = std::str::from_utf8(&body).unwrap();
    assert!(text.starts_with("retry: 500\n\n"));
    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .expect("one telemetry event");
    let event: Value = serde_json::from_str(data).unwrap();
    assert_eq!(event["timestamp_us"], 42);
    assert_eq!(event["series"]["pose[1]"], -2.0);
    assert!(event["series"].get("timestamp").is_none());
}

#[actix_web::test]
async fn teleop_socket_leaves_stop_command_on_close() {
    let commands = Arc::new(CommandBuffer::new());
    let stop = StopToken::new();
    let state = web::Data::new(
        ServerState::new(BridgeKind::Teleop, fast_timing(), stop.clone())
            .with_commands(commands.clone()),
    );
    let app = test::init_service(
        App::new()
            .app_data(state)
            .configure(|cfg| configure_routes(cfg, BridgeKind::Teleop)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/ws")
        .insert_header((header::UPGRADE, "websocket"))
        .insert_header((header::CONNECTION, "upgrade"))
        .insert_header((header::SEC_WEBSOCKET_VERSION, "13"))
        .insert_header((header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ=="))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SWITCHING_PROTOCOLS);

    // The request carries no frames, so the session ends as soon as it runs.
    drop(resp);
    let mut staged = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        staged = commands.take_now();
        if staged.is_some() {
            break;
        }
    }
    assert_eq!(staged, Some(CommandRecord::STOP));
    assert_eq!(commands.pending(), 0);
    stop.cancel();
}
