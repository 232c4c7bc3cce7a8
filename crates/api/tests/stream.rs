//! WebSocket stream tests against a real listener

use alerting::{AlertConfig, AlertDispatcher, StressClassifier};
use api::{create_router, AppState, IngestionService, StreamConfig};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use inference_engine::{LinearModel, Scaler, StressPredictor, TrainedArtifact};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use storage::Repository;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tower::ServiceExt;

fn state() -> Arc<AppState> {
    let names = vec!["heart_rate".to_string(), "gsr".to_string()];
    let artifact = TrainedArtifact::new(
        Box::new(LinearModel::new(vec![0.1, 0.001], 0.0)),
        Scaler::identity(names.len()),
        names,
    )
    .unwrap();
    let ingestion = IngestionService::new(
        StressPredictor::new(Arc::new(artifact)),
        StressClassifier::default(),
        Arc::new(AlertDispatcher::new(None, &AlertConfig::default())),
        Arc::new(Repository::new(10)),
    );

    let stream = StreamConfig {
        interval_ms: 20,
        ..Default::default()
    };
    Arc::new(AppState::new(ingestion, stream))
}

async fn serve(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn wait_for_clients(state: &AppState, expected: usize) {
    timeout(Duration::from_secs(5), async {
        while state.registry.len() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("registry never reached {expected} clients"));
}

#[tokio::test]
async fn test_ws_client_streams_until_close() {
    let state = state();
    let addr = serve(state.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    for _ in 0..2 {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = match message {
            Message::Text(text) => text,
            other => panic!("expected a text frame, got {other:?}"),
        };
        let frame: Value = serde_json::from_str(&text).unwrap();
        let values = frame["sensor_values"].as_array().unwrap();
        assert_eq!(values.len(), 3);
        let heart_rate = values[0].as_f64().unwrap();
        assert!((60.0..=100.0).contains(&heart_rate));
    }
    assert_eq!(state.registry.len(), 1);

    let response = create_router(state.clone())
        .oneshot(
            Request::builder()
                .uri("/api/v1/stream/clients")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["count"], 1);
    let peer = body["clients"][0]["peer"].as_str().unwrap();
    assert!(peer.starts_with("127.0.0.1:"));

    ws.close(None).await.unwrap();
    wait_for_clients(&state, 0).await;
}

#[tokio::test]
async fn test_dropped_connection_leaves_other_clients_streaming() {
    let state = state();
    let addr = serve(state.clone()).await;

    let (mut staying, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let (leaving, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    wait_for_clients(&state, 2).await;

    // No close handshake: the socket just goes away
    drop(leaving);
    wait_for_clients(&state, 1).await;

    let message = timeout(Duration::from_secs(5), staying.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(message, Message::Text(_)));
}
