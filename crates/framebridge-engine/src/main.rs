//! framebridge demo
//!
//! Runs a host page and an embedded frame in one process over a loopback
//! transport pair:
//! - handshake in both directions
//! - immediate and deferred local functions
//! - a failing remote call
//!
//! Reads `framebridge.yaml` (host view) when present, defaults otherwise.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing_subscriber::{fmt, EnvFilter};

use framebridge_core::{BridgeError, Result};
use framebridge_engine::config::{self, HandshakeSettings};
use framebridge_engine::{defer, Bridge, LocalApi, LoopbackTransport, RemoteProxy, Reply};

const CONFIG_PATH: &str = "framebridge.yaml";
const HOST_ORIGIN: &str = "https://host.example";
const DEFAULT_FRAME_ORIGIN: &str = "https://frame.example";

fn host_api() -> LocalApi {
    LocalApi::new()
        .register("greet", |args: Vec<Value>| {
            let who = args.first().and_then(Value::as_str).unwrap_or("stranger");
            Ok(Reply::value(format!("hello, {who}")))
        })
        .register("add", |args: Vec<Value>| {
            let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
            Ok(Reply::value(sum))
        })
}

fn frame_api() -> LocalApi {
    LocalApi::new()
        .register("slowSquare", |args: Vec<Value>| {
            let n = args
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| BridgeError::Invocation("slowSquare expects an integer".into()))?;
            let deferred = defer();
            let promise = deferred.promise();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                deferred.resolve(Some(json!(n * n)));
            });
            Ok(promise.into())
        })
        .register("explode", |_args: Vec<Value>| {
            Err(BridgeError::Invocation("explode always fails".into()))
        })
}

async fn ready(bridge: &Bridge) -> Result<RemoteProxy> {
    let (tx, rx) = oneshot::channel();
    bridge.init(move |proxy| {
        let _ = tx.send(proxy);
    })?;
    rx.await
        .map_err(|_| BridgeError::Internal("bridge dropped before ready".into()))
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (frame_origin, settings) = if Path::new(CONFIG_PATH).exists() {
        let cfg = config::load_from_file(CONFIG_PATH)?;
        (cfg.target_domain.clone(), cfg.handshake.settings())
    } else {
        tracing::info!("{CONFIG_PATH} not found; using defaults");
        (DEFAULT_FRAME_ORIGIN.to_owned(), HandshakeSettings::default())
    };

    let (host_side, frame_side) = LoopbackTransport::pair(HOST_ORIGIN, frame_origin.clone());

    let host = Bridge::builder(host_api(), Arc::new(host_side), frame_origin.clone())
        .settings(settings)
        .on_handshake_timeout(|attempts| tracing::error!(attempts, "frame never answered"))
        .build();
    let frame = Bridge::builder(frame_api(), Arc::new(frame_side), HOST_ORIGIN)
        .settings(settings)
        .build();

    tracing::info!(host = HOST_ORIGIN, frame = %frame_origin, "framebridge-demo starting");

    let (to_frame, to_host) = tokio::try_join!(ready(&host), ready(&frame))?;
    tracing::info!(frame_api = ?to_frame.names(), host_api = ?to_host.names(), "both sides ready");

    let squares = join_all((1..=4).map(|n| to_frame.call_async("slowSquare", vec![json!(n)]))).await;
    for (n, sq) in (1..=4).zip(squares) {
        let value = sq?;
        tracing::info!(n, ?value, "slowSquare");
    }

    let greeting = to_host.call_async("greet", vec![json!("frame")]).await?;
    let sum = to_host.call_async("add", vec![json!(2), json!(3.5)]).await?;
    tracing::info!(?greeting, ?sum, "host replied");

    match to_frame.call_async("explode", Vec::new()).await {
        Err(BridgeError::Rejected) => tracing::info!("explode rejected as expected"),
        other => tracing::warn!(?other, "unexpected outcome for explode"),
    }

    tracing::info!(pending = host.pending_calls() + frame.pending_calls(), "framebridge-demo done");
    Ok(())
}
