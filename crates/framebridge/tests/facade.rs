#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::oneshot;

use framebridge::{create, defer, LocalApi, LoopbackTransport, Reply};

const HOST: &str = "https://host.example";
const FRAME: &str = "https://frame.example";

#[tokio::test]
async fn both_sides_call_each_other_through_the_facade() {
    let (host_side, frame_side) = LoopbackTransport::pair(HOST, FRAME);

    let host_api = LocalApi::new().register("upper", |args: Vec<Value>| {
        let s = args.first().and_then(Value::as_str).unwrap_or_default();
        Ok(Reply::value(s.to_uppercase()))
    });
    let frame_api = LocalApi::new().register("later", |args: Vec<Value>| {
        let d = defer();
        let p = d.promise();
        let v = args.into_iter().next();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            d.resolve(v);
        });
        Ok(p.into())
    });

    let host = create(host_api, Arc::new(host_side), FRAME);
    let frame = create(frame_api, Arc::new(frame_side), HOST);

    let (htx, hrx) = oneshot::channel();
    let (ftx, frx) = oneshot::channel();
    host.init(move |p| {
        let _ = htx.send(p);
    })
    .unwrap();
    frame
        .init(move |p| {
            let _ = ftx.send(p);
        })
        .unwrap();
    let (to_frame, to_host) = (hrx.await.unwrap(), frx.await.unwrap());

    assert_eq!(to_host.call_async("upper", vec![json!("abc")]).await.unwrap(), Some(json!("ABC")));
    assert_eq!(to_frame.call_async("later", vec![json!(7)]).await.unwrap(), Some(json!(7)));
    assert_eq!(host.pending_calls() + frame.pending_calls(), 0);
}

#[test]
fn error_codes_are_reachable_from_the_root() {
    let err = framebridge::BridgeError::Rejected;
    assert_eq!(err.code(), framebridge::ErrorCode::Rejected);
    assert_eq!(framebridge::core::protocol::EventKind::CallFunction.as_str(), "call-function");
}
