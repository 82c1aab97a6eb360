//! Demo Greeter service served by the `dualport` binary.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::gateway::GatewayRoute;
use crate::rpc::{handler_fn, Handler, Metadata, Status};

pub const SAY_HELLO: &str = "/greeter.Greeter/SayHello";
pub const SAY_HELLO_PATH: &str = "/v1/greeter/hello";

#[derive(Debug, Deserialize)]
pub struct HelloRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloReply {
    pub message: String,
}

pub fn say_hello() -> Arc<dyn Handler> {
    handler_fn(|_: Metadata, request: Bytes| async move {
        let request: HelloRequest = serde_json::from_slice(&request)
            .map_err(|e| Status::invalid_argument(format!("malformed HelloRequest: {e}")))?;
        let reply = HelloReply {
            message: format!("Hello, {}!", request.name),
        };
        serde_json::to_vec(&reply)
            .map(Bytes::from)
            .map_err(|e| Status::internal(e.to_string()))
    })
}

/// `POST /v1/greeter/hello` → `SayHello`.
pub fn routes() -> Vec<GatewayRoute> {
    vec![GatewayRoute::post(SAY_HELLO_PATH, SAY_HELLO)]
}
