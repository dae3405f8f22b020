//! In-memory alloy transport used by unit tests.

use super::RpcClient;
use alloy::{
    rpc::json_rpc::{
        ErrorPayload, RequestPacket, Response, ResponsePacket, ResponsePayload,
    },
    transports::{TransportError, TransportFut},
};
use serde_json::Value;
use std::{
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::Semaphore;
use tower::Service;

type Handler = dyn Fn(&str, &Value) -> MockReply + Send + Sync;

/// What the mock node answers to a request.
#[derive(Debug, Clone)]
pub(crate) enum MockReply {
    /// A successful result.
    Result(Value),
    /// A JSON-RPC error object.
    Error(i64, String),
    /// Never answers.
    Hang,
}

impl MockReply {
    pub(crate) fn result(value: Value) -> Self {
        Self::Result(value)
    }

    pub(crate) fn error(code: i64, message: &str) -> Self {
        Self::Error(code, message.to_string())
    }

    pub(crate) fn method_not_found() -> Self {
        Self::error(-32601, "Method not found")
    }
}

/// Alloy transport answering through a closure of `(method, params)`.
#[derive(Clone)]
pub(crate) struct MockTransport {
    handler: Arc<Handler>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub(crate) fn new(handler: impl Fn(&str, &Value) -> MockReply + Send + Sync + 'static) -> Self {
        Self { handler: Arc::new(handler), calls: Default::default() }
    }

    /// Methods called so far, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls of `method`.
    pub(crate) fn count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == method).count()
    }

    pub(crate) fn client(&self, chain: &str) -> RpcClient {
        self.client_with_timeout(chain, Duration::from_secs(8))
    }

    pub(crate) fn client_with_timeout(&self, chain: &str, timeout: Duration) -> RpcClient {
        RpcClient::with_transport(chain, self.clone(), timeout, Arc::new(Semaphore::new(12)))
    }
}

impl Service<RequestPacket> for MockTransport {
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), TransportError>> {
        Ok(()).into()
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        let RequestPacket::Single(req) = req else { panic!("unexpected batch request") };

        let method = req.method().to_string();
        let params = req
            .params()
            .map(|params| serde_json::from_str(params.get()).unwrap())
            .unwrap_or(Value::Null);
        let id = req.id().clone();

        self.calls.lock().unwrap().push(method.clone());
        let reply = (self.handler)(&method, &params);

        Box::pin(async move {
            let payload = match reply {
                MockReply::Result(value) => {
                    ResponsePayload::Success(serde_json::value::to_raw_value(&value).unwrap())
                }
                MockReply::Error(code, message) => ResponsePayload::Failure(ErrorPayload {
                    code,
                    message: message.into(),
                    data: None,
                }),
                MockReply::Hang => std::future::pending().await,
            };
            Ok(ResponsePacket::Single(Response { id, payload }))
        })
    }
}
