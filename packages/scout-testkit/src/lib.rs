pub mod fixtures;

mod error;

pub use error::{Error, Result};

use std::{
	collections::VecDeque,
	sync::{Arc, Mutex},
};

use axum::{
	Json, Router,
	extract::State,
	http::{HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE},
	response::{IntoResponse, Response},
	routing,
};
use serde_json::Value;
use tokio::{
	net::TcpListener,
	sync::oneshot::{self, Sender},
};

/// One scripted reply from [`GraphqlStub`].
#[derive(Clone, Debug)]
pub struct StubResponse {
	pub status: u16,
	pub body: String,
	pub headers: Vec<(String, String)>,
}
impl StubResponse {
	pub fn json(body: Value) -> Self {
		Self { status: 200, body: body.to_string(), headers: Vec::new() }
	}

	pub fn status(status: u16, body: impl Into<String>) -> Self {
		Self { status, body: body.into(), headers: Vec::new() }
	}

	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		self.headers.push((name.to_string(), value.to_string()));

		self
	}
}

#[derive(Default)]
struct StubState {
	script: Mutex<VecDeque<StubResponse>>,
	requests: Mutex<Vec<Value>>,
}

/// Local GraphQL endpoint that answers `POST /graphql` from a script, in order, and records
/// every request body it receives. Replies with 500 once the script runs out.
pub struct GraphqlStub {
	api_base: String,
	state: Arc<StubState>,
	shutdown: Option<Sender<()>>,
}
impl GraphqlStub {
	pub async fn start(script: Vec<StubResponse>) -> Result<Self> {
		let state = Arc::new(StubState {
			script: Mutex::new(script.into_iter().collect()),
			requests: Mutex::new(Vec::new()),
		});
		let app =
			Router::new().route("/graphql", routing::post(graphql_handler)).with_state(state.clone());
		let listener = TcpListener::bind("127.0.0.1:0").await?;
		let addr = listener.local_addr()?;
		let (tx, rx) = oneshot::channel();
		let server = axum::serve(listener, app).with_graceful_shutdown(async move {
			let _ = rx.await;
		});

		tokio::spawn(async move {
			let _ = server.into_future().await;
		});

		Ok(Self { api_base: format!("http://{addr}"), state, shutdown: Some(tx) })
	}

	/// Base URL without the `/graphql` path.
	pub fn api_base(&self) -> &str {
		&self.api_base
	}

	pub fn requests(&self) -> Vec<Value> {
		self.state.requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn request_count(&self) -> usize {
		self.state.requests.lock().unwrap_or_else(|err| err.into_inner()).len()
	}
}
impl Drop for GraphqlStub {
	fn drop(&mut self) {
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
	}
}

async fn graphql_handler(
	State(state): State<Arc<StubState>>,
	Json(payload): Json<Value>,
) -> Response {
	state.requests.lock().unwrap_or_else(|err| err.into_inner()).push(payload);

	let next = state.script.lock().unwrap_or_else(|err| err.into_inner()).pop_front();
	let Some(reply) = next else {
		return (StatusCode::INTERNAL_SERVER_ERROR, "Stub script exhausted.").into_response();
	};
	let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
	let mut response = (status, [(CONTENT_TYPE, "application/json")], reply.body).into_response();

	for (name, value) in reply.headers {
		if let (Ok(name), Ok(value)) =
			(HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value))
		{
			response.headers_mut().insert(name, value);
		}
	}

	response
}

/// An address nothing listens on.
pub async fn closed_api_base() -> Result<String> {
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;

	drop(listener);

	Ok(format!("http://{addr}"))
}
