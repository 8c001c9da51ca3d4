//! Request forwarder (C6): streams the admitted, selected request to its
//! chosen backend and relays the response verbatim (spec.md §4.6).

use std::net::SocketAddr;
use std::sync::Arc;

use http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::warn;

use crate::error::ForwardError;
use crate::routing::Endpoint;
use crate::statistics::StatisticsSink;

pub type ProxyBody = http_body_util::Either<Incoming, http_body_util::Full<bytes::Bytes>>;

/// Always dials the backend over plain HTTP; TLS, if any, terminates at the
/// proxy (spec.md §4.6).
pub struct Forwarder {
	client: Client<HttpConnector, Incoming>,
	stats: Arc<dyn StatisticsSink>,
}

impl Forwarder {
	pub fn new(stats: Arc<dyn StatisticsSink>) -> Self {
		Self { client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()), stats }
	}

	/// Rewrites `req` to target `backend`, sets `Host` and the
	/// `X-Forwarded-*` headers a single-host reverse proxy sets by default,
	/// and streams the response back. Fires the statistics hook once the
	/// backend has responded.
	pub async fn forward(
		&self,
		mut req: Request<Incoming>,
		request_host: &str,
		backend: &Endpoint,
		peer: SocketAddr,
		inbound_is_tls: bool,
	) -> Result<Response<Incoming>, ForwardError> {
		let authority = format!("{}:{}", backend.host, backend.port);
		let path_and_query = req.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/");
		let new_uri: http::Uri = format!("http://{authority}{path_and_query}")
			.parse()
			.expect("host/port and path form a valid URI");
		*req.uri_mut() = new_uri;

		let headers = req.headers_mut();
		headers.insert(http::header::HOST, authority.parse().expect("authority is valid header value"));
		headers.insert("x-forwarded-for", peer.ip().to_string().parse().expect("ip string is valid header value"));
		headers.insert("x-forwarded-proto", if inbound_is_tls { "https" } else { "http" }.parse().unwrap());

		let result = self.client.request(req).await;
		let stats = self.stats.clone();
		let host = request_host.to_string();
		tokio::spawn(async move {
			stats.update_cluster(&host, 0);
		});

		result.map_err(ForwardError::Relay)
	}
}

/// Builds the 502 response returned when neither "alived" nor the "random"
/// fallback can find a backend (spec.md §4.5, §9's resolved Open Question).
pub fn no_backend_response(host: &str) -> Response<ProxyBody> {
	let body = format!("{host} Can't find active server");
	Response::builder()
		.status(StatusCode::BAD_GATEWAY)
		.header(http::header::CONTENT_TYPE, "text/plain")
		.body(http_body_util::Either::Right(http_body_util::Full::new(bytes::Bytes::from(body))))
		.expect("static response is well-formed")
}

/// Builds the admission-denied response carrying the access filter's
/// explanatory HTML body (spec.md §4.4).
pub fn denied_response(body: String) -> Response<ProxyBody> {
	Response::builder()
		.status(StatusCode::OK)
		.header(http::header::CONTENT_TYPE, "text/html")
		.body(http_body_util::Either::Right(http_body_util::Full::new(bytes::Bytes::from(body))))
		.expect("static response is well-formed")
}
