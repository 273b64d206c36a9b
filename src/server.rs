//! HTTP boundary: routes, CORS, and graceful shutdown.
//!
//! `GET /{event_id}/rsvps` answers JSON by default and an HTML fragment when the request
//! comes from htmx (`hx-request: true`). Upstream failures are reported with a generic 500;
//! their details only reach the logs.

// crates.io
use axum::{
	Json, Router,
	extract::{Path, State},
	http::{
		HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
		header::{ACCEPT, CONTENT_TYPE},
	},
	response::{Html, IntoResponse, Response},
	routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	trace::TraceLayer,
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialStore, EventId, IdentifierError},
	flows::RefreshMetrics,
	render,
	service::{RsvpService, ServiceError},
	shutdown::ShutdownSignal,
};

const HX_REQUEST: &str = "hx-request";
const HX_CURRENT_URL: &str = "hx-current-url";
const FETCH_FAILED: &str = "Failed to fetch RSVPs from backend";

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
	/// RSVP service backed by the response cache.
	pub service: RsvpService,
	/// Credential store, read for the health report.
	pub store: Arc<CredentialStore>,
	/// Refresh counters, read for the health report.
	pub refresh_metrics: Arc<RefreshMetrics>,
}

/// Errors a handler turns into a response.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// The path did not carry a usable event identifier.
	#[error(transparent)]
	InvalidEvent(#[from] IdentifierError),
	/// The service could not produce RSVPs.
	#[error(transparent)]
	Service(#[from] ServiceError),
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match self {
			Self::InvalidEvent(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
			Self::Service(_) => (StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED).into_response(),
		}
	}
}

/// Health summary of the background credential refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
	/// `ok`, `degraded` (last refreshes failed), or `unavailable` (no credential yet).
	pub status: String,
	/// Seconds since the stored credential was obtained.
	pub credential_age_secs: Option<i64>,
	/// Total refresh attempts.
	pub refresh_attempts: u64,
	/// Total failed refreshes.
	pub refresh_failures: u64,
	/// Failed refreshes since the last success.
	pub consecutive_refresh_failures: u64,
	/// Number of cached events, expired ones included until the next sweep.
	pub cached_events: usize,
}

/// Builds the router with CORS restricted to `allowed_origins`.
pub fn router(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
	Router::new()
		.route("/alive", get(alive))
		.route("/health", get(health))
		.route("/{event_id}/rsvps", get(rsvps))
		.layer(cors(allowed_origins))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Serves `app` on `listener` until `shutdown` fires, then drains in-flight requests.
pub async fn serve(
	listener: TcpListener,
	app: Router,
	mut shutdown: ShutdownSignal,
) -> std::io::Result<()> {
	if let Ok(addr) = listener.local_addr() {
		tracing::info!(%addr, "Listening for RSVP requests.");
	}

	axum::serve(listener, app).with_graceful_shutdown(async move { shutdown.cancelled().await }).await
}

fn cors(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
	CorsLayer::new()
		.allow_origin(AllowOrigin::list(allowed_origins))
		.allow_methods([Method::GET])
		.allow_credentials(true)
		.allow_headers([
			HeaderName::from_static(HX_CURRENT_URL),
			HeaderName::from_static(HX_REQUEST),
			CONTENT_TYPE,
			ACCEPT,
		])
}

async fn alive() -> &'static str {
	"OK"
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
	let metrics = &state.refresh_metrics;
	let age = state.store.age();
	let consecutive = metrics.consecutive_failures();
	let (code, status) = match (age, consecutive) {
		(None, _) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
		(Some(_), 0) => (StatusCode::OK, "ok"),
		(Some(_), _) => (StatusCode::OK, "degraded"),
	};

	(
		code,
		Json(HealthReport {
			status: status.into(),
			credential_age_secs: age.map(|age| age.whole_seconds()),
			refresh_attempts: metrics.attempts(),
			refresh_failures: metrics.failures(),
			consecutive_refresh_failures: consecutive,
			cached_events: state.service.cache().len(),
		}),
	)
}

async fn rsvps(
	State(state): State<AppState>,
	Path(event_id): Path<String>,
	headers: HeaderMap,
) -> Result<Response, ApiError> {
	let event = EventId::new(&event_id)?;
	let rsvps = state.service.rsvps(&event).await?;

	if is_htmx(&headers) {
		Ok(Html(render::render_rsvps(&rsvps)).into_response())
	} else {
		Ok(Json(rsvps).into_response())
	}
}

fn is_htmx(headers: &HeaderMap) -> bool {
	headers.get(HX_REQUEST).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"true"))
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use axum::{
		body::{self, Body},
		http::{Request, header::ORIGIN},
	};
	use tower::ServiceExt;
	// self
	use super::*;
	use crate::{
		auth::{Credential, GroupName},
		cache::ResponseCache,
		error::UpstreamError,
		service::Rsvps,
		upstream::{Member, Photo, RsvpEntry, RsvpFuture, RsvpResponse, RsvpSet, RsvpSource},
	};

	#[derive(Default)]
	struct FakeSource {
		calls: AtomicUsize,
		failing: bool,
	}
	impl RsvpSource for FakeSource {
		fn fetch_rsvps<'a>(
			&'a self,
			_event: &'a EventId,
			_group: &'a GroupName,
			_timeout: Duration,
		) -> RsvpFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);

				if self.failing {
					return Err(UpstreamError::Status { status: 401, retry_after: None }.into());
				}

				Ok(RsvpSet::from(vec![
					RsvpEntry {
						member: Member {
							id: "1".into(),
							name: "Ada".into(),
							photo: Some(Photo {
								photo_link: Some("https://img.example.com/1.jpg".into()),
								thumb_link: Some("https://img.example.com/1_t.jpg".into()),
							}),
						},
						response: RsvpResponse::Yes,
						guests: 1,
					},
					RsvpEntry {
						member: Member { id: "2".into(), name: "Linus".into(), photo: None },
						response: RsvpResponse::No,
						guests: 0,
					},
				]))
			})
		}
	}

	fn app(source: Arc<FakeSource>, store: CredentialStore) -> Router {
		let cache = ResponseCache::new(
			source,
			GroupName::new("Graz-Open-Source-Meetup").expect("Group fixture should be valid."),
		);
		let state = AppState {
			service: RsvpService::new(Arc::new(cache)),
			store: Arc::new(store),
			refresh_metrics: Default::default(),
		};

		router(state, vec![HeaderValue::from_static("https://gograz.org")])
	}

	async fn body_text(response: Response) -> String {
		let bytes =
			body::to_bytes(response.into_body(), usize::MAX).await.expect("Body should be readable.");

		String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8.")
	}

	fn get(uri: &str) -> Request<Body> {
		Request::get(uri).body(Body::empty()).expect("Request fixture should build.")
	}

	#[tokio::test]
	async fn rsvps_are_served_as_json_and_cached() {
		let source = Arc::new(FakeSource::default());
		let app = app(source.clone(), CredentialStore::default());
		let response =
			app.clone().oneshot(get("/296131786/rsvps")).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::OK);

		let rsvps: Rsvps =
			serde_json::from_str(&body_text(response).await).expect("Body should be RSVP JSON.");

		assert_eq!(rsvps.yes.len(), 1);
		assert_eq!(rsvps.yes[0].thumb_link.as_deref(), Some("https://img.example.com/1_t.jpg"));
		assert_eq!(rsvps.no[0].name, "Linus");

		let response = app.oneshot(get("/296131786/rsvps")).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(source.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn htmx_requests_receive_html() {
		let app = app(Arc::new(FakeSource::default()), CredentialStore::default());
		let request = Request::get("/296131786/rsvps")
			.header(HX_REQUEST, "true")
			.body(Body::empty())
			.expect("Request fixture should build.");
		let response = app.oneshot(request).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::OK);
		assert!(
			response
				.headers()
				.get(CONTENT_TYPE)
				.and_then(|value| value.to_str().ok())
				.is_some_and(|value| value.starts_with("text/html"))
		);
		assert!(body_text(response).await.contains("<span class=\"rsvp__name\">Ada</span>"));
	}

	#[tokio::test]
	async fn upstream_failures_are_generic_500s() {
		let app = app(
			Arc::new(FakeSource { failing: true, ..Default::default() }),
			CredentialStore::default(),
		);
		let response = app.oneshot(get("/296131786/rsvps")).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body_text(response).await, FETCH_FAILED);
	}

	#[tokio::test]
	async fn malformed_event_ids_are_rejected() {
		let source = Arc::new(FakeSource::default());
		let app = app(source.clone(), CredentialStore::default());
		let response = app.oneshot(get("/a%2Fb/rsvps")).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(source.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn dot_segment_event_ids_are_rejected() {
		let source = Arc::new(FakeSource::default());
		let app = app(source.clone(), CredentialStore::default());

		for uri in ["/%2E%2E/rsvps", "/%2E%2E%5C%2E%2E%5Cself/rsvps", "/a%5Cb/rsvps"] {
			let response = app.clone().oneshot(get(uri)).await.expect("Router should respond.");

			assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} must be rejected.");
		}

		assert_eq!(source.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn alive_and_health_report_state() {
		let app = app(Arc::new(FakeSource::default()), CredentialStore::default());
		let response = app.clone().oneshot(get("/alive")).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::OK);

		let response = app.oneshot(get("/health")).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

		let report: HealthReport =
			serde_json::from_str(&body_text(response).await).expect("Body should be JSON.");

		assert_eq!(report.status, "unavailable");
		assert!(report.credential_age_secs.is_none());

		let app = app_with_credential();
		let response = app.oneshot(get("/health")).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::OK);

		let report: HealthReport =
			serde_json::from_str(&body_text(response).await).expect("Body should be JSON.");

		assert_eq!(report.status, "ok");
		assert!(report.credential_age_secs.is_some_and(|age| age >= 0));
	}

	fn app_with_credential() -> Router {
		app(
			Arc::new(FakeSource::default()),
			CredentialStore::with_credential(Credential::new("token")),
		)
	}

	#[tokio::test]
	async fn cors_allows_configured_origins_only() {
		let app = app(Arc::new(FakeSource::default()), CredentialStore::default());
		let preflight = |origin: &'static str| {
			Request::builder()
				.method(Method::OPTIONS)
				.uri("/296131786/rsvps")
				.header(ORIGIN, origin)
				.header("access-control-request-method", "GET")
				.header("access-control-request-headers", "hx-request")
				.body(Body::empty())
				.expect("Request fixture should build.")
		};
		let response =
			app.clone().oneshot(preflight("https://gograz.org")).await.expect("Router should respond.");

		assert_eq!(
			response.headers().get("access-control-allow-origin"),
			Some(&HeaderValue::from_static("https://gograz.org"))
		);
		assert_eq!(
			response.headers().get("access-control-allow-credentials"),
			Some(&HeaderValue::from_static("true"))
		);

		let response =
			app.oneshot(preflight("https://evil.example.com")).await.expect("Router should respond.");

		assert!(response.headers().get("access-control-allow-origin").is_none());
	}
}
