use axum::{
    extract::{ConnectInfo, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use super::identity::VisitorIdentity;
use super::ip_extractor::extract_client_ip;
use super::route::Visit;
use super::router::{Dispatch, Router};
use super::static_files::serve_static;
use crate::config::ClientIpConfig;
use crate::geo::GeoLocator;
use crate::storage::VisitCounter;

/// Everything a request needs, built once at startup
pub struct FilterState {
    pub router: Router,
    pub counter: Arc<dyn VisitCounter>,
    pub geo: Arc<dyn GeoLocator>,
    pub cookie_domain: String,
    pub client_ip: ClientIpConfig,
    pub static_dir: PathBuf,
}

/// Single entry point for every path
pub async fn handle_request(
    State(state): State<Arc<FilterState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let route = match state.router.dispatch(uri.path()) {
        Dispatch::Route(route) => route,
        Dispatch::Static(asset) => return serve_static(&state.static_dir, asset).await,
        Dispatch::NotFound => return (StatusCode::NOT_FOUND, "404 page not found").into_response(),
    };

    let identity = VisitorIdentity::resolve(&headers);
    let client_ip = extract_client_ip(&headers, addr.ip().to_canonical(), &state.client_ip);
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let visit = Visit {
        client_ip,
        visitor: identity.token(),
        user_agent,
    };
    let decision = route
        .evaluate(&visit, state.counter.as_ref(), state.geo.as_ref())
        .await;

    let body = route.template_for(decision.outcome).render().to_string();
    (identity.response_headers(&state.cookie_domain), Html(body)).into_response()
}
