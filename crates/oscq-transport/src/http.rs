use crate::ws;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use oscq_core::{HostInfo, ProtocolRouter};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct QueryState {
    pub router: Arc<ProtocolRouter>,
    pub host_info: Arc<HostInfo>,
    pub shutdown: watch::Receiver<bool>,
}

/// One catch-all handler: WebSocket upgrades, `HOST_INFO`, or the snapshot.
pub fn query_app(state: QueryState) -> Router {
    Router::new().fallback(handle_request).with_state(state)
}

/// `?HOST_INFO`, `?HOST_INFO=...` or a trailing `/HOST_INFO` segment.
pub fn wants_host_info(uri: &Uri) -> bool {
    let in_query = uri
        .query()
        .map(|q| q.split('&').any(|kv| kv.split('=').next() == Some("HOST_INFO")))
        .unwrap_or(false);
    in_query || uri.path().trim_end_matches('/').rsplit('/').next() == Some("HOST_INFO")
}

async fn handle_request(
    State(state): State<QueryState>,
    method: Method,
    uri: Uri,
    upgrade: Option<WebSocketUpgrade>,
) -> Response {
    if let Some(upgrade) = upgrade {
        let router = Arc::clone(&state.router);
        let shutdown = state.shutdown.clone();
        return upgrade.on_upgrade(move |socket| ws::serve_connection(socket, router, shutdown));
    }

    if method != Method::GET {
        tracing::debug!("HTTP: {} {} rejected", method, uri);
        return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET")]).into_response();
    }

    let body = if wants_host_info(&uri) {
        state.host_info.to_json()
    } else {
        state.router.snapshot().to_json()
    };

    match body {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            tracing::error!("HTTP: failed to serialise response for {}: {}", uri, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_info_detection() {
        let yes = ["/?HOST_INFO", "/?HOST_INFO=1", "/?a=b&HOST_INFO", "/HOST_INFO", "/x/HOST_INFO/"];
        let no = ["/", "/Root/Light", "/?LISTEN", "/HOST_INFOS"];
        for u in yes {
            assert!(wants_host_info(&u.parse().unwrap()), "{u}");
        }
        for u in no {
            assert!(!wants_host_info(&u.parse().unwrap()), "{u}");
        }
    }
}
