//! Matchit routing configuration: one read-only subscription route.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response};
use matchit::Router as MatchitRouter;

use crate::snapshots::Snapshots;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub snapshots: Snapshots,
}

/// HTTP request router.
pub struct Router {
    inner: MatchitRouter<RouteHandler>,
    state: AppState,
}

impl Router {
    pub fn new(snapshots: Snapshots) -> Self {
        let mut router = MatchitRouter::new();
        router
            .insert("/projections/:name", RouteHandler::Projection)
            .expect("failed to insert /projections/:name route");

        Self {
            inner: router,
            state: AppState { snapshots },
        }
    }

    pub async fn route<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        if req.method() != hyper::Method::GET {
            return error_response(405, "method not allowed");
        }
        match self.inner.at(req.uri().path()) {
            Ok(matched) => matched.value.handle(matched.params, &self.state),
            Err(_) => error_response(404, "no such route"),
        }
    }
}

enum RouteHandler {
    Projection,
}

impl RouteHandler {
    fn handle(&self, params: matchit::Params<'_, '_>, state: &AppState) -> Response<Full<Bytes>> {
        match self {
            RouteHandler::Projection => {
                let name = match params.get("name") {
                    Some(name) => name,
                    None => return error_response(400, "missing projection name"),
                };
                match state.snapshots.get(name) {
                    Some(value) => json_response(200, &value),
                    None => error_response(404, "no published snapshot for that projection"),
                }
            }
        }
    }
}

fn json_response(status: u16, value: &serde_json::Value) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"null".to_vec());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response is always well-formed")
}

fn error_response(status: u16, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_projection_is_served() {
        let snapshots = Snapshots::new();
        snapshots.publish("entity_count", serde_json::json!(7));
        let router = Router::new(snapshots);

        let req = Request::builder()
            .method("GET")
            .uri("/projections/entity_count")
            .body(())
            .unwrap();
        let resp = router.route(req).await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn unpublished_projection_is_a_404() {
        let router = Router::new(Snapshots::new());
        let req = Request::builder()
            .method("GET")
            .uri("/projections/missing")
            .body(())
            .unwrap();
        let resp = router.route(req).await;
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn non_get_method_is_rejected() {
        let router = Router::new(Snapshots::new());
        let req = Request::builder()
            .method("POST")
            .uri("/projections/entity_count")
            .body(())
            .unwrap();
        let resp = router.route(req).await;
        assert_eq!(resp.status(), 405);
    }
}
