use http::header::{self, HeaderValue};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

type AdminBody = BoxBody<Bytes, Infallible>;

/// Health, readiness and status surface for a component.
///
/// `/ready` answers 503 until `is_ready` reports true; `/status` serves the
/// JSON document produced by the `status` closure.
pub struct AdminService<R, S, E> {
    is_ready: R,
    status: S,
    _error: PhantomData<E>,
}

impl<R, S, E> AdminService<R, S, E>
where
    R: Fn() -> bool,
    S: Fn() -> serde_json::Value,
{
    pub fn new(is_ready: R, status: S) -> Self {
        Self {
            is_ready,
            status,
            _error: PhantomData,
        }
    }
}

impl<R, S, B, E> Service<Request<B>> for AdminService<R, S, E>
where
    R: Fn() -> bool + Send + 'static,
    S: Fn() -> serde_json::Value + Send + 'static,
    B: Send + 'static,
    E: Send + 'static,
{
    type Response = Response<AdminBody>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let is_ready = (self.is_ready)();
        let status = (self.status)();

        Box::pin(async move {
            let ok_body = || Full::new(Bytes::from("ok\n")).boxed();

            let res = match req.uri().path() {
                "/health" => Response::new(ok_body()),
                "/ready" => match is_ready {
                    true => Response::new(ok_body()),
                    false => error_response(StatusCode::SERVICE_UNAVAILABLE),
                },
                "/status" => json_response(&status),
                _ => error_response(StatusCode::NOT_FOUND),
            };
            Ok(res)
        })
    }
}

// The admin surface only ever reports plain-text errors; the status text is
// body enough.
fn error_response(status: StatusCode) -> Response<AdminBody> {
    let reason = status.canonical_reason().unwrap_or("error");
    let mut response = Response::new(Full::new(Bytes::from(reason)).boxed());
    *response.status_mut() = status;
    response
}

fn json_response(value: &serde_json::Value) -> Response<AdminBody> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::new(Full::new(Bytes::from(body)).boxed());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(path: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn service(ready: bool) -> AdminService<impl Fn() -> bool, impl Fn() -> serde_json::Value, Infallible> {
        AdminService::new(move || ready, || json!({"rollout_id": "r0"}))
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let response = service(false).call(request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_reflects_the_readiness_probe() {
        let response = service(false).call(request("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("Service Unavailable"));

        let response = service(true).call(request("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_serves_the_provider_json() {
        let response = service(true).call(request("/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, json!({"rollout_id": "r0"}));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let response = service(true).call(request("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
