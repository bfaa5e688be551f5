use crate::context::GlobalContext;
use crate::errors::FetchError;
use bytes::Bytes;
use reqwest::header::AUTHORIZATION;
use std::sync::Arc;

/// Client for the service-management configs endpoint. Bodies are returned
/// verbatim; the service config is an opaque blob to the manager.
#[derive(Clone)]
pub struct ServiceConfigsClient {
    context: Arc<GlobalContext>,
    client: reqwest::Client,
    base_url: String,
}

impl ServiceConfigsClient {
    pub fn new(context: Arc<GlobalContext>) -> Self {
        let base_url = format!(
            "{}/v1/services/{}/configs",
            context
                .server_config()
                .service_management
                .url
                .trim_end_matches('/'),
            context.service_name()
        );

        ServiceConfigsClient {
            context,
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub async fn fetch(&self, config_id: &str) -> Result<Bytes, FetchError> {
        let url = format!("{}/{}", self.base_url, config_id);

        let mut request = self.client.get(&url);
        if let Some(token) = self.context.auth_token() {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status(),
                url,
            });
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{test_context, test_context_with_token};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_the_body_verbatim() {
        let server = MockServer::start().await;

        let body = r#"{"name": "bookstore.endpoints.test", "id": "2024-03-18r0"}"#;
        Mock::given(method("GET"))
            .and(path("/v1/services/svc/configs/2024-03-18r0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = ServiceConfigsClient::new(test_context(&server.uri()));
        let blob = client.fetch("2024-03-18r0").await.expect("fetch config");

        assert_eq!(blob, Bytes::from(body));
    }

    #[tokio::test]
    async fn attaches_the_bearer_token_when_available() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/services/svc/configs/r0"))
            .and(header("authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ServiceConfigsClient::new(test_context_with_token(&server.uri(), "sekrit"));
        client.fetch("r0").await.expect("fetch config");
    }

    #[tokio::test]
    async fn not_found_is_a_typed_error() {
        let server = MockServer::start().await;

        // A valid rollout can reference a config that has not propagated yet.
        Mock::given(method("GET"))
            .and(path("/v1/services/svc/configs/r9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ServiceConfigsClient::new(test_context(&server.uri()));
        let error = client.fetch("r9").await.unwrap_err();

        assert!(matches!(error, FetchError::Status { status, .. } if status.as_u16() == 404));
    }
}
