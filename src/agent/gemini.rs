use async_trait::async_trait;
use futures_util::StreamExt;
use rig::completion::CompletionModel;
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use rig::streaming::StreamedAssistantContent;
use serde::Deserialize;
use tracing::{debug, error};

use super::{CompletionProvider, FragmentStream};
use crate::config::Config;
use crate::errors::AppError;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

/// Streams completions through the rig [`gemini::Client`].
///
/// Model listing is not covered by rig, so it goes through a plain
/// `reqwest` client against the same base URL.
#[derive(Clone)]
pub struct GeminiAgentService {
    client: gemini::Client,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiAgentService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = gemini::Client::builder()
            .api_key(config.api_key.as_str())
            .base_url(config.api_base_url.as_str())
            .build()
            .map_err(|e| AppError::ClientSetup { message: e.to_string() })?;
        Ok(Self {
            client,
            http: reqwest::Client::new(),
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn classify(&self, message: String) -> AppError {
        if message.contains("Connection refused")
            || message.contains("connect")
            || message.contains("error sending request")
        {
            AppError::ProviderUnavailable { host: self.base_url.clone() }
        } else if message.contains("model") && message.contains("not found") {
            AppError::ModelNotFound { model_name: self.model.clone() }
        } else {
            AppError::InferenceError { message }
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Err(AppError::ProviderStatus { status: status.as_u16(), body })
    }
}

#[async_trait]
impl CompletionProvider for GeminiAgentService {
    async fn stream_completion(&self, prompt: &str) -> Result<FragmentStream, AppError> {
        debug!("Requesting streamed completion from model {}", self.model);
        let model = self.client.completion_model(self.model.as_str());
        let response = model
            .completion_request(prompt)
            .stream()
            .await
            .map_err(|e| {
                error!("Gemini stream could not be opened: {e}");
                self.classify(e.to_string())
            })?;

        let fragments = response.filter_map(|item| async move {
            match item {
                Ok(StreamedAssistantContent::Text(text)) if !text.text.is_empty() => {
                    Some(Ok(text.text))
                }
                Ok(_) => None,
                Err(e) => Some(Err(AppError::InferenceError { message: e.to_string() })),
            }
        });
        Ok(Box::pin(fragments))
    }

    async fn list_models(&self) -> Result<Vec<String>, AppError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url).header(API_KEY_HEADER, &self.api_key);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let response = request
                .send()
                .await
                .map_err(|_| AppError::ProviderUnavailable { host: self.base_url.clone() })?;
            let page: ModelList = Self::ensure_success(response)
                .await?
                .json()
                .await
                .map_err(|e| AppError::malformed(e.to_string()))?;

            names.extend(page.models.into_iter().map(|m| {
                m.name.strip_prefix("models/").map(str::to_string).unwrap_or(m.name)
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::service::relay_service::RelayService;

    const KEY: &str = "test-key";

    fn config(base_url: String) -> Config {
        Config {
            api_key: KEY.to_string(),
            model: "gemini-test".to_string(),
            api_base_url: base_url,
            port: 0,
        }
    }

    async fn spawn_mock(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn relay(base_url: String) -> RelayService {
        let service = GeminiAgentService::new(&config(base_url)).unwrap();
        RelayService::new(Arc::new(service))
    }

    fn sse(body: &'static str) -> axum::response::Response {
        ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
    }

    // Chunks shaped like real `streamGenerateContent?alt=sse` output.
    const STREAMED_REPLY: &str = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}],\"role\":\"model\"},\"index\":0}],",
        "\"usageMetadata\":{\"promptTokenCount\":1,\"candidatesTokenCount\":1,\"totalTokenCount\":2},",
        "\"modelVersion\":\"gemini-test\",\"responseId\":\"r1\"}\r\n\r\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" there\"}],\"role\":\"model\"},",
        "\"finishReason\":\"STOP\",\"index\":0}],",
        "\"usageMetadata\":{\"promptTokenCount\":1,\"candidatesTokenCount\":2,\"totalTokenCount\":3},",
        "\"modelVersion\":\"gemini-test\",\"responseId\":\"r1\"}\r\n\r\n",
    );

    #[tokio::test]
    async fn relays_text_fragments_in_order() {
        let router = Router::new().route(
            "/v1beta/models/{action}",
            post(|Path(action): Path<String>, Json(body): Json<serde_json::Value>| async move {
                if action != "gemini-test:streamGenerateContent"
                    || !body.to_string().contains("Hello")
                {
                    return StatusCode::BAD_REQUEST.into_response();
                }
                sse(STREAMED_REPLY)
            }),
        );
        let relay = relay(spawn_mock(router).await);

        let stream = relay.open_stream("Hello").await.unwrap();
        let fragments: Vec<String> = stream
            .map(|item| item.map_err(|e| e.to_string()))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(fragments.concat(), "Hi there");
    }

    #[tokio::test]
    async fn error_status_fails_before_streaming() {
        let router = Router::new().route(
            "/v1beta/models/{action}",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    r#"{"error":{"code":404,"message":"models/gemini-test is not found","status":"NOT_FOUND"}}"#,
                )
            }),
        );
        let relay = relay(spawn_mock(router).await);

        assert!(relay.open_stream("Hello").await.is_err());
    }

    #[tokio::test]
    async fn unreachable_host_fails_before_streaming() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let relay = relay(format!("http://{addr}"));

        assert!(relay.open_stream("Hello").await.is_err());
    }

    #[test]
    fn connection_failures_are_classified_as_unavailable() {
        let service = GeminiAgentService::new(&config("http://127.0.0.1:1".to_string())).unwrap();

        let err = service.classify("HttpError: error sending request for url".to_string());
        assert!(err.is_agent_unavailable());
        assert!(matches!(
            service.classify("models/gemini-test is not found".to_string()),
            AppError::ModelNotFound { .. }
        ));
        assert!(matches!(
            service.classify("quota exceeded".to_string()),
            AppError::InferenceError { .. }
        ));
    }

    #[tokio::test]
    async fn lists_models_across_pages() {
        let router = Router::new().route(
            "/v1beta/models",
            get(|Query(query): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                if headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) != Some(KEY) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                let page = match query.get("pageToken").map(String::as_str) {
                    None => serde_json::json!({
                        "models": [{"name": "models/gemini-2.5-flash"}],
                        "nextPageToken": "p2"
                    }),
                    Some("p2") => serde_json::json!({
                        "models": [{"name": "models/gemini-2.5-pro"}]
                    }),
                    Some(_) => return StatusCode::BAD_REQUEST.into_response(),
                };
                Json(page).into_response()
            }),
        );
        let service = GeminiAgentService::new(&config(spawn_mock(router).await)).unwrap();

        let models = service.list_models().await.unwrap();

        assert_eq!(models, ["gemini-2.5-flash", "gemini-2.5-pro"]);
    }

    #[tokio::test]
    async fn model_listing_reports_error_status() {
        let router = Router::new().route(
            "/v1beta/models",
            get(|| async { (StatusCode::FORBIDDEN, "API key not valid") }),
        );
        let service = GeminiAgentService::new(&config(spawn_mock(router).await)).unwrap();

        let err = service.list_models().await.unwrap_err();

        assert!(matches!(err, AppError::ProviderStatus { status: 403, ref body } if body == "API key not valid"));
    }
}
