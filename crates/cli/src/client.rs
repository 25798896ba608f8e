//! API client for the Flight Prediction API

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Structured failure returned by the server
#[derive(Debug, Error)]
#[error("API error ({status}, {}): {message}", .code.as_deref().unwrap_or("unknown"))]
pub struct ApiError {
    pub status: StatusCode,
    /// Machine-readable code such as `invalid_request`
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        // Without a trailing slash, join() would drop the last path segment
        let mut base_url = Url::parse(base_url).context("Invalid API URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send_get(path).await?;
        Self::decode(response).await
    }

    /// GET a probe endpoint. 503 still carries a meaningful body, so only
    /// other failures are errors.
    pub async fn get_probe<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let response = self.send_get(path).await?;
        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            let body = response.json().await.context("Failed to parse response")?;
            return Ok((status, body));
        }
        Ok((status, Self::decode(response).await?))
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn send_get(&self, path: &str) -> Result<Response> {
        let url = self.base_url.join(path).context("Invalid path")?;
        self.client
            .get(url)
            .send()
            .await
            .context("Failed to send request")
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(parsed) => ApiError {
                    status,
                    code: parsed.code,
                    message: parsed.error,
                },
                Err(_) => ApiError {
                    status,
                    code: None,
                    message: body,
                },
            };
            return Err(err.into());
        }

        response.json().await.context("Failed to parse response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flight_lib::{DelayLabel, PredictionResponse, PredictionResult, RequestAttributes};
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_post_decodes_prediction() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict_delay")
            .match_body(Matcher::Json(json!({"aircraft_qf402": 1.0})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"delay_prediction": "On time"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let body = RequestAttributes::new().with("aircraft_qf402", 1.0);
        let response: PredictionResponse = client.post("predict_delay", &body).await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            response.result,
            PredictionResult::Delay {
                delay_prediction: DelayLabel::OnTime
            }
        );
        assert!(response.diagnostics.is_none());
    }

    #[tokio::test]
    async fn test_error_body_becomes_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict_price")
            .match_query(Matcher::UrlEncoded("strict".into(), "true".into()))
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "invalid request: bad width", "code": "invalid_request"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .post::<PredictionResponse, _>("predict_price?strict=true", &json!({}))
            .await
            .unwrap_err();

        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code.as_deref(), Some("invalid_request"));
        assert!(api.message.contains("bad width"));
    }

    #[tokio::test]
    async fn test_probe_accepts_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/readyz")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ready": false, "reason": "Models not loaded yet"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let (status, readiness): (_, flight_lib::ReadinessResponse) =
            client.get_probe("readyz").await.unwrap();

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!readiness.ready);
    }

    #[tokio::test]
    async fn test_base_path_preserved() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flights/schema/price")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/flights", server.url())).unwrap();
        let body: serde_json::Value = client.get("schema/price").await.unwrap();

        mock.assert_async().await;
        assert_eq!(body["ok"], true);
    }
}
