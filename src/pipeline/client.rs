//! HTTP client for the violation API, used by the offline pipeline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::Config;
use crate::error::PipelineError;
use crate::middleware::signature::{SIGNATURE_HEADER, sign_payload};
use crate::models::driver_profile::DriverProfile;
use crate::models::violation::{CreateViolationRequest, ViolationCreatedResponse};

/// Where detected violations are looked up and reported.
#[async_trait]
pub trait ViolationApi: Send + Sync {
    /// Driver profile for `plate`, `None` when the plate has no record.
    async fn fetch_profile(&self, plate: &str) -> Result<Option<DriverProfile>, PipelineError>;

    /// Report a violation.
    async fn submit_violation(
        &self,
        report: &CreateViolationRequest,
    ) -> Result<ViolationCreatedResponse, PipelineError>;
}

/// [`ViolationApi`] over HTTP.
///
/// Reports are signed with `INGEST_SECRET` when one is configured.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    secret: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, secret: Option<String>) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        Self::new(config.api_base_url.clone(), config.ingest_secret.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn api_error(response: reqwest::Response) -> PipelineError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    PipelineError::Api { status, body }
}

#[async_trait]
impl ViolationApi for ApiClient {
    async fn fetch_profile(&self, plate: &str) -> Result<Option<DriverProfile>, PipelineError> {
        let response = self
            .client
            .get(self.url(&format!("/api/v1/offenders/{}", plate)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => Err(api_error(response).await),
        }
    }

    async fn submit_violation(
        &self,
        report: &CreateViolationRequest,
    ) -> Result<ViolationCreatedResponse, PipelineError> {
        let body = serde_json::to_vec(report)?;

        let mut request = self
            .client
            .post(self.url("/api/v1/violations"))
            .header("Content-Type", "application/json");
        if let Some(ref secret) = self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body));
        }

        let response = request.body(body).send().await?;
        if response.status() != StatusCode::CREATED {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::signature::verify_signature;
    use axum::{
        Json, Router,
        body::Bytes,
        extract::Path,
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::{get, post},
    };

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn report() -> CreateViolationRequest {
        CreateViolationRequest {
            vehicle_plate: Some("ABC1234".to_string()),
            fine_amount: Some(150.0),
            image_path: Some("output/images/a.jpg".to_string()),
            video_clip_path: Some("output/clips/a.gif".to_string()),
            ocr_confidence: Some(0.9),
        }
    }

    #[tokio::test]
    async fn profile_lookup_maps_not_found_to_none() {
        let app = Router::new().route(
            "/api/v1/offenders/{plate}",
            get(|Path(plate): Path<String>| async move {
                if plate == "ABC1234" {
                    let mut profile = DriverProfile::empty(plate);
                    profile.apply_violation(7, chrono::Utc::now());
                    Json(profile).into_response()
                } else {
                    AxumStatus::NOT_FOUND.into_response()
                }
            }),
        );
        let client = ApiClient::new(serve(app).await, None).unwrap();

        let known = client.fetch_profile("ABC1234").await.unwrap().unwrap();
        assert_eq!(known.total_violations, 1);
        assert_eq!(known.history, vec![7]);
        assert!(client.fetch_profile("ZZ999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn submission_is_signed() {
        let app = Router::new().route(
            "/api/v1/violations",
            post(|headers: HeaderMap, body: Bytes| async move {
                let signature = headers
                    .get(SIGNATURE_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if !verify_signature("s3cret", &body, signature) {
                    return AxumStatus::UNAUTHORIZED.into_response();
                }
                (
                    AxumStatus::CREATED,
                    Json(serde_json::json!({"message": "Violation logged successfully", "violation_id": 42})),
                )
                    .into_response()
            }),
        );
        let client = ApiClient::new(serve(app).await, Some("s3cret".to_string())).unwrap();

        let created = client.submit_violation(&report()).await.unwrap();
        assert_eq!(created.violation_id, 42);
    }

    #[tokio::test]
    async fn rejected_submission_carries_status_and_body() {
        let app = Router::new().route(
            "/api/v1/violations",
            post(|| async { (AxumStatus::UNPROCESSABLE_ENTITY, "bad plate") }),
        );
        let client = ApiClient::new(serve(app).await, None).unwrap();

        match client.submit_violation(&report()).await {
            Err(PipelineError::Api { status, body }) => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad plate");
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.violation_id)),
        }
    }

    #[tokio::test]
    async fn unreachable_api_is_transport_error() {
        let client = ApiClient::new("http://127.0.0.1:1", None).unwrap();
        assert!(matches!(
            client.fetch_profile("ABC1234").await,
            Err(PipelineError::Http(_))
        ));
    }
}
