use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ProviderError, ValidationFailure};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider::{FetchFuture, Provider};
use crate::schema::{FieldType, Shape};
use crate::ProviderId;

use super::{decode_body, KAKAO_API_BASE_URL};

/// Kakao "send to me" text memo.
pub struct KakaoMessageProvider {
    id: ProviderId,
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    request_shape: Shape,
    response_shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemoRequest {
    pub user_id: String,
    pub kakao_token: String,
    pub message: String,
    /// Link attached to the memo button.
    pub link_url: Option<String>,
}

impl MemoRequest {
    fn template_object(&self) -> Value {
        let link = match &self.link_url {
            Some(url) => json!({ "web_url": url, "mobile_web_url": url }),
            None => json!({}),
        };
        json!({
            "object_type": "text",
            "text": self.message,
            "link": link,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoResult {
    pub result_code: i64,
}

impl KakaoMessageProvider {
    pub const NAME: &'static str = "kakao_message";

    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            id: ProviderId::from_static(Self::NAME),
            http_client,
            base_url: String::from(KAKAO_API_BASE_URL),
            request_shape: Shape::new()
                .required("user_id", FieldType::String)
                .required("kakao_token", FieldType::String)
                .required("message", FieldType::String)
                .optional("link_url", FieldType::String),
            response_shape: Shape::new().required("result_code", FieldType::Integer),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v2/api/talk/memo/default/send", self.base_url)
    }
}

impl Provider for KakaoMessageProvider {
    type Request = MemoRequest;
    type Response = MemoResult;

    fn name(&self) -> &ProviderId {
        &self.id
    }

    fn validate_request(
        &self,
        params: &Map<String, Value>,
    ) -> Result<MemoRequest, ValidationFailure> {
        self.request_shape.parse_map(params)
    }

    fn fetch<'a>(&'a self, request: MemoRequest) -> FetchFuture<'a> {
        Box::pin(async move {
            let template = request.template_object().to_string();
            let http_request = HttpRequest::post(self.endpoint())
                .with_bearer_token(&request.kakao_token)
                .with_form(&[("template_object", template.as_str())]);

            let response = self
                .http_client
                .execute(http_request)
                .await
                .map_err(ProviderError::from)?;
            if !response.is_success() {
                return Err(ProviderError::bad_status(
                    response.status,
                    format!("kakao memo request returned status {}", response.status),
                ));
            }

            decode_body(&response.body)
        })
    }

    fn validate_response(&self, raw: Value) -> Result<MemoResult, ValidationFailure> {
        self.response_shape.parse(&raw)
    }
}
