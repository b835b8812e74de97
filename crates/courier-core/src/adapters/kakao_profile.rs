use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ProviderError, ValidationFailure};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider::{FetchFuture, Provider};
use crate::schema::{FieldType, Shape};
use crate::ProviderId;

use super::{decode_body, KAKAO_API_BASE_URL};

/// Kakao "current user" profile lookup.
pub struct KakaoProfileProvider {
    id: ProviderId,
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    request_shape: Shape,
    response_shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileRequest {
    pub user_id: String,
    pub kakao_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KakaoProfile {
    pub id: i64,
    pub connected_at: String,
    pub properties: BTreeMap<String, String>,
}

impl KakaoProfileProvider {
    pub const NAME: &'static str = "kakao_profile";

    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            id: ProviderId::from_static(Self::NAME),
            http_client,
            base_url: String::from(KAKAO_API_BASE_URL),
            request_shape: Shape::new()
                .required("user_id", FieldType::String)
                .required("kakao_token", FieldType::String),
            response_shape: Shape::new()
                .required("id", FieldType::Integer)
                .required("connected_at", FieldType::String)
                .with_default("properties", FieldType::StringMap, json!({})),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v2/user/me", self.base_url)
    }
}

impl Provider for KakaoProfileProvider {
    type Request = ProfileRequest;
    type Response = KakaoProfile;

    fn name(&self) -> &ProviderId {
        &self.id
    }

    fn validate_request(
        &self,
        params: &Map<String, Value>,
    ) -> Result<ProfileRequest, ValidationFailure> {
        self.request_shape.parse_map(params)
    }

    fn fetch<'a>(&'a self, request: ProfileRequest) -> FetchFuture<'a> {
        Box::pin(async move {
            let http_request = HttpRequest::get(self.endpoint())
                .with_bearer_token(&request.kakao_token);

            let response = self
                .http_client
                .execute(http_request)
                .await
                .map_err(ProviderError::from)?;
            if !response.is_success() {
                return Err(ProviderError::bad_status(
                    response.status,
                    format!("kakao profile request returned status {}", response.status),
                ));
            }

            decode_body(&response.body)
        })
    }

    fn validate_response(&self, raw: Value) -> Result<KakaoProfile, ValidationFailure> {
        self.response_shape.parse(&raw)
    }
}
