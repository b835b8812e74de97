mod kakao_message;
mod kakao_profile;

use serde_json::Value;

use crate::error::ProviderError;

pub use kakao_message::{KakaoMessageProvider, MemoRequest, MemoResult};
pub use kakao_profile::{KakaoProfile, KakaoProfileProvider, ProfileRequest};

/// Production Kakao REST API host.
pub const KAKAO_API_BASE_URL: &str = "https://kapi.kakao.com";

/// Parse a response body as JSON. A malformed body is a transient failure,
/// not a shape mismatch.
fn decode_body(body: &str) -> Result<Value, ProviderError> {
    serde_json::from_str(body).map_err(|error| {
        ProviderError::internal(format!("response body is not valid JSON: {error}"))
    })
}
