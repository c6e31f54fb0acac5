use crate::types::ApiError;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

/// Error body shape used by the server (`{"detail": "..."}`)
#[derive(Deserialize)]
struct ErrorDetail {
    detail: String,
}

/// Check response status and map failures to typed errors.
/// Returns Ok(Response) if successful.
pub async fn check_response_error(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let response_text = response
        .text()
        .await
        .map_err(|e| ApiError::NetworkError(e.to_string()))?;

    // Prefer the server's human-readable detail when present
    let message = serde_json::from_str::<ErrorDetail>(&response_text)
        .map(|d| d.detail)
        .unwrap_or(response_text);

    let error = match status {
        StatusCode::UNAUTHORIZED => ApiError::Authentication(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ApiError::InvalidRequest(message)
        }
        status if status.is_server_error() => ApiError::ServiceError(message),
        _ => ApiError::Unknown(format!("Status {status}: {message}")),
    };

    Err(error)
}

/// Parse a successful JSON response into the expected type
pub async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response_text = response
        .text()
        .await
        .map_err(|e| ApiError::NetworkError(e.to_string()))?;

    serde_json::from_str(&response_text)
        .map_err(|e| ApiError::Unknown(format!("Failed to parse response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_extracted_from_json_body() {
        let parsed = serde_json::from_str::<ErrorDetail>(r#"{"detail":"Thesis not found"}"#);
        assert_eq!(parsed.unwrap().detail, "Thesis not found");
    }
}
