//! Response validation and decoding.
//!
//! # Design
//! The stages run in a fixed order: status extraction, range check,
//! underlying-error extraction for transport failures, then JSON decoding.
//! The first failing stage wins and nothing after it runs.
//!
//! Wire field names are snake_case, which is already the naming Rust
//! structs use, so serde's defaults map them without renaming. Timestamps
//! are ISO-8601 strings; `chrono::DateTime` and friends deserialize them
//! directly with chrono's `serde` feature enabled.

use serde::de::DeserializeOwned;

use crate::error::{ApiError, TransportError};
use crate::http::{HttpCodes, HttpResponse};

/// Check the status of `response` against `codes` and return its body.
pub fn validate(response: HttpResponse, codes: &HttpCodes) -> Result<Vec<u8>, ApiError> {
    let Some(code) = response.status else {
        tracing::error!(headers = ?response.headers, "unrecognized HTTP response");
        return Err(ApiError::UnexpectedResponse);
    };
    if !codes.contains(&code) {
        tracing::error!(code, accepted = ?codes, "unknown HTTP status code");
        return Err(ApiError::UnexpectedStatus(code));
    }
    Ok(response.body)
}

/// Flatten a transport wrapper error into its underlying cause.
///
/// Every other error kind passes through untouched.
pub fn extract_underlying_error(error: ApiError) -> ApiError {
    match error {
        ApiError::Transport(transport) => ApiError::Transport(transport.into_underlying()),
        other => other,
    }
}

/// Decode a JSON body. An empty body decodes as `null`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Run every stage over a raw transport outcome.
pub fn process<T: DeserializeOwned>(
    outcome: Result<HttpResponse, TransportError>,
    codes: &HttpCodes,
) -> Result<T, ApiError> {
    let body = outcome
        .map_err(ApiError::from)
        .and_then(|response| validate(response, codes))
        .map_err(extract_underlying_error)?;
    decode(&body)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::http::codes;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Repo {
        full_name: String,
        stargazers_count: u32,
        pushed_at: DateTime<Utc>,
        default_branch: Option<String>,
    }

    fn repo() -> Repo {
        Repo {
            full_name: "octo/hello".to_string(),
            stargazers_count: 42,
            pushed_at: Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap(),
            default_branch: Some("main".to_string()),
        }
    }

    #[test]
    fn accepts_every_code_inside_the_range() {
        for (range, code) in [(200..300, 200), (200..300, 299), (100..600, 404), (304..305, 304)] {
            let body = validate(HttpResponse::new(code, "{}"), &range).unwrap();
            assert_eq!(body, b"{}");
        }
    }

    #[test]
    fn rejects_codes_outside_the_range_with_literal_code() {
        for (range, code) in [(200..300, 300), (200..300, 199), (200..300, 404), (200..201, 201)] {
            let err = validate(HttpResponse::new(code, "{}"), &range).unwrap_err();
            assert_eq!(err, ApiError::UnexpectedStatus(code));
        }
    }

    #[test]
    fn missing_status_is_unexpected_response() {
        let response = HttpResponse {
            status: None,
            headers: Vec::new(),
            body: b"{}".to_vec(),
        };
        assert_eq!(
            validate(response, &codes::SUCCESS),
            Err(ApiError::UnexpectedResponse)
        );
    }

    #[test]
    fn decodes_snake_case_fields_and_iso8601_dates() {
        let body = br#"{
            "full_name": "octo/hello",
            "stargazers_count": 42,
            "pushed_at": "2024-03-09T14:30:05Z",
            "default_branch": "main"
        }"#;
        let decoded: Repo = decode(body).unwrap();
        assert_eq!(decoded, repo());
    }

    #[test]
    fn encoded_value_decodes_back_unchanged() {
        let original = repo();
        let body = serde_json::to_vec(&original).unwrap();
        let text = String::from_utf8(body.clone()).unwrap();
        assert!(text.contains("\"stargazers_count\""));
        assert!(text.contains("2024-03-09T14:30:05Z"));
        assert_eq!(decode::<Repo>(&body).unwrap(), original);
    }

    #[test]
    fn schema_mismatch_is_a_decoding_failure() {
        let err = decode::<Repo>(br#"{"full_name": 7}"#).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn bad_timestamp_is_a_decoding_failure() {
        let body = br#"{"full_name":"a","stargazers_count":1,"pushed_at":"yesterday","default_branch":null}"#;
        assert!(matches!(
            decode::<Repo>(body),
            Err(ApiError::DeserializationError(_))
        ));
    }

    #[test]
    fn empty_body_decodes_as_null() {
        decode::<()>(b"").unwrap();
        assert_eq!(decode::<Option<Repo>>(b"  ").unwrap(), None);
        assert!(decode::<Repo>(b"").is_err());
    }

    #[test]
    fn process_unwraps_wrapped_transport_errors() {
        let wrapped = TransportError::wrapping("request failed", TransportError::TimedOut);
        let err = process::<Repo>(Err(wrapped), &codes::SUCCESS).unwrap_err();
        assert_eq!(err, ApiError::Transport(TransportError::TimedOut));
    }

    #[test]
    fn process_preserves_offline() {
        let err = process::<Repo>(Err(TransportError::Offline), &codes::SUCCESS).unwrap_err();
        assert!(err.is_offline());

        let wrapped = TransportError::wrapping("request failed", TransportError::Offline);
        let err = process::<Repo>(Err(wrapped), &codes::SUCCESS).unwrap_err();
        assert!(err.is_offline());
    }

    #[test]
    fn extract_leaves_api_errors_alone() {
        assert_eq!(
            extract_underlying_error(ApiError::UnexpectedStatus(500)),
            ApiError::UnexpectedStatus(500)
        );
    }

    #[test]
    fn process_checks_status_before_decoding() {
        let err = process::<Repo>(Ok(HttpResponse::new(404, "not json")), &codes::SUCCESS)
            .unwrap_err();
        assert_eq!(err, ApiError::UnexpectedStatus(404));
        assert_eq!(err.to_string(), "Unexpected HTTP code: 404");
    }

    #[test]
    fn process_decodes_accepted_response() {
        let body = serde_json::to_vec(&repo()).unwrap();
        let decoded: Repo = process(Ok(HttpResponse::new(200, body)), &codes::SUCCESS).unwrap();
        assert_eq!(decoded, repo());
    }
}
