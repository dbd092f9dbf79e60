//! Classification of failed attempts and unsuccessful responses.

use palisade_client::{ApiResponse, classify, kind_from_message, should_retry_response};
use palisade_error::{FailureKind, TransportError, TransportErrorKind};
use serde_json::json;

fn status(status_code: u16) -> TransportError {
    TransportError::new(TransportErrorKind::Status {
        status_code,
        message: String::new(),
    })
}

#[test]
fn test_listed_statuses_are_transient() {
    assert_eq!(classify(&status(429)), FailureKind::RateLimited);
    for code in [500, 502, 503, 504] {
        assert_eq!(classify(&status(code)), FailureKind::ServerError, "{code}");
    }
}

#[test]
fn test_unlisted_statuses_are_permanent() {
    assert_eq!(classify(&status(400)), FailureKind::ClientError);
    assert_eq!(classify(&status(408)), FailureKind::ClientError);
    assert_eq!(classify(&status(501)), FailureKind::Other);
}

#[test]
fn test_transport_faults() {
    let refused = TransportError::new(TransportErrorKind::Connection("refused".into()));
    let slow = TransportError::new(TransportErrorKind::Timeout("read".into()));
    let garbled = TransportError::new(TransportErrorKind::Decode("eof".into()));

    assert_eq!(classify(&refused), FailureKind::Connection);
    assert_eq!(classify(&slow), FailureKind::Timeout);
    assert_eq!(classify(&garbled), FailureKind::Other);
}

#[test]
fn test_message_keywords() {
    assert_eq!(kind_from_message("Read TIMEOUT"), Some(FailureKind::Timeout));
    assert_eq!(kind_from_message("Too Many Requests"), Some(FailureKind::RateLimited));
    assert_eq!(kind_from_message("Service Unavailable"), Some(FailureKind::ServerError));
    assert_eq!(kind_from_message("network unreachable"), Some(FailureKind::Connection));
    assert_eq!(kind_from_message("invalid api key"), None);
}

#[test]
fn test_response_retry_predicate() {
    assert!(!should_retry_response(&ApiResponse::ok(json!({}))));
    assert!(should_retry_response(&ApiResponse::new(503, json!({}))));
    assert!(!should_retry_response(&ApiResponse::new(404, json!({"error": "not found"}))));
    assert!(should_retry_response(&ApiResponse::new(
        400,
        json!({"error": {"message": "rate limit reached"}})
    )));
    assert!(should_retry_response(&ApiResponse::new(418, json!("connection reset"))));
}
