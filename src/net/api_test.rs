use super::*;
use serde_json::json;

#[test]
fn login_payload_has_email_and_password() {
    assert_eq!(login_payload("a@x.com", "pw"), json!({ "email": "a@x.com", "password": "pw" }));
}

#[test]
fn refresh_payload_wraps_token() {
    assert_eq!(refresh_payload("R1"), json!({ "refresh": "R1" }));
}

#[test]
fn parse_token_pair_reads_access_and_refresh() {
    let credential = parse_token_pair(json!({ "access": "T1", "refresh": "R1" })).unwrap();
    assert_eq!(credential, Credential::new("T1", "R1"));
}

#[test]
fn parse_token_pair_rejects_missing_refresh() {
    let err = parse_token_pair(json!({ "access": "T1" })).unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)));
}

#[test]
fn parse_token_pair_rejects_empty_tokens() {
    let err = parse_token_pair(json!({ "access": "", "refresh": "R1" })).unwrap_err();
    assert_eq!(err, GatewayError::Malformed("token pair: empty token".into()));
}

#[test]
fn parse_refreshed_keeps_refresh_when_not_rotated() {
    let credential = parse_refreshed(json!({ "access": "T2" }), &Credential::new("T1", "R1")).unwrap();
    assert_eq!(credential, Credential::new("T2", "R1"));
}

#[test]
fn parse_refreshed_takes_rotated_refresh() {
    let credential =
        parse_refreshed(json!({ "access": "T2", "refresh": "R2" }), &Credential::new("T1", "R1")).unwrap();
    assert_eq!(credential, Credential::new("T2", "R2"));
}

#[test]
fn parse_identity_rejects_wrong_shape() {
    let err = parse_identity(json!({ "detail": "ok" })).unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(message) if message.starts_with("identity:")));
}

#[test]
fn login_failure_message_prefers_detail() {
    let errors = FieldErrors::from_body(&json!({ "detail": "No active account found" }));
    assert_eq!(login_failure_message(&errors), "No active account found");
}

#[test]
fn login_failure_message_flattens_field_errors() {
    let errors = FieldErrors::from_body(&json!({ "email": ["This field is required."] }));
    assert_eq!(login_failure_message(&errors), "email: This field is required.");
}

#[test]
fn login_failure_message_falls_back_to_generic() {
    assert_eq!(login_failure_message(&FieldErrors::new()), LOGIN_FAILED_MESSAGE);
}

#[test]
fn login_error_maps_401_to_invalid_credentials() {
    let err = login_error(GatewayError::Unauthorized(Some("No active account found".into())));
    assert_eq!(err, SessionError::InvalidCredentials("No active account found".into()));
}

#[test]
fn login_error_maps_transport_failure_to_network_error() {
    let err = login_error(GatewayError::Unavailable { status: None, message: "dns".into() });
    assert_eq!(err, SessionError::NetworkError("dns".into()));
}
