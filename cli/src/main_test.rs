use super::*;
use siges_client::FieldErrors;

#[test]
fn parses_resource_update() {
    let cli = Cli::try_parse_from(["siges", "resource", "students", "update", "4", "--data", "{\"grade\":2}"]).unwrap();
    let Command::Resource(command) = cli.command else {
        panic!("expected resource command");
    };
    assert_eq!(command.kind, Resource::Students);
    assert!(matches!(command.action, ResourceAction::Update { ref id, .. } if id == "4"));
}

#[test]
fn rejects_unknown_resource() {
    assert!(Cli::try_parse_from(["siges", "resource", "courses", "list"]).is_err());
}

#[test]
fn parses_unauthorized_policy_flag() {
    let cli = Cli::try_parse_from(["siges", "--on-unauthorized", "refresh", "status"]).unwrap();
    assert_eq!(cli.on_unauthorized, Some(UnauthorizedPolicy::RefreshThenLogout));
}

#[test]
fn rejected_errors_render_field_by_field() {
    let mut errors = FieldErrors::new();
    errors.push("name", "This field may not be blank.");
    errors.push("code", "Too long.");
    errors.push("code", "Must be alphanumeric.");

    let lines = render_error(&CliError::Session(SessionError::Rejected(errors)));
    assert_eq!(
        lines,
        vec![
            "request rejected:",
            "  code: Too long.",
            "  code: Must be alphanumeric.",
            "  name: This field may not be blank.",
        ]
    );
}

#[test]
fn unauthorized_renders_login_hint() {
    let lines = render_error(&CliError::Session(SessionError::Unauthorized));
    assert!(lines[0].starts_with("session expired, please log in"));
}

#[test]
fn network_errors_render_generic_message() {
    let lines = render_error(&CliError::Session(SessionError::NetworkError("connection refused".into())));
    assert_eq!(lines[0], "the server could not be reached, please try again later");
}
