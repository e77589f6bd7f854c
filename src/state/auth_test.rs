use super::*;

fn grace() -> Identity {
    Identity {
        id: 2,
        email: "grace@school.test".to_owned(),
        first_name: "Grace".to_owned(),
        last_name: "Hopper".to_owned(),
        username: None,
        role: None,
    }
}

#[test]
fn default_state_is_unknown() {
    assert_eq!(SessionState::default(), SessionState::Unknown);
}

#[test]
fn identity_only_when_authenticated() {
    assert_eq!(SessionState::Authenticated(grace()).identity(), Some(&grace()));
    assert_eq!(SessionState::Authenticating.identity(), None);
    assert_eq!(SessionState::Anonymous.identity(), None);
    assert_eq!(SessionState::Unknown.identity(), None);
}

#[test]
fn settled_states() {
    assert!(SessionState::Anonymous.is_settled());
    assert!(SessionState::Authenticated(grace()).is_settled());
    assert!(!SessionState::Unknown.is_settled());
    assert!(!SessionState::Authenticating.is_settled());
}

#[test]
fn labels_are_lowercase_names() {
    assert_eq!(SessionState::Authenticated(grace()).label(), "authenticated");
    assert_eq!(SessionState::Anonymous.label(), "anonymous");
}
