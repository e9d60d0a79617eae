use serde_json::Value;
use git_issues::error::{exit_codes, Error, JsonError};
use git_issues::manager::{ConflictEntry, IdConflict};

#[test]
fn exit_code_user_error() {
    let err = Error::validation("status", "unknown option 'bogus'");
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
}

#[test]
fn exit_code_cancelled() {
    assert_eq!(Error::Cancelled.exit_code(), exit_codes::CANCELLED);
}

#[test]
fn exit_code_operation_failed() {
    let err = Error::IdentifierExhausted { attempts: 4 };
    assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn details_include_conflict_ids() {
    let err = Error::Conflict(IdConflict {
        prefix: "ab".to_string(),
        threshold: 3,
        entries: vec![
            ConflictEntry {
                id: "ab12".to_string(),
                title: "fix crash".to_string(),
            },
            ConflictEntry {
                id: "ab34".to_string(),
                title: "typo".to_string(),
            },
        ],
    });
    let details = err.details().expect("details");
    assert_eq!(details["prefix"], Value::String("ab".to_string()));
    assert_eq!(details["ids"][1], Value::String("ab34".to_string()));
    assert!(err.to_string().contains("matches 2 issues"));
}

#[test]
fn json_error_includes_details() {
    let err = Error::InvalidConfig("bad config".to_string());
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    let details = json.details.expect("details");
    assert_eq!(details["message"], Value::String("bad config".to_string()));
}
