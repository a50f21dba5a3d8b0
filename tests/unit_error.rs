use std::path::PathBuf;

use taskboard::error::{exit_codes, Error};
use taskboard::model::{ContactId, TaskId};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::ContactNotFound(ContactId(7));
    assert_eq!(missing.exit_code(), exit_codes::USER_ERROR);

    let uninit = Error::NotInitialized(PathBuf::from("/boards/none"));
    assert_eq!(uninit.exit_code(), exit_codes::USER_ERROR);

    let remote = Error::transport("PATCH tasks/3", "connection refused");
    assert_eq!(remote.exit_code(), exit_codes::REMOTE_UNAVAILABLE);
    assert!(remote.is_transport());

    let locked = Error::LockFailed(PathBuf::from("/boards/store/tasks.json.lock"));
    assert_eq!(locked.exit_code(), exit_codes::OPERATION_FAILED);
    assert!(!locked.is_transport());
}

#[test]
fn not_found_details_carry_the_id() {
    let err = Error::TaskNotFound(TaskId(12));
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    assert!(err.to_string().contains("Task not found"));
    assert_eq!(err.details().expect("details")["task_id"], 12);
}

#[test]
fn index_error_reports_bounds() {
    let err = Error::IndexOutOfRange { index: 4, len: 2 };
    let details = err.details().expect("details");
    assert_eq!(details["index"], 4);
    assert_eq!(details["len"], 2);
    assert!(err.to_string().contains("has 2 subtasks"));
}
