//! Assertions over RPC results and response fields.
//!
//! Every helper returns a [`ScenarioError`] rather than panicking so a failed
//! check ends the scenario and still lets its teardown run.

use std::fmt::Debug;

use tonic::{Code, Response, Status};

use crate::suite::ScenarioError;

/// Extension methods for raw client results.
pub trait RpcResultExt<T> {
    /// Unwraps a successful response; any status becomes
    /// [`ScenarioError::Rpc`].
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Rpc`] when the call failed.
    fn rpc(self, call: &'static str) -> Result<T, ScenarioError>;

    /// Requires the call to fail with exactly `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnexpectedSuccess`] when the call succeeded and
    /// [`ScenarioError::UnexpectedCode`] when it failed with another code.
    fn expect_code(self, call: &'static str, expected: Code) -> Result<(), ScenarioError>;

    /// Requires the call to fail with any code, returning the status.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnexpectedSuccess`] when the call succeeded.
    fn expect_failure(self, call: &'static str) -> Result<Status, ScenarioError>;
}

impl<T> RpcResultExt<T> for Result<Response<T>, Status> {
    fn rpc(self, call: &'static str) -> Result<T, ScenarioError> {
        self.map(Response::into_inner)
            .map_err(|status| ScenarioError::rpc(call, &status))
    }

    fn expect_code(self, call: &'static str, expected: Code) -> Result<(), ScenarioError> {
        let status = self.expect_failure(call)?;
        if status.code() == expected {
            return Ok(());
        }
        Err(ScenarioError::UnexpectedCode {
            call,
            expected,
            actual: status.code(),
            message: status.message().to_owned(),
        })
    }

    fn expect_failure(self, call: &'static str) -> Result<Status, ScenarioError> {
        match self {
            Ok(_) => Err(ScenarioError::UnexpectedSuccess { call }),
            Err(status) => Ok(status),
        }
    }
}

/// Fails with `message` unless `condition` holds.
///
/// # Errors
///
/// Returns [`ScenarioError::Assertion`] when `condition` is false.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioError> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Assertion(message()))
    }
}

/// Fails unless `actual` equals `expected`.
///
/// # Errors
///
/// Returns [`ScenarioError::Assertion`] naming `what` on mismatch.
pub fn ensure_eq<T, U>(what: &str, expected: &T, actual: &U) -> Result<(), ScenarioError>
where
    T: Debug + ?Sized,
    U: Debug + PartialEq<T> + ?Sized,
{
    ensure(actual == expected, || {
        format!("{what}: expected {expected:?}, got {actual:?}")
    })
}

/// Fails when `value` is empty.
///
/// # Errors
///
/// Returns [`ScenarioError::Assertion`] naming `what`.
pub fn ensure_not_empty(what: &str, value: &str) -> Result<(), ScenarioError> {
    ensure(!value.is_empty(), || format!("{what} is empty"))
}

/// Unwraps an optional message field.
///
/// # Errors
///
/// Returns [`ScenarioError::Assertion`] naming `what` when it is absent.
pub fn present<T>(what: &str, value: Option<T>) -> Result<T, ScenarioError> {
    value.ok_or_else(|| ScenarioError::Assertion(format!("{what} is missing from the response")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(code: Code) -> Result<Response<()>, Status> {
        Err(Status::new(code, "boom"))
    }

    #[test]
    fn expect_code_accepts_the_expected_status() {
        assert!(
            failed(Code::InvalidArgument)
                .expect_code("Volume.Create", Code::InvalidArgument)
                .is_ok()
        );
    }

    #[test]
    fn expect_code_rejects_other_statuses() {
        let err = failed(Code::Internal)
            .expect_code("Volume.Create", Code::InvalidArgument)
            .expect_err("wrong code");
        assert!(matches!(
            err,
            ScenarioError::UnexpectedCode {
                expected: Code::InvalidArgument,
                actual: Code::Internal,
                ..
            }
        ));
    }

    #[test]
    fn expect_code_rejects_success() {
        let succeeded: Result<Response<()>, Status> = Ok(Response::new(()));
        let err = succeeded
            .expect_code("Volume.Create", Code::InvalidArgument)
            .expect_err("call succeeded");
        assert!(matches!(err, ScenarioError::UnexpectedSuccess { call: "Volume.Create" }));
    }

    #[test]
    fn rpc_reports_the_call_and_code() {
        let err = failed(Code::NotFound).rpc("Volume.Inspect").expect_err("fails");
        let rendered = err.to_string();
        assert!(rendered.contains("Volume.Inspect"), "rendered: {rendered}");
        assert!(rendered.contains("NotFound"), "rendered: {rendered}");
    }

    #[test]
    fn ensure_eq_names_the_field() {
        let err = ensure_eq("ha_level", &3_i64, &2_i64).expect_err("mismatch");
        assert_eq!(
            err,
            ScenarioError::Assertion(String::from("ha_level: expected 3, got 2"))
        );
    }
}
