//! Agent options and the application-error policy.

use serde_json::Value;

use crate::AgentError;

/// What to do with a response whose `error.code` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Hand the response back as-is; the caller inspects `error`.
    #[default]
    ReturnAsData,
    /// Fail the call with [`AgentError::Application`].
    Raise,
}

impl ErrorPolicy {
    /// Applies the policy to a decoded response.
    pub fn apply(self, response: Value) -> Result<Value, AgentError> {
        match (self, response_error_code(&response)) {
            (Self::Raise, Some(code)) => Err(AgentError::Application {
                code,
                payload: response,
            }),
            _ => Ok(response),
        }
    }
}

/// The non-zero `error.code` of a response, if any.
pub fn response_error_code(response: &Value) -> Option<u32> {
    response
        .get("error")?
        .get("code")?
        .as_u64()
        .filter(|&code| code != 0)
        .and_then(|code| u32::try_from(code).ok())
}

/// Per-agent settings.
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    /// Policy used by [`Agent::send_request`](crate::Agent::send_request).
    /// Individual calls may override it with
    /// [`Agent::send_request_with`](crate::Agent::send_request_with).
    pub error_policy: ErrorPolicy,
}

impl AgentOptions {
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_response_error_code_zero_or_missing_is_none() {
        assert_eq!(response_error_code(&json!({})), None);
        assert_eq!(response_error_code(&json!({ "error": {} })), None);
        assert_eq!(response_error_code(&json!({ "error": { "code": 0 } })), None);
        assert_eq!(response_error_code(&json!({ "error": { "code": 1002 } })), Some(1002));
    }

    #[test]
    fn test_apply_return_as_data_passes_errors_through() {
        let response = json!({ "error": { "code": 7 } });
        let out = ErrorPolicy::ReturnAsData.apply(response.clone()).unwrap();
        assert_eq!(out, response);
    }

    #[test]
    fn test_apply_raise_fails_on_error_code() {
        let err = ErrorPolicy::Raise
            .apply(json!({ "error": { "code": 7 } }))
            .unwrap_err();
        assert!(matches!(err, AgentError::Application { code: 7, .. }));
        assert!(ErrorPolicy::Raise.apply(json!({ "is_end": true })).is_ok());
    }

    #[test]
    fn test_default_options_return_as_data() {
        assert_eq!(AgentOptions::default().error_policy, ErrorPolicy::ReturnAsData);
        let opts = AgentOptions::default().with_error_policy(ErrorPolicy::Raise);
        assert_eq!(opts.error_policy, ErrorPolicy::Raise);
    }
}
