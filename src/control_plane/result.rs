//! Normalized outcome of one control-plane invocation

use serde_json::Value;

use crate::error::{Result, SandboxError};

/// Separator between the segments of [`ExecutionResult::error_message`].
const MESSAGE_DELIMITER: &str = " | ";

/// Structured stdout, stderr text and exit code of one `wsb` call.
///
/// `has_error()` is the single success/failure judgment used by every
/// higher-level operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Parsed stdout document; an empty object when stdout was blank
    pub output: Value,
    /// Trimmed stderr, `None` when blank
    pub stderr: Option<String>,
    /// Process exit code (-1 when the process was terminated without one)
    pub exit_code: i32,
}

impl ExecutionResult {
    /// Build a result from raw process output.
    ///
    /// Blank stdout becomes `{}`. Anything else must be valid JSON; a parse
    /// failure is a protocol violation and is returned as
    /// [`SandboxError::MalformedOutput`] rather than folded into `has_error`.
    pub fn from_raw(stdout: &str, stderr: &str, exit_code: i32) -> Result<Self> {
        Ok(Self {
            output: parse_document(stdout)?,
            stderr: normalize_stderr(stderr),
            exit_code,
        })
    }

    /// True iff stderr carried text or the exit code is non-zero.
    pub fn has_error(&self) -> bool {
        self.stderr.is_some() || self.exit_code != 0
    }

    /// Caller-facing failure text, empty when [`has_error`](Self::has_error) is false.
    ///
    /// Format: `Error: <stderr> | Exit code: <code>`, each segment present only
    /// when it applies.
    pub fn error_message(&self) -> String {
        if !self.has_error() {
            return String::new();
        }

        let mut parts = Vec::with_capacity(2);
        if let Some(stderr) = &self.stderr {
            parts.push(format!("Error: {}", stderr));
        }
        if self.exit_code != 0 {
            parts.push(format!("Exit code: {}", self.exit_code));
        }
        parts.join(MESSAGE_DELIMITER)
    }

    /// Convert a failed result into [`SandboxError::ControlPlaneReported`].
    pub fn into_checked(self) -> Result<Self> {
        if self.has_error() {
            Err(SandboxError::ControlPlaneReported(self.error_message()))
        } else {
            Ok(self)
        }
    }
}

fn parse_document(stdout: &str) -> Result<Value> {
    if stdout.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(stdout).map_err(SandboxError::MalformedOutput)
}

fn normalize_stderr(stderr: &str) -> Option<String> {
    let trimmed = stderr.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_stdout_is_empty_object() {
        for blank in ["", " ", "\n", "\t \r\n  "] {
            let result = ExecutionResult::from_raw(blank, "", 0).unwrap();
            assert_eq!(result.output, json!({}), "input {:?}", blank);
        }
    }

    #[test]
    fn test_stdout_document_is_parsed() {
        let result = ExecutionResult::from_raw(r#"{"Id":"abc"}"#, "", 0).unwrap();
        assert_eq!(result.output["Id"], "abc");
    }

    #[test]
    fn test_malformed_stdout_is_fatal() {
        let err = ExecutionResult::from_raw("Sandbox started", "", 0).unwrap_err();
        assert!(matches!(err, SandboxError::MalformedOutput(_)));
    }

    #[test]
    fn test_has_error_truth_table() {
        let cases = [
            ("", 0, false),
            ("   ", 0, false),
            ("boom", 0, true),
            ("", 1, true),
            ("boom", -5, true),
            ("\n\t", 3, true),
        ];
        for (stderr, code, expected) in cases {
            let result = ExecutionResult::from_raw("", stderr, code).unwrap();
            assert_eq!(result.has_error(), expected, "stderr={:?} code={}", stderr, code);
            assert_eq!(result.error_message().is_empty(), !expected);
        }
    }

    #[test]
    fn test_error_message_with_stderr_and_exit_code() {
        let result = ExecutionResult::from_raw("", "disk full", 1).unwrap();
        assert_eq!(result.error_message(), "Error: disk full | Exit code: 1");
    }

    #[test]
    fn test_error_message_with_exit_code_only() {
        let result = ExecutionResult::from_raw("", "  ", 2).unwrap();
        assert_eq!(result.error_message(), "Exit code: 2");
    }

    #[test]
    fn test_error_message_with_stderr_only_is_trimmed() {
        let result = ExecutionResult::from_raw("", "\n  access denied \r\n", 0).unwrap();
        assert_eq!(result.stderr.as_deref(), Some("access denied"));
        assert_eq!(result.error_message(), "Error: access denied");
    }

    #[test]
    fn test_into_checked() {
        let ok = ExecutionResult::from_raw("{}", "", 0).unwrap();
        assert!(ok.into_checked().is_ok());

        let failed = ExecutionResult::from_raw("{}", "nope", 4).unwrap();
        match failed.into_checked() {
            Err(SandboxError::ControlPlaneReported(msg)) => {
                assert_eq!(msg, "Error: nope | Exit code: 4")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
