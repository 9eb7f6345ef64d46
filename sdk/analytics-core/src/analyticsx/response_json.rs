use crate::analyticsx::error::ServerErrorKind;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// One entry of the `errors` (or `warnings`) array of a query response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorCodeAndMessage {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub msg: String,
    // The wire uses "retriable" in analytics responses and "retry" in some
    // query responses; accept both.
    #[serde(default, alias = "retriable")]
    pub retry: bool,
    #[serde(default)]
    pub reason: HashMap<String, Value>,
    // Unrecognized fields, like the "query_from_user" field that appears in
    // some query errors.
    #[serde(flatten)]
    pub context: HashMap<String, Value>,
}

impl ErrorCodeAndMessage {
    /// Decodes an error payload: a JSON array of records, a single record,
    /// a whole response body with an `errors` wrapper, or (from servers
    /// older than 7.1.0) plaintext. Always returns at least one record.
    pub fn from_json(content: &[u8]) -> Vec<ErrorCodeAndMessage> {
        let node: Value = match serde_json::from_slice(content) {
            Ok(node) => node,
            Err(_) => return Self::from_plaintext(content),
        };

        // When the body indicates errors it looks like:
        //     {"errors":[{"code":123,"msg":"Oh no!"}],"status":"errors"}
        // The streaming parser strips the wrapper for us; strip it here too
        // for whole bodies processed at once.
        let node = if node
            .pointer("/errors/0/code")
            .is_some_and(Value::is_number)
        {
            node.get("errors").cloned().unwrap_or(node)
        } else {
            node
        };

        let decoded = if node.is_array() {
            serde_json::from_value::<Vec<ErrorCodeAndMessage>>(node).ok()
        } else if node.is_object() {
            serde_json::from_value::<ErrorCodeAndMessage>(node)
                .ok()
                .map(|e| vec![e])
        } else {
            None
        };

        match decoded {
            Some(errors) if !errors.is_empty() => errors,
            _ => vec![ErrorCodeAndMessage {
                code: 0,
                msg: format!(
                    "Failed to decode errors: {}",
                    String::from_utf8_lossy(content)
                ),
                retry: false,
                reason: HashMap::new(),
                context: HashMap::new(),
            }],
        }
    }

    fn from_plaintext(content: &[u8]) -> Vec<ErrorCodeAndMessage> {
        let error = String::from_utf8_lossy(content);
        let error = error.trim();

        if let Some((code, message)) = error.split_once(':') {
            if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) && !message.is_empty() {
                if let Ok(code) = code.parse() {
                    return vec![ErrorCodeAndMessage {
                        code,
                        msg: message.to_string(),
                        retry: false,
                        reason: HashMap::new(),
                        context: HashMap::new(),
                    }];
                }
            }
        }

        vec![ErrorCodeAndMessage {
            code: 0,
            msg: format!("Failed to decode error: {error}"),
            retry: false,
            reason: HashMap::new(),
            context: HashMap::new(),
        }]
    }

    pub(crate) fn server_error_kind(&self) -> ServerErrorKind {
        let code = self.code;
        let code_group = code / 1000;

        if code_group == 20 {
            ServerErrorKind::AuthenticationFailure
        } else if code_group == 24 {
            if code == 24000 {
                ServerErrorKind::ParsingFailure
            } else if code == 24006 {
                ServerErrorKind::LinkNotFound
            } else if code == 24025 || code == 24044 || code == 24045 {
                ServerErrorKind::DatasetNotFound
            } else if code == 24034 {
                ServerErrorKind::DataverseNotFound
            } else if code == 24039 {
                ServerErrorKind::DataverseExists
            } else if code == 24040 {
                ServerErrorKind::DatasetExists
            } else if code == 24047 {
                ServerErrorKind::IndexNotFound
            } else if code == 24048 {
                ServerErrorKind::IndexExists
            } else {
                ServerErrorKind::CompilationFailure
            }
        } else if code_group == 25 {
            ServerErrorKind::CompilationFailure
        } else if code == 23000 || code == 23003 {
            ServerErrorKind::TemporaryFailure
        } else if code == 23007 {
            ServerErrorKind::JobQueueFull
        } else {
            ServerErrorKind::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCodeAndMessage;
    use crate::analyticsx::error::ServerErrorKind;
    use serde_json::json;

    #[test]
    fn decodes_error_array() {
        let content = br#"[{"code":24000,"msg":"Syntax error","retriable":false}]"#;
        let errors = ErrorCodeAndMessage::from_json(content);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, 24000);
        assert_eq!(errors[0].msg, "Syntax error");
        assert!(!errors[0].retry);
        assert_eq!(errors[0].server_error_kind(), ServerErrorKind::ParsingFailure);
    }

    #[test]
    fn accepts_retry_and_retriable_spellings() {
        let retriable = ErrorCodeAndMessage::from_json(br#"[{"code":23003,"msg":"x","retriable":true}]"#);
        assert!(retriable[0].retry);

        let retry = ErrorCodeAndMessage::from_json(br#"[{"code":1080,"msg":"x","retry":true}]"#);
        assert!(retry[0].retry);
    }

    #[test]
    fn gathers_unknown_fields_into_context() {
        let errors = ErrorCodeAndMessage::from_json(
            br#"[{"code":1,"msg":"x","query_from_user":"SELECT 1","origin":"cbas"}]"#,
        );
        assert_eq!(errors[0].context.get("query_from_user"), Some(&json!("SELECT 1")));
        assert_eq!(errors[0].context.get("origin"), Some(&json!("cbas")));
        assert!(errors[0].context.get("code").is_none());
    }

    #[test]
    fn strips_errors_wrapper_from_whole_body() {
        let content = br#"{"errors":[{"code":123,"msg":"Oh no!"}],"status":"errors"}"#;
        let errors = ErrorCodeAndMessage::from_json(content);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, 123);
        assert_eq!(errors[0].msg, "Oh no!");
    }

    #[test]
    fn falls_back_to_plaintext() {
        let errors = ErrorCodeAndMessage::from_json(b"24006: link Default.Local does not exist");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, 24006);
        assert_eq!(errors[0].msg, " link Default.Local does not exist");
        assert!(!errors[0].retry);
    }

    #[test]
    fn undecodable_input_yields_code_zero() {
        let errors = ErrorCodeAndMessage::from_json(b"<html>bad gateway</html>");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, 0);
        assert!(errors[0].msg.contains("Failed to decode error"));
    }
}
