/*
 *
 *  * Copyright (c) 2025 Couchbase, Inc.
 *  *
 *  * Licensed under the Apache License, Version 2.0 (the "License");
 *  * you may not use this file except in compliance with the License.
 *  * You may obtain a copy of the License at
 *  *
 *  *    http://www.apache.org/licenses/LICENSE-2.0
 *  *
 *  * Unless required by applicable law or agreed to in writing, software
 *  * distributed under the License is distributed on an "AS IS" BASIS,
 *  * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  * See the License for the specific language governing permissions and
 *  * limitations under the License.
 *
 */

use http::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct Error {
    inner: ErrorImpl,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.kind)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn StdError + 'static))
    }
}

impl Error {
    pub(crate) fn new_server_error(e: ServerError) -> Self {
        Self::new(ErrorKind::Server(e))
    }

    pub(crate) fn new_invalid_credentials_error(endpoint: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCredentials {
            endpoint: endpoint.into(),
        })
    }

    pub(crate) fn new_timeout_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout { msg: msg.into() })
    }

    pub(crate) fn new_cancelled_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled { msg: msg.into() })
    }

    pub(crate) fn new_tls_handshake_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TlsHandshake { msg: msg.into() })
    }

    pub(crate) fn new_http_error(
        endpoint: impl Into<String>,
        statement: impl Into<Option<String>>,
        client_context_id: impl Into<Option<String>>,
    ) -> Self {
        Self::new(ErrorKind::Http {
            endpoint: endpoint.into(),
            statement: statement.into(),
            client_context_id: client_context_id.into(),
        })
    }

    pub(crate) fn new_protocol_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol { msg: msg.into() })
    }

    pub fn new_encoding_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encoding { msg: msg.into() })
    }

    pub fn new_data_conversion_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataConversion { msg: msg.into() })
    }

    pub fn new_invalid_argument_error(
        msg: impl Into<String>,
        arg: impl Into<Option<String>>,
    ) -> Self {
        Self::new(ErrorKind::InvalidArgument {
            msg: msg.into(),
            arg: arg.into(),
        })
    }

    pub(crate) fn new_row_callback_error(
        cause: Box<dyn StdError + Send + Sync>,
    ) -> Self {
        Self {
            inner: ErrorImpl {
                kind: Box::new(ErrorKind::RowCallback),
                source: Some(Arc::from(cause)),
                retried: None,
            },
        }
    }

    fn new(kind: ErrorKind) -> Self {
        Self {
            inner: ErrorImpl {
                kind: Box::new(kind),
                source: None,
                retried: None,
            },
        }
    }

    pub(crate) fn with(mut self, source: Arc<dyn StdError + Send + Sync>) -> Self {
        self.inner.source = Some(source);
        self
    }

    pub(crate) fn with_retried(mut self, retried: Error) -> Self {
        self.inner.retried = Some(Box::new(retried));
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.inner.kind
    }

    /// True for server errors whose primary record is marked retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(&*self.inner.kind, ErrorKind::Server(e) if e.retriable())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(&*self.inner.kind, ErrorKind::Timeout { .. })
    }

    pub fn server_error(&self) -> Option<&ServerError> {
        match &*self.inner.kind {
            ErrorKind::Server(e) => Some(e),
            _ => None,
        }
    }

    /// The error returned by the caller's row handler, untouched.
    pub fn row_callback_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match &*self.inner.kind {
            ErrorKind::RowCallback => self.inner.source.as_deref(),
            _ => None,
        }
    }

    /// The most recent retriable error observed before this terminal error.
    pub fn last_retry_error(&self) -> Option<&Error> {
        self.inner.retried.as_deref()
    }
}

#[derive(Debug, Clone)]
struct ErrorImpl {
    kind: Box<ErrorKind>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
    retried: Option<Box<Error>>,
}

#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    Server(ServerError),
    #[non_exhaustive]
    InvalidCredentials {
        endpoint: String,
    },
    #[non_exhaustive]
    Timeout {
        msg: String,
    },
    #[non_exhaustive]
    Cancelled {
        msg: String,
    },
    #[non_exhaustive]
    TlsHandshake {
        msg: String,
    },
    #[non_exhaustive]
    Http {
        endpoint: String,
        statement: Option<String>,
        client_context_id: Option<String>,
    },
    #[non_exhaustive]
    Protocol {
        msg: String,
    },
    #[non_exhaustive]
    Encoding {
        msg: String,
    },
    #[non_exhaustive]
    DataConversion {
        msg: String,
    },
    #[non_exhaustive]
    InvalidArgument {
        msg: String,
        arg: Option<String>,
    },
    RowCallback,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Server(e) => write!(f, "{e}"),
            ErrorKind::InvalidCredentials { endpoint } => {
                write!(f, "invalid credentials, endpoint: {endpoint}")
            }
            ErrorKind::Timeout { msg } => write!(f, "timeout: {msg}"),
            ErrorKind::Cancelled { msg } => write!(f, "cancelled: {msg}"),
            ErrorKind::TlsHandshake { msg } => write!(f, "tls handshake failed: {msg}"),
            ErrorKind::Http {
                endpoint,
                statement,
                client_context_id,
            } => {
                write!(f, "http error, endpoint: {endpoint}")?;
                if let Some(statement) = statement {
                    write!(f, ", statement: {statement}")?;
                }
                if let Some(client_context_id) = client_context_id {
                    write!(f, ", client context id: {client_context_id}")?;
                }
                Ok(())
            }
            ErrorKind::Protocol { msg } => write!(f, "protocol error: {msg}"),
            ErrorKind::Encoding { msg } => write!(f, "encoding error: {msg}"),
            ErrorKind::DataConversion { msg } => write!(f, "data conversion error: {msg}"),
            ErrorKind::InvalidArgument { msg, arg } => {
                let base_msg = format!("invalid argument: {msg}");
                if let Some(arg) = arg {
                    write!(f, "{base_msg}, arg: {arg}")
                } else {
                    write!(f, "{base_msg}")
                }
            }
            ErrorKind::RowCallback => write!(f, "row handler failed"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerError {
    kind: ServerErrorKind,

    endpoint: String,
    status_code: StatusCode,
    code: u32,
    msg: String,
    retriable: bool,

    reason: HashMap<String, Value>,
    context: HashMap<String, Value>,

    statement: Option<String>,
    client_context_id: Option<String>,

    all_error_descs: Vec<ErrorDesc>,
}

impl ServerError {
    pub(crate) fn new(
        kind: ServerErrorKind,
        endpoint: impl Into<String>,
        status_code: StatusCode,
        code: u32,
        msg: impl Into<String>,
        retriable: bool,
    ) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            status_code,
            code,
            msg: msg.into(),
            retriable,
            reason: HashMap::new(),
            context: HashMap::new(),
            statement: None,
            client_context_id: None,
            all_error_descs: vec![],
        }
    }

    pub fn kind(&self) -> &ServerErrorKind {
        &self.kind
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn retriable(&self) -> bool {
        self.retriable
    }

    pub fn reason(&self) -> &HashMap<String, Value> {
        &self.reason
    }

    /// Additional fields the server attached to the error record.
    pub fn context(&self) -> &HashMap<String, Value> {
        &self.context
    }

    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    pub fn client_context_id(&self) -> Option<&str> {
        self.client_context_id.as_deref()
    }

    pub fn all_error_descs(&self) -> &[ErrorDesc] {
        &self.all_error_descs
    }

    pub(crate) fn with_reason(mut self, reason: HashMap<String, Value>) -> Self {
        self.reason = reason;
        self
    }

    pub(crate) fn with_context(mut self, context: HashMap<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub(crate) fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub(crate) fn with_client_context_id(mut self, client_context_id: impl Into<String>) -> Self {
        self.client_context_id = Some(client_context_id.into());
        self
    }

    pub(crate) fn with_error_descs(mut self, error_descs: Vec<ErrorDesc>) -> Self {
        self.all_error_descs = error_descs;
        self
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "server error of kind: {}, code: {}, msg: {}, retriable: {}",
            self.kind, self.code, self.msg, self.retriable
        )?;

        if let Some(client_context_id) = &self.client_context_id {
            write!(f, ", client context id: {client_context_id}")?;
        }
        if let Some(statement) = &self.statement {
            write!(f, ", statement: {statement}")?;
        }

        write!(
            f,
            ", endpoint: {}, status code: {}",
            self.endpoint, self.status_code
        )?;

        if !self.all_error_descs.is_empty() {
            write!(f, ", all error descriptions: {:?}", self.all_error_descs)?;
        }

        Ok(())
    }
}

#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ErrorDesc {
    kind: ServerErrorKind,

    code: u32,
    message: String,
    retriable: bool,
}

impl ErrorDesc {
    pub fn new(kind: ServerErrorKind, code: u32, message: String, retriable: bool) -> Self {
        Self {
            kind,
            code,
            message,
            retriable,
        }
    }

    pub fn kind(&self) -> &ServerErrorKind {
        &self.kind
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn retriable(&self) -> bool {
        self.retriable
    }
}

impl Display for ErrorDesc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "error description of kind: {}, code: {}, message: {}, retriable: {}",
            self.kind, self.code, self.message, self.retriable
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServerErrorKind {
    CompilationFailure,
    Internal,
    AuthenticationFailure,
    ParsingFailure,
    TemporaryFailure,
    JobQueueFull,
    IndexNotFound,
    IndexExists,
    DatasetNotFound,
    DatasetExists,
    DataverseNotFound,
    DataverseExists,
    LinkNotFound,
    LinkExists,
    Unknown,
}

impl Display for ServerErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerErrorKind::CompilationFailure => write!(f, "compilation failure"),
            ServerErrorKind::Internal => write!(f, "internal server error"),
            ServerErrorKind::AuthenticationFailure => write!(f, "authentication failure"),
            ServerErrorKind::ParsingFailure => write!(f, "parsing failure"),
            ServerErrorKind::TemporaryFailure => write!(f, "temporary failure"),
            ServerErrorKind::JobQueueFull => write!(f, "job queue full"),
            ServerErrorKind::IndexNotFound => write!(f, "index not found"),
            ServerErrorKind::IndexExists => write!(f, "index exists"),
            ServerErrorKind::DatasetNotFound => write!(f, "dataset not found"),
            ServerErrorKind::DatasetExists => write!(f, "dataset exists"),
            ServerErrorKind::DataverseNotFound => write!(f, "dataverse not found"),
            ServerErrorKind::DataverseExists => write!(f, "dataverse exists"),
            ServerErrorKind::LinkNotFound => write!(f, "link not found"),
            ServerErrorKind::LinkExists => write!(f, "link exists"),
            ServerErrorKind::Unknown => write!(f, "unknown query error"),
        }
    }
}
