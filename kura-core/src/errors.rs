use crate::status::DbErrorCode;
use crate::types;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // data service errors
    #[error("{function} failed: {message}")]
    DataService {
        function: String,
        code: DbErrorCode,
        message: String,
    },

    #[error("data service status probe failed, {message}")]
    ProbeFailed { message: String },

    #[error("data service control command '{command}' failed, {message}")]
    ControlCommandFailed {
        command: String,
        message: String,

        #[source]
        source: anyhow::Error,
    },

    #[error("not connected to the data service")]
    NotConnected,

    #[error("failed to create stop marker '{path}'")]
    StopMarkerFailed {
        path: String,

        #[source]
        source: std::io::Error,
    },

    // dispatch errors
    #[error("operation '{operation}' is not supported for object type '{kind}'")]
    UnsupportedOperation { kind: String, operation: String },

    #[error("failed to encode or decode object of type '{kind}', {message}")]
    CodecFailed {
        kind: String,
        message: String,

        #[source]
        source: anyhow::Error,
    },

    #[error("failed to allocate query cursor")]
    CursorAllocationFailed,

    // config errors
    #[error("invalid configuration, {message}")]
    InvalidConfiguration { message: String },

    // unknown errors
    #[error("encountered unknown error, source: {source}")]
    Unknown {
        #[source]
        source: anyhow::Error,
    },

    #[error("encountered unknown error, {message}")]
    UnknownWithMsgOnly { message: String },
}

impl Error {
    /// Stable code the orchestrator reasons about.
    pub fn code(&self) -> DbErrorCode {
        match self {
            Error::DataService { code, .. } => *code,
            Error::NotConnected => DbErrorCode::ConnRefused,
            Error::CursorAllocationFailed => DbErrorCode::NoMem,
            _ => DbErrorCode::Generic,
        }
    }

    pub fn data_service(function: &str, code: DbErrorCode, message: impl Into<String>) -> Self {
        Error::DataService {
            function: function.to_string(),
            code,
            message: message.into(),
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(value: sea_orm::DbErr) -> Self {
        let message = value.to_string();

        Error::DataService {
            function: "database".to_string(),
            code: DbErrorCode::classify(&message),
            message,
        }
    }
}

pub trait ToUnknownErrorResult<T> {
    fn to_unknown_err_result(self) -> types::Result<T>;
}

impl<T, E> ToUnknownErrorResult<T> for core::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn to_unknown_err_result(self) -> types::Result<T> {
        self.map_err(|e| Error::Unknown { source: e.into() })
    }
}

#[macro_export]
macro_rules! err_unsupported_op {
    ($kind: expr, $op: expr) => {
        $crate::errors::Error::UnsupportedOperation {
            kind: $kind.to_string(),
            operation: $op.to_string(),
        }
    };
}
