use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{convert::ConvertError, history::HistoryError},
    infra::error::InfraError,
};

/// Diagnostic attached to error responses and consumed by the response logger.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Error returned from HTTP handlers: a fixed public message for the client
/// and a full report for the logs.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<HistoryError> for HttpError {
    fn from(error: HistoryError) -> Self {
        HttpError::from_error(
            "application::error::history_error_to_http_error",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Storage unavailable",
            &error,
        )
    }
}

impl From<ConvertError> for HttpError {
    fn from(error: ConvertError) -> Self {
        const SOURCE: &str = "application::error::convert_error_to_http_error";
        match error {
            ConvertError::InvalidRequest(message) => {
                HttpError::new(SOURCE, StatusCode::BAD_REQUEST, message, message)
            }
            ConvertError::TooLarge { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Input too large",
                &error,
            ),
            ConvertError::Render(ref err) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing markdown",
                err,
            ),
            ConvertError::Storage(err) => err.into(),
        }
    }
}

/// Top-level error for the binary's commands.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::application::store::StoreError;

    #[test]
    fn invalid_request_maps_to_bad_request() {
        let error: HttpError = ConvertError::InvalidRequest("No markdown provided").into();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_failure_hides_details_from_client() {
        let error: HttpError = ConvertError::Storage(HistoryError::Storage {
            operation: "append",
            key: "history-list".to_string(),
            source: StoreError::from_backend("connection reset by peer"),
        })
        .into();

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(
            report.messages,
            vec![
                "storage failure during `append` on key `history-list`".to_string(),
                "store backend error: connection reset by peer".to_string(),
            ]
        );
    }
}
