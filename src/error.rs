//! Error handling for the BucketNest sync core

use bucketnest_auth::AuthError;
use bucketnest_functions::FunctionsError;
use bucketnest_postgrest::{
    PostgrestError, INSUFFICIENT_PRIVILEGE, NO_SINGLE_ROW, UNIQUE_VIOLATION,
};
use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Closed set of gateway failure kinds the stores act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayErrorKind {
    /// The request never got a response
    Network,
    Unauthorized,
    /// Row security or an ownership rule refused the call
    PermissionDenied,
    NotFound,
    /// A unique constraint rejected the write
    UniqueViolation,
    /// The gateway rejected the request itself
    BadRequest,
    Server,
    /// The response could not be read
    Decode,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayErrorKind::Network => "network",
            GatewayErrorKind::Unauthorized => "unauthorized",
            GatewayErrorKind::PermissionDenied => "permission denied",
            GatewayErrorKind::NotFound => "not found",
            GatewayErrorKind::UniqueViolation => "unique violation",
            GatewayErrorKind::BadRequest => "bad request",
            GatewayErrorKind::Server => "server",
            GatewayErrorKind::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// A failed gateway call, classified
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Gateway error ({kind}): {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new<T: fmt::Display>(kind: GatewayErrorKind, message: T) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }

    pub fn network<T: fmt::Display>(message: T) -> Self {
        Self::new(GatewayErrorKind::Network, message)
    }

    pub fn not_found<T: fmt::Display>(message: T) -> Self {
        Self::new(GatewayErrorKind::NotFound, message)
    }

    pub fn permission_denied<T: fmt::Display>(message: T) -> Self {
        Self::new(GatewayErrorKind::PermissionDenied, message)
    }

    pub fn unique_violation<T: fmt::Display>(message: T) -> Self {
        Self::new(GatewayErrorKind::UniqueViolation, message)
    }

    pub fn bad_request<T: fmt::Display>(message: T) -> Self {
        Self::new(GatewayErrorKind::BadRequest, message)
    }

    pub fn decode<T: fmt::Display>(message: T) -> Self {
        Self::new(GatewayErrorKind::Decode, message)
    }

    pub fn is(&self, kind: GatewayErrorKind) -> bool {
        self.kind == kind
    }
}

fn kind_for_status(status: StatusCode) -> GatewayErrorKind {
    match status {
        StatusCode::UNAUTHORIZED => GatewayErrorKind::Unauthorized,
        StatusCode::FORBIDDEN => GatewayErrorKind::PermissionDenied,
        StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => GatewayErrorKind::NotFound,
        StatusCode::CONFLICT => GatewayErrorKind::UniqueViolation,
        s if s.is_server_error() => GatewayErrorKind::Server,
        _ => GatewayErrorKind::BadRequest,
    }
}

impl From<PostgrestError> for GatewayError {
    fn from(err: PostgrestError) -> Self {
        let kind = match (&err, err.code()) {
            (_, Some(UNIQUE_VIOLATION)) => GatewayErrorKind::UniqueViolation,
            (_, Some(INSUFFICIENT_PRIVILEGE)) => GatewayErrorKind::PermissionDenied,
            (_, Some(NO_SINGLE_ROW)) => GatewayErrorKind::NotFound,
            (PostgrestError::NetworkError(_), _) => GatewayErrorKind::Network,
            (PostgrestError::SerializationError(_), _)
            | (PostgrestError::DeserializationError(_), _) => GatewayErrorKind::Decode,
            (PostgrestError::UrlParseError(_), _) | (PostgrestError::InvalidParameters(_), _) => {
                GatewayErrorKind::BadRequest
            }
            _ => err
                .status()
                .map(kind_for_status)
                .unwrap_or(GatewayErrorKind::Server),
        };
        GatewayError::new(kind, err)
    }
}

impl From<FunctionsError> for GatewayError {
    fn from(err: FunctionsError) -> Self {
        let kind = match &err {
            FunctionsError::NotFound { .. } => GatewayErrorKind::NotFound,
            FunctionsError::FunctionError { status, .. } => kind_for_status(*status),
            FunctionsError::RequestError(_) => GatewayErrorKind::Network,
            FunctionsError::JsonError(_) => GatewayErrorKind::Decode,
            FunctionsError::UrlError(_) => GatewayErrorKind::BadRequest,
        };
        GatewayError::new(kind, err)
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        let kind = match &err {
            AuthError::NetworkError(_) => GatewayErrorKind::Network,
            AuthError::SerializationError(_) => GatewayErrorKind::Decode,
            AuthError::ApiError(_) | AuthError::MissingSession | AuthError::InvalidToken(_) => {
                GatewayErrorKind::Unauthorized
            }
        };
        GatewayError::new(kind, err)
    }
}

/// One rejected form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Client-side rejections, reported per field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: Into<String>>(&mut self, field: &'static str, message: T) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First message reported for `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// What a store operation can fail with
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("You must be signed in to do that")]
    NoSession,

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Not found")]
    NotFound,

    #[error("You do not have access to this")]
    Forbidden,

    #[error("A squad request already exists between you and this user")]
    DuplicateRequest,

    #[error("You cannot send a squad request to yourself")]
    SelfRequest,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bucketnest_postgrest::PostgrestApiErrorDetails;

    fn api_error(code: &str, status: StatusCode) -> PostgrestError {
        PostgrestError::ApiError {
            details: PostgrestApiErrorDetails {
                code: Some(code.to_string()),
                message: Some("boom".to_string()),
                ..PostgrestApiErrorDetails::default()
            },
            status,
        }
    }

    #[test]
    fn maps_structured_codes() {
        let err = GatewayError::from(api_error("23505", StatusCode::CONFLICT));
        assert_eq!(err.kind, GatewayErrorKind::UniqueViolation);

        let err = GatewayError::from(api_error("42501", StatusCode::FORBIDDEN));
        assert_eq!(err.kind, GatewayErrorKind::PermissionDenied);

        let err = GatewayError::from(api_error("PGRST116", StatusCode::NOT_ACCEPTABLE));
        assert_eq!(err.kind, GatewayErrorKind::NotFound);
    }

    #[test]
    fn message_text_does_not_decide_the_kind() {
        let err = GatewayError::from(PostgrestError::UnparsedApiError {
            message: "duplicate key value violates unique constraint".to_string(),
            status: StatusCode::BAD_REQUEST,
        });
        assert_eq!(err.kind, GatewayErrorKind::BadRequest);
    }

    #[test]
    fn falls_back_to_status() {
        let err = GatewayError::from(api_error("XX000", StatusCode::BAD_GATEWAY));
        assert_eq!(err.kind, GatewayErrorKind::Server);

        let err = GatewayError::from(api_error("PGRST301", StatusCode::UNAUTHORIZED));
        assert_eq!(err.kind, GatewayErrorKind::Unauthorized);
    }

    #[test]
    fn validation_errors_collect_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "Title is required");
        errors.add("link", "Link must be an http(s) URL");
        assert_eq!(errors.get("title"), Some("Title is required"));
        assert!(errors.get("notes").is_none());
        assert!(errors.into_result().is_err());
    }

    fn checked(errors: ValidationErrors) -> Result<()> {
        errors.into_result()?;
        Ok(())
    }

    #[test]
    fn validation_errors_lift_into_store_errors() {
        assert_eq!(checked(ValidationErrors::new()), Ok(()));

        let mut errors = ValidationErrors::new();
        errors.add("title", "Title is required");
        match checked(errors) {
            Err(StoreError::Validation(errors)) => {
                assert_eq!(errors.get("title"), Some("Title is required"))
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
