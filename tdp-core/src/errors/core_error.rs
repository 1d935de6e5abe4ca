use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use super::BackupError;

/// Transport-neutral error category shared by the CLI and the HTTP layer
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoreErrorKind {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    Unauthorized,
    Cancelled,
    Internal,
}

impl CoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoreErrorKind::NotFound => "not_found",
            CoreErrorKind::Validation => "validation",
            CoreErrorKind::Conflict => "conflict",
            CoreErrorKind::Forbidden => "forbidden",
            CoreErrorKind::Unauthorized => "unauthorized",
            CoreErrorKind::Cancelled => "cancelled",
            CoreErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug)]
pub struct CoreError {
    kind: CoreErrorKind,
    code: &'static str,
    message: String,
    fields: Option<BTreeMap<String, String>>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: "ERROR",
            message: message.into(),
            fields: None,
            source: None,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("entity".to_string(), entity.into());
        fields.insert("id".to_string(), id.into());

        Self::new(CoreErrorKind::NotFound, "Resource not found")
            .with_code("NOT_FOUND")
            .with_fields(fields)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Validation, message).with_code("VALIDATION_FAILED")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Forbidden, message).with_code("FORBIDDEN")
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unauthorized, message).with_code("UNAUTHORIZED")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message).with_code("INTERNAL")
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> CoreErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, String>> {
        self.fields.as_ref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        let mut core = CoreError::internal(err.to_string());
        core.source = Some(err.into());
        core
    }
}

impl From<BackupError> for CoreError {
    fn from(err: BackupError) -> Self {
        let kind = if err.is_not_found() {
            CoreErrorKind::NotFound
        } else if matches!(err, BackupError::InvalidTransition { .. }) {
            CoreErrorKind::Conflict
        } else if err.is_client_error() {
            CoreErrorKind::Validation
        } else if matches!(err, BackupError::Forbidden(_)) {
            CoreErrorKind::Forbidden
        } else if matches!(err, BackupError::Cancelled) {
            CoreErrorKind::Cancelled
        } else {
            CoreErrorKind::Internal
        };

        let mut fields = BTreeMap::new();
        match &err {
            BackupError::UnresolvedReference {
                collection,
                field,
                reference,
            } => {
                fields.insert("collection".to_string(), collection.clone());
                fields.insert("field".to_string(), field.clone());
                fields.insert("reference".to_string(), reference.clone());
            }
            BackupError::TypeMismatch {
                collection, field, ..
            } => {
                fields.insert("collection".to_string(), collection.clone());
                fields.insert("field".to_string(), field.clone());
            }
            BackupError::TaskNotFound(id) => {
                fields.insert("entity".to_string(), "restore_task".to_string());
                fields.insert("id".to_string(), id.clone());
            }
            _ => {}
        }

        let mut core = CoreError::new(kind, err.to_string()).with_code(err.error_code());
        if !fields.is_empty() {
            core = core.with_fields(fields);
        }
        core.with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_error_mapping() {
        let err: CoreError = BackupError::unresolved("tours", "category", "boat-tours").into();
        assert_eq!(err.kind(), CoreErrorKind::Validation);
        assert_eq!(err.code(), "UNRESOLVED_REFERENCE");
        let fields = err.fields().unwrap();
        assert_eq!(fields.get("reference").map(String::as_str), Some("boat-tours"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_not_found_mapping() {
        let err: CoreError = BackupError::TaskNotFound("42".to_string()).into();
        assert_eq!(err.kind(), CoreErrorKind::NotFound);
    }

    #[test]
    fn test_forbidden_and_cancelled_mapping() {
        let err: CoreError = BackupError::Forbidden("nope".to_string()).into();
        assert_eq!(err.kind(), CoreErrorKind::Forbidden);
        let err: CoreError = BackupError::Cancelled.into();
        assert_eq!(err.kind(), CoreErrorKind::Cancelled);
    }

    #[test]
    fn test_display() {
        let err = CoreError::validation("bad filename");
        assert_eq!(err.to_string(), "validation: bad filename");
    }
}
