use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Naming error: no public setter '{setter}' on model '{model}'")]
    Naming { model: String, setter: String },

    #[error("Attribute '{0}' not found on model '{1}'")]
    UnknownAttribute(String, String),

    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    #[error("Repository '{0}' not found")]
    RepositoryNotFound(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_error_message() {
        let err = DbError::Naming {
            model: "Person".to_string(),
            setter: "nickname".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Naming error: no public setter 'nickname' on model 'Person'"
        );
    }

    #[test]
    fn test_poison_error_maps_to_lock_error() {
        let lock = std::sync::Arc::new(std::sync::Mutex::new(0));
        let cloned = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err: DbError = lock.lock().unwrap_err().into();
        assert!(matches!(err, DbError::LockError(_)));
    }
}
