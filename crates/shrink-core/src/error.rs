use thiserror::Error;

/// Top-level error type for the shrink dashboard.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for ShrinkError` where a failure has to cross into
/// the binary or the API layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShrinkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("Knowledge base error: {0}")]
    Knowledge(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ShrinkError {
    fn from(err: toml::de::Error) -> Self {
        ShrinkError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ShrinkError {
    fn from(err: toml::ser::Error) -> Self {
        ShrinkError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ShrinkError {
    fn from(err: serde_json::Error) -> Self {
        ShrinkError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for shrink operations.
pub type Result<T> = std::result::Result<T, ShrinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShrinkError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(ShrinkError, &str)> = vec![
            (
                ShrinkError::Warehouse("table missing".to_string()),
                "Warehouse error: table missing",
            ),
            (
                ShrinkError::Knowledge("no documents".to_string()),
                "Knowledge base error: no documents",
            ),
            (
                ShrinkError::Model("endpoint unset".to_string()),
                "Model error: endpoint unset",
            ),
            (
                ShrinkError::Api("bind failed".to_string()),
                "API error: bind failed",
            ),
            (
                ShrinkError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ShrinkError = io_err.into();
        assert!(matches!(err, ShrinkError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let shrink_err: ShrinkError = err.unwrap_err().into();
        assert!(matches!(shrink_err, ShrinkError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let shrink_err: ShrinkError = err.unwrap_err().into();
        assert!(matches!(shrink_err, ShrinkError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
