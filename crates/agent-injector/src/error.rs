use thiserror::Error;

/// Errors produced while deciding on and planning an agent injection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectionError {
    /// Injection annotations are missing or malformed
    #[error("Configuration error: {details}")]
    Configuration { details: String },

    /// No agent profile is registered for the requested language
    #[error("Language '{language}' is not supported")]
    UnsupportedLanguage { language: String },

    /// The pod cannot receive an agent (e.g. it has no containers)
    #[error("Validation error: {details}")]
    Validation { details: String },

    /// The admission payload could not be decoded into a pod
    #[error("Decode error: {details}")]
    Decode { details: String },

    /// The pod did not opt in to injection
    #[error("Skipping mutation: {annotation} annotation not set to enabled or true")]
    NotEnabled { annotation: &'static str },

    /// A desired object or patch could not be serialized
    #[error("Serialization error: {details}")]
    Serialization { details: String },
}

/// Type alias for injection results
pub type InjectionResult<T> = Result<T, InjectionError>;

impl InjectionError {
    /// Errors that are absorbed into an allowed admission response.
    ///
    /// Only decode failures reach the transport, where they become a 400.
    #[must_use]
    pub fn is_fail_open(&self) -> bool {
        !matches!(self, InjectionError::Decode { .. })
    }

    /// Get error category as string
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            InjectionError::Configuration { .. } => "configuration_error",
            InjectionError::UnsupportedLanguage { .. } => "unsupported_language",
            InjectionError::Validation { .. } => "validation_error",
            InjectionError::Decode { .. } => "decode_error",
            InjectionError::NotEnabled { .. } => "not_enabled",
            InjectionError::Serialization { .. } => "system_error",
        }
    }

    /// Log the error at a level matching its category
    pub fn log(&self, uid: &str) {
        match self {
            InjectionError::NotEnabled { .. } => {
                tracing::info!(uid = %uid, category = self.category(), "{}", self);
            }
            InjectionError::Configuration { .. }
            | InjectionError::UnsupportedLanguage { .. }
            | InjectionError::Validation { .. } => {
                tracing::warn!(uid = %uid, category = self.category(), "{}", self);
            }
            InjectionError::Decode { .. } | InjectionError::Serialization { .. } => {
                tracing::error!(uid = %uid, category = self.category(), "{}", self);
            }
        }
    }
}

impl From<serde_json::Error> for InjectionError {
    fn from(err: serde_json::Error) -> Self {
        InjectionError::Serialization {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injection_error_display() {
        let error = InjectionError::UnsupportedLanguage {
            language: "python".to_string(),
        };
        assert!(error.to_string().contains("python"));
        assert!(error.to_string().contains("not supported"));

        let error = InjectionError::Configuration {
            details: "language and version required".to_string(),
        };
        assert!(error.to_string().contains("language and version required"));

        let error = InjectionError::NotEnabled {
            annotation: "contrast-agent-injector/enabled",
        };
        assert!(error.to_string().contains("contrast-agent-injector/enabled"));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            InjectionError::Validation {
                details: String::new()
            }
            .category(),
            "validation_error"
        );
        assert_eq!(
            InjectionError::Decode {
                details: String::new()
            }
            .category(),
            "decode_error"
        );
        assert_eq!(
            InjectionError::NotEnabled { annotation: "x" }.category(),
            "not_enabled"
        );
    }

    #[test]
    fn test_only_decode_errors_fail_closed() {
        assert!(!InjectionError::Decode {
            details: String::new()
        }
        .is_fail_open());
        assert!(InjectionError::Configuration {
            details: String::new()
        }
        .is_fail_open());
        assert!(InjectionError::UnsupportedLanguage {
            language: String::new()
        }
        .is_fail_open());
        assert!(InjectionError::NotEnabled { annotation: "x" }.is_fail_open());
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: InjectionError = serde_json::from_str::<()>("not json").unwrap_err().into();
        assert_eq!(err.category(), "system_error");
    }
}
