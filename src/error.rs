use thiserror::Error;

/// Error taxonomy for the mapping engine.
///
/// Every failure is fatal to the current read/write/convert call. There is no
/// partial-result mode: a failed node aborts the whole conversion and the
/// error names the offending type and/or key so the caller can locate it.
#[derive(Debug, Clone, Error)]
pub enum KeytreeError {
    /// Malformed token sequence, duplicate child name, leaf/object path
    /// conflict, or a tree shape the active composer cannot represent.
    #[error("Structural error: {0}")]
    Structure(String),

    /// No matching constructor, a non-constructible target type, or an
    /// argument that does not fit the resolved constructor.
    #[error("Construction error for type '{type_name}': {reason}")]
    Construction {
        type_name: String,
        reason: String,
        #[source]
        source: Option<Box<KeytreeError>>,
    },

    /// No converter, member, or type descriptor found for a given name/type.
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Primitive text that does not parse as the requested scalar kind.
    #[error("Cannot parse '{text}' as {type_name}")]
    Parse { type_name: String, text: String },
}

impl KeytreeError {
    pub fn structure(msg: impl Into<String>) -> Self {
        KeytreeError::Structure(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        KeytreeError::Lookup(msg.into())
    }

    pub fn parse(type_name: impl Into<String>, text: impl Into<String>) -> Self {
        KeytreeError::Parse {
            type_name: type_name.into(),
            text: text.into(),
        }
    }

    pub fn construction(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        KeytreeError::Construction {
            type_name: type_name.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Wrap an underlying failure with type-name context, chaining the
    /// original error as the cause.
    pub fn construction_caused(
        type_name: impl Into<String>,
        reason: impl Into<String>,
        cause: KeytreeError,
    ) -> Self {
        KeytreeError::Construction {
            type_name: type_name.into(),
            reason: reason.into(),
            source: Some(Box::new(cause)),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeytreeError>;
