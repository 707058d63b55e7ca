//! Errors raised while building and validating the protocol model.

/// A fatal problem with one schema element.
///
/// Returned by every parse/validate step; the caller reports it as an error
/// diagnostic at the element's location and carries on with the next sibling.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Document(String),
    #[error("missing required property \"{0}\"")]
    MissingProperty(String),
    #[error("property \"{0}\" may be defined only once")]
    DuplicateProperty(String),
    #[error("property \"{prop}\" has unexpected value ({value})")]
    UnexpectedValue { prop: String, value: String },
    #[error("invalid name \"{0}\"")]
    InvalidName(String),
    #[error("{kind} \"{name}\" has already been defined")]
    DuplicateName { kind: &'static str, name: String },
    #[error("\"{name}\": deprecated version ({deprecated}) must be greater than since version ({since})")]
    VersionWindow { name: String, since: u32, deprecated: u32 },
    #[error("\"{name}\": since version ({since}) is greater than the schema version ({schema})")]
    SinceAboveSchema { name: String, since: u32, schema: u32 },
    #[error("\"{name}\": {reason}")]
    Length { name: String, reason: String },
    #[error("bitfield \"{name}\": members occupy {actual} bits, expected {expected}")]
    BitLengthMismatch { name: String, expected: usize, actual: usize },
    #[error("bitfield member \"{0}\" cannot have variable length type")]
    VariableLengthMember(String),
    #[error("bitfield member \"{name}\" of kind {kind} is not allowed")]
    BitfieldMemberKind { name: String, kind: &'static str },
    #[error("\"{name}\": value \"{value}\" is outside the range of the type")]
    OutOfTypeRange { name: String, value: String },
    #[error("\"{name}\": value {value} has already been defined as \"{existing}\"")]
    DuplicateValue { name: String, value: String, existing: String },
    #[error("cannot resolve field reference \"{0}\"")]
    UnresolvedReference(String),
    #[error("\"{name}\": {reason}")]
    PrefixConflict { name: String, reason: String },
    #[error("frame \"{frame}\": {reason}")]
    LayerComposition { frame: String, reason: String },
    #[error("reference cycle through \"{0}\"")]
    ReferenceCycle(String),
    #[error("unknown field kind <{0}>")]
    UnknownFieldKind(String),
    #[error("\"{0}\" has invalid members")]
    InvalidMembers(String),
    #[error("variant \"{variant}\": version dependent member \"{member}\" is not supported")]
    VersionDependentMember { variant: String, member: String },
    #[error("message \"{message}\": id \"{id}\" cannot be recognised")]
    UnknownMessageId { message: String, id: String },
    #[error("message \"{message}\": id {id} is already used by \"{existing}\"")]
    DuplicateMessageId { message: String, id: i128, existing: String },
    #[error("message \"{message}\": platform \"{platform}\" has not been declared")]
    UndeclaredPlatform { message: String, platform: String },
    #[error("\"{name}\": {reason}")]
    Invalid { name: String, reason: String },
}

impl SchemaError {
    pub fn unexpected(prop: &str, value: &str) -> Self {
        SchemaError::UnexpectedValue {
            prop: prop.to_string(),
            value: value.to_string(),
        }
    }

    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        SchemaError::Invalid {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
