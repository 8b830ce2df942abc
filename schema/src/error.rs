use thiserror::Error;

/// Errors raised while building or pairing region schemas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("The type \"{0}\" is defined twice")]
    DuplicateType(String),

    #[error("The field \"{field}\" is defined twice in \"{struct_name}\"")]
    DuplicateField {
        struct_name: String,
        field:       String,
    },

    #[error("Region schema mismatch: expected \"{expected}\", found \"{found}\"")]
    Mismatch {
        expected: String,
        found:    String,
    },
}

/// Errors raised by the binary codec. All of them are terminal for the
/// serialize or deserialize call that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("end of data")]
    EndOfData,

    #[error("index {index} out of range for a pool of {cardinality}")]
    IndexOutOfRange {
        index:       usize,
        cardinality: usize,
    },

    #[error("variable-length integer does not fit in 64 bits")]
    VarIntOverflow,

    #[error("count {0} out of range")]
    CountOutOfRange(usize),

    #[error("invalid boolean byte {0}")]
    InvalidBool(u8),

    #[error("value {value} out of range for an {type_name}")]
    ValueOutOfRange {
        value:     String,
        type_name: String,
    },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("reference field \"{field}\" of \"{struct_name}\" is not set")]
    NullReference {
        struct_name: String,
        field:       String,
    },

    #[error("expected a value of type {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found:    String,
    },

    #[error("cannot deserialize into a region that already holds objects")]
    RegionNotEmpty,
}
