use thiserror::Error;

/// RLP encode/decode failures.
///
/// Decoding is defensive by design: every variant corresponds to a way a
/// peer or an on-disk node could hand back bytes that are syntactically
/// RLP but not the canonical encoding this implementation produces. None of
/// these should ever be hit on data this crate itself encoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RlpError {
    #[error("input ended before the declared payload length")]
    InputTooShort,

    #[error("length prefix used more bytes than the minimal encoding requires")]
    NonCanonicalLength,

    #[error("single length byte below 56 would have been encoded more compactly")]
    NonCanonicalSize,

    #[error("multi-byte length encoded with a leading zero byte")]
    LeadingZero,

    #[error("declared length overflows usize")]
    SizeOverflow,

    #[error("expected a byte string, found a list")]
    UnexpectedList,

    #[error("expected a list, found a byte string")]
    UnexpectedString,

    #[error("trailing bytes after a complete RLP item")]
    TrailingBytes,
}
