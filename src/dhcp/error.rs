//! Error taxonomy for lease database parsing.
//!
//! Field-level variants come out of the record parser, block and file level
//! variants out of the database parser. [`ErrorKind`] gives callers a stable
//! identifier to branch on without matching on payloads.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while reading or parsing a lease database.
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    /// The block does not open with a `lease` declaration.
    #[error("lease block does not start with a lease declaration")]
    MissingLeaseDeclaration,

    /// The opening line has no usable address token.
    #[error("invalid ip in lease declaration {0:?}")]
    InvalidIp(String),

    /// `hardware ethernet` is absent or its value is not six hex pairs.
    #[error("invalid mac address{}", display_value(.0))]
    InvalidMacAddress(Option<String>),

    #[error("client-hostname absent")]
    MissingHostname,

    #[error("binding state absent")]
    MissingBindingState,

    #[error("invalid lease start: {0}")]
    InvalidLeaseStart(#[source] TimestampError),

    #[error("invalid lease end: {0}")]
    InvalidLeaseEnd(#[source] TimestampError),

    /// A block failed to produce a lease. Line numbers are 1-based and inclusive.
    #[error("malformed lease block between lines {first_line}:{last_line}: {source}")]
    MalformedLeaseBlock {
        first_line: usize,
        last_line: usize,
        #[source]
        source: Box<LeaseError>,
    },

    /// No block in the whole input produced a lease.
    #[error("invalid lease database: no lease could be parsed ({skipped} blocks skipped)")]
    EmptyOrUnparseableDatabase { skipped: usize },

    /// The lease file could not be read.
    #[error("failed to read dhcp database file {}: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a `starts`/`ends` value could not be turned into a timestamp.
#[derive(Debug, thiserror::Error)]
pub enum TimestampError {
    #[error("declaration absent")]
    Missing,

    #[error("unexpected value {0:?}")]
    Malformed(String),

    #[error("epoch {0} out of range")]
    EpochOutOfRange(i64),

    #[error(transparent)]
    Parse(#[from] chrono::ParseError),
}

/// Stable identifier for each [`LeaseError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingLeaseDeclaration,
    InvalidIp,
    InvalidMacAddress,
    MissingHostname,
    MissingBindingState,
    InvalidLeaseStart,
    InvalidLeaseEnd,
    MalformedLeaseBlock,
    EmptyOrUnparseableDatabase,
    SourceUnreadable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingLeaseDeclaration => "missing-lease-declaration",
            Self::InvalidIp => "invalid-ip",
            Self::InvalidMacAddress => "invalid-mac-address",
            Self::MissingHostname => "missing-hostname",
            Self::MissingBindingState => "missing-binding-state",
            Self::InvalidLeaseStart => "invalid-lease-start",
            Self::InvalidLeaseEnd => "invalid-lease-end",
            Self::MalformedLeaseBlock => "malformed-lease-block",
            Self::EmptyOrUnparseableDatabase => "empty-or-unparseable-database",
            Self::SourceUnreadable => "source-unreadable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LeaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingLeaseDeclaration => ErrorKind::MissingLeaseDeclaration,
            Self::InvalidIp(_) => ErrorKind::InvalidIp,
            Self::InvalidMacAddress(_) => ErrorKind::InvalidMacAddress,
            Self::MissingHostname => ErrorKind::MissingHostname,
            Self::MissingBindingState => ErrorKind::MissingBindingState,
            Self::InvalidLeaseStart(_) => ErrorKind::InvalidLeaseStart,
            Self::InvalidLeaseEnd(_) => ErrorKind::InvalidLeaseEnd,
            Self::MalformedLeaseBlock { .. } => ErrorKind::MalformedLeaseBlock,
            Self::EmptyOrUnparseableDatabase { .. } => ErrorKind::EmptyOrUnparseableDatabase,
            Self::SourceUnreadable { .. } => ErrorKind::SourceUnreadable,
        }
    }

    /// Name of the lease field a field-level error refers to
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidIp(_) => Some("ip"),
            Self::InvalidMacAddress(_) => Some("mac address"),
            Self::MissingHostname => Some("client-hostname"),
            Self::MissingBindingState => Some("binding state"),
            Self::InvalidLeaseStart(_) => Some("starts"),
            Self::InvalidLeaseEnd(_) => Some("ends"),
            Self::MalformedLeaseBlock { source, .. } => source.field(),
            _ => None,
        }
    }
}

fn display_value(value: &Option<String>) -> String {
    match value {
        Some(v) => format!(" {:?}", v),
        None => String::new(),
    }
}
