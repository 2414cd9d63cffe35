use std::fmt;
use std::io;
use std::path::PathBuf;

/// Every fallible boundary call of the crate reports one of these.
///
/// Discriminants are stable; messages are meant for humans.
#[derive(Debug)]
pub enum Error {
    /// Neither an app id nor an explicit content path was provided.
    AppIdNotSet,
    /// An explicit content path is missing or not a directory.
    PathNotFound(PathBuf),
    /// A subscription manifest is absent, malformed or inconsistent.
    BadManifest(String),
    /// The content bundle declares a version this crate does not read.
    UnsupportedVersion(String),
    /// Zero shards were discovered for the domain.
    Empty,
    /// Record metadata is not a valid object model.
    BadFormat(String),
    /// A URI does not match the id grammar.
    IdNotValid(String),
    /// No shard holds the requested id.
    IdNotFound(String),
    /// The federated search index cannot be opened.
    DatabaseInvalid(String),
    /// The federated search index holds zero documents.
    DatabaseEmpty,
    /// The operation was cancelled through its token.
    Cancelled,
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AppIdNotSet => {
                write!(f, "an app id or a content path is required to initialize a domain")
            }
            Error::PathNotFound(path) => {
                write!(f, "{} is not a valid directory", path.display())
            }
            Error::BadManifest(detail) => write!(f, "invalid manifest: {detail}"),
            Error::UnsupportedVersion(version) => {
                write!(f, "unsupported content version: {version}")
            }
            Error::Empty => write!(f, "content is empty"),
            Error::BadFormat(detail) => write!(f, "bad object metadata: {detail}"),
            Error::IdNotValid(uri) => write!(f, "the asset URI is not valid: {uri}"),
            Error::IdNotFound(uri) => {
                write!(f, "could not find shard record for URI {uri}")
            }
            Error::DatabaseInvalid(detail) => {
                write!(f, "cannot open search database: {detail}")
            }
            Error::DatabaseEmpty => write!(f, "empty search database"),
            Error::Cancelled => write!(f, "operation was cancelled"),
            Error::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}
