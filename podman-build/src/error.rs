use std::{fmt, io, path::PathBuf};

pub use crate::process::ExecutionError;

/// Everything that can make a build step fail. No step recovers locally, the first error is
/// returned to the caller.
#[derive(Debug)]
pub enum Error {
    Configuration(ConfigurationError),
    ConfigFile {
        path: PathBuf,
        cause: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    Filter(FilterError),
    Execution(ExecutionError),
    EmptyOutput {
        command: String,
    },
    Export {
        image_hash: String,
        destination: PathBuf,
        cause: ExportCause,
    },
    Tag {
        image_hash: String,
        name: String,
        cause: ExecutionError,
    },
}

#[derive(Debug)]
pub enum ExportCause {
    Io(io::Error),
    Execution(ExecutionError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(error) => write!(f, "invalid build configuration: {error}"),
            Error::ConfigFile { path, .. } => {
                write!(f, "failed to load configuration file {path:?}")
            }
            Error::Filter(error) => write!(f, "failed to filter Dockerfile: {error}"),
            Error::Execution(error) => write!(f, "failed to build container image: {error}"),
            Error::EmptyOutput { command } => write!(
                f,
                "`{command}` did not print any output, unable to determine the image hash"
            ),
            Error::Export {
                image_hash,
                destination,
                ..
            } => write!(
                f,
                "failed to export container image {image_hash} to {destination:?}"
            ),
            Error::Tag {
                image_hash, name, ..
            } => write!(f, "failed to tag container image {image_hash} as {name}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Configuration(_) | Error::Filter(_) | Error::Execution(_) => None,
            Error::ConfigFile { cause, .. } => Some(cause.as_ref()),
            Error::EmptyOutput { .. } => None,
            Error::Export { cause, .. } => match cause {
                ExportCause::Io(error) => Some(error),
                ExportCause::Execution(error) => Some(error),
            },
            Error::Tag { cause, .. } => Some(cause),
        }
    }
}

impl From<ConfigurationError> for Error {
    fn from(value: ConfigurationError) -> Self {
        Error::Configuration(value)
    }
}

impl From<FilterError> for Error {
    fn from(value: FilterError) -> Self {
        Error::Filter(value)
    }
}

impl From<ExecutionError> for Error {
    fn from(value: ExecutionError) -> Self {
        Error::Execution(value)
    }
}

/// The build context could not be constructed from the configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    MissingDockerfile(PathBuf),
    SameDockerfile(PathBuf),
    MissingImageName,
    InvalidImageName(String),
    InvalidTag(String),
    EmptyEngine,
    InvalidExportDir(String),
    MissingField(&'static str),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingDockerfile(path) => {
                write!(f, "Dockerfile {path:?} does not exist")
            }
            ConfigurationError::SameDockerfile(path) => write!(
                f,
                "the filtered Dockerfile would overwrite its template {path:?}, choose a different output directory"
            ),
            ConfigurationError::MissingImageName => {
                write!(f, "an image name is required when tags are configured")
            }
            ConfigurationError::InvalidImageName(name) => {
                write!(f, "invalid container image name {name:?}")
            }
            ConfigurationError::InvalidTag(tag) => write!(
                f,
                "invalid container image tag {tag:?}, expected up to 128 characters matching [A-Za-z0-9_][A-Za-z0-9_.-]*"
            ),
            ConfigurationError::EmptyEngine => {
                write!(f, "the container engine command must not be empty")
            }
            ConfigurationError::InvalidExportDir(name) => write!(
                f,
                "invalid image export directory {name:?}, expected a single directory name"
            ),
            ConfigurationError::MissingField(field) => write!(f, "`{field}` was not set"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperation {
    Read,
    CreateDir,
    Write,
}

/// The Dockerfile template could not be filtered into the output directory.
#[derive(Debug)]
pub struct FilterError {
    pub operation: FilterOperation,
    pub path: PathBuf,
    pub cause: io::Error,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            operation,
            path,
            cause,
        } = self;
        let operation = match operation {
            FilterOperation::Read => "read",
            FilterOperation::CreateDir => "create directory",
            FilterOperation::Write => "write",
        };
        write!(f, "unable to {operation} {path:?}: {cause}")
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
