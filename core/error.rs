use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("TOML Parsing Error: {0}")]
    TomlParse(String),

    #[error("TOML Serialization Error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("YAML Parsing Error: {0}")]
    YamlParse(#[from] serde_yml::Error),

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File Write Error: Path '{path}', Error: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory Read Error: '{path}', Error: {source}")]
    DirRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported Root: '{0}' is not a directory")]
    UnsupportedRoot(String),

    #[error("No root directory has been opened")]
    NoRoot,

    #[error("Entry Not Found: '{0}'")]
    EntryNotFound(String),

    #[error("Not A Directory: '{0}'")]
    NotADirectory(String),

    #[error("Unknown Rule: '{0}'")]
    UnknownRule(String),

    #[error("Glob Pattern Error: {0}")]
    Glob(String),

    #[error("Ignore Error: {0}")]
    Ignore(#[from] ignore::Error),

    #[error("Rule Loading Error: {0}")]
    RuleLoading(String),

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("Size Parsing Error: {0}")]
    SizeParse(String),
}

impl From<globset::Error> for AppError {
    fn from(err: globset::Error) -> Self {
        AppError::Glob(format!("Globset error: {}", err))
    }
}

impl From<byte_unit::ParseError> for AppError {
    fn from(err: byte_unit::ParseError) -> Self {
        AppError::SizeParse(err.to_string())
    }
}
