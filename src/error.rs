use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("missing part in package: {0}")]
    MissingPart(String),

    /// The part is not well-formed XML.
    #[error("malformed markup in {part}: {source}")]
    MalformedMarkup {
        part: String,
        #[source]
        source: quick_xml::Error,
    },
}

pub type Result<T> = std::result::Result<T, ExtractError>;
