use std::path::PathBuf;
use thiserror::Error;

/// The main error type for voc2tfrecord operations.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse VOC XML from {path}: {message}")]
    VocXmlParse { path: PathBuf, message: String },

    #[error("Failed to parse label map {path} at line {line}: {message}")]
    LabelMapParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid label map: {message}")]
    LabelMapInvalid { message: String },

    #[error("Label map {path} is missing {} class(es): {}", .names.len(), .names.join(", "))]
    LabelMapCoverage { path: PathBuf, names: Vec<String> },

    #[error("Class '{name}' in {file} is not present in the label map")]
    UnknownClass { name: String, file: String },

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to probe image format of {path}: {source}")]
    ImageProbe {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Unsupported image format in {path}: expected JPEG, found {detected}")]
    UnsupportedImageFormat { path: PathBuf, detected: String },

    #[error("Failed to write TFRecord to {path}: {source}")]
    TfrecordWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read TFRecord from {path}: {message}")]
    TfrecordRead { path: PathBuf, message: String },

    #[error("Failed to serialize report to JSON: {0}")]
    ReportSerialize(#[from] serde_json::Error),
}
