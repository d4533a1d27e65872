//! TFRecord container framing and the `tensorflow.Example` wire messages.
//!
//! A TFRecord file is a flat sequence of length-delimited entries:
//!
//! ```text
//! u64 LE  payload length
//! u32 LE  masked CRC32C of the length bytes
//! bytes   payload
//! u32 LE  masked CRC32C of the payload
//! ```
//!
//! Each payload is one serialized `tensorflow.Example` message. The message
//! types are hand-written prost structs since the schema is tiny and frozen;
//! the feature map is a BTreeMap so encoded bytes are deterministic.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use prost::Message;

use crate::error::ConvertError;
use crate::example::ImageExample;

/// Wire types for the `tensorflow.Example` schema.
pub mod proto {
    use std::collections::BTreeMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Example {
        #[prost(message, optional, tag = "1")]
        pub features: ::core::option::Option<Features>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Features {
        #[prost(btree_map = "string, message", tag = "1")]
        pub feature: BTreeMap<::prost::alloc::string::String, Feature>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Feature {
        #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
        pub kind: ::core::option::Option<feature::Kind>,
    }

    /// Nested message and enum types in `Feature`.
    pub mod feature {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Kind {
            #[prost(message, tag = "1")]
            BytesList(super::BytesList),
            #[prost(message, tag = "2")]
            FloatList(super::FloatList),
            #[prost(message, tag = "3")]
            Int64List(super::Int64List),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BytesList {
        #[prost(bytes = "vec", repeated, tag = "1")]
        pub value: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FloatList {
        #[prost(float, repeated, tag = "1")]
        pub value: ::prost::alloc::vec::Vec<f32>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Int64List {
        #[prost(int64, repeated, tag = "1")]
        pub value: ::prost::alloc::vec::Vec<i64>,
    }
}

const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC32C with the TFRecord rotation mask applied.
fn masked_crc32c(bytes: &[u8]) -> u32 {
    crc32c::crc32c(bytes)
        .rotate_right(15)
        .wrapping_add(MASK_DELTA)
}

/// Build the wire message for one example.
pub fn example_to_proto(example: &ImageExample) -> proto::Example {
    let mut feature = std::collections::BTreeMap::new();

    feature.insert(
        "image/height".to_string(),
        int64_feature(i64::from(example.height)),
    );
    feature.insert(
        "image/width".to_string(),
        int64_feature(i64::from(example.width)),
    );
    feature.insert(
        "image/filename".to_string(),
        bytes_feature(example.filename.as_bytes()),
    );
    feature.insert(
        "image/source_id".to_string(),
        bytes_feature(example.filename.as_bytes()),
    );
    feature.insert(
        "image/key/sha256".to_string(),
        bytes_feature(example.key_sha256.as_bytes()),
    );
    feature.insert(
        "image/encoded".to_string(),
        bytes_feature(example.encoded.clone()),
    );
    feature.insert(
        "image/format".to_string(),
        bytes_feature(example.format.as_bytes()),
    );
    feature.insert(
        "image/object/bbox/xmin".to_string(),
        float_list_feature(example.xmins.clone()),
    );
    feature.insert(
        "image/object/bbox/xmax".to_string(),
        float_list_feature(example.xmaxs.clone()),
    );
    feature.insert(
        "image/object/bbox/ymin".to_string(),
        float_list_feature(example.ymins.clone()),
    );
    feature.insert(
        "image/object/bbox/ymax".to_string(),
        float_list_feature(example.ymaxs.clone()),
    );
    feature.insert(
        "image/object/class/text".to_string(),
        bytes_list_feature(
            example
                .class_names
                .iter()
                .map(|name| name.clone().into_bytes())
                .collect(),
        ),
    );
    feature.insert(
        "image/object/class/label".to_string(),
        int64_list_feature(example.class_ids.clone()),
    );
    feature.insert(
        "image/object/difficult".to_string(),
        int64_list_feature(example.difficult.clone()),
    );
    feature.insert(
        "image/object/truncated".to_string(),
        int64_list_feature(example.truncated.clone()),
    );
    feature.insert(
        "image/object/view".to_string(),
        bytes_list_feature(
            example
                .poses
                .iter()
                .map(|pose| pose.clone().into_bytes())
                .collect(),
        ),
    );

    proto::Example {
        features: Some(proto::Features { feature }),
    }
}

/// Write `examples` to `path` as one TFRecord file, in slice order.
///
/// No partial-write recovery: a failure mid-sequence leaves the file
/// truncated at the last complete write and propagates the error.
pub fn write_tfrecord(path: &Path, examples: &[ImageExample]) -> Result<(), ConvertError> {
    let file = File::create(path).map_err(|source| ConvertError::TfrecordWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    for example in examples {
        let payload = example_to_proto(example).encode_to_vec();
        write_record(&mut writer, &payload).map_err(|source| ConvertError::TfrecordWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    writer.flush().map_err(|source| ConvertError::TfrecordWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Serialize `examples` to TFRecord bytes in memory.
///
/// This helper is primarily useful for testing and benchmarks.
pub fn to_tfrecord_bytes(examples: &[ImageExample]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for example in examples {
        let payload = example_to_proto(example).encode_to_vec();
        write_record(&mut bytes, &payload).expect("write to memory buffer");
    }
    bytes
}

/// Read a TFRecord file back into decoded examples, verifying both
/// checksums of every entry.
pub fn read_tfrecord(path: &Path) -> Result<Vec<proto::Example>, ConvertError> {
    let bytes = fs::read(path).map_err(ConvertError::Io)?;
    read_records(&bytes, path)
}

/// Decode TFRecord bytes from memory.
///
/// This helper is primarily useful for testing/fuzzing parse behavior in-memory.
pub fn read_tfrecord_slice(bytes: &[u8]) -> Result<Vec<proto::Example>, ConvertError> {
    read_records(bytes, Path::new("<memory>"))
}

/// One-line summary of a decoded example: filename, dimensions, object count.
pub fn describe_example(example: &proto::Example) -> String {
    let features = example.features.as_ref();
    let filename = bytes_value(features, "image/filename")
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_else(|| "<missing filename>".to_string());
    let width = int64_value(features, "image/width")
        .map_or_else(|| "?".to_string(), |value| value.to_string());
    let height = int64_value(features, "image/height")
        .map_or_else(|| "?".to_string(), |value| value.to_string());
    let objects = int64_list_len(features, "image/object/class/label").unwrap_or(0);
    format!("{filename} ({width}x{height}, {objects} object(s))")
}

fn write_record<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    let length = (payload.len() as u64).to_le_bytes();
    writer.write_all(&length)?;
    writer.write_all(&masked_crc32c(&length).to_le_bytes())?;
    writer.write_all(payload)?;
    writer.write_all(&masked_crc32c(payload).to_le_bytes())?;
    Ok(())
}

fn read_records(bytes: &[u8], path: &Path) -> Result<Vec<proto::Example>, ConvertError> {
    let read_error = |message: String| ConvertError::TfrecordRead {
        path: path.to_path_buf(),
        message,
    };

    let mut examples = Vec::new();
    let mut offset = 0usize;
    let mut index = 0usize;

    while offset < bytes.len() {
        if bytes.len() - offset < 12 {
            return Err(read_error(format!(
                "truncated entry header at record {index}"
            )));
        }

        let mut length_bytes = [0u8; 8];
        length_bytes.copy_from_slice(&bytes[offset..offset + 8]);
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&bytes[offset + 8..offset + 12]);

        if masked_crc32c(&length_bytes) != u32::from_le_bytes(crc_bytes) {
            return Err(read_error(format!(
                "length checksum mismatch at record {index}"
            )));
        }

        let length = u64::from_le_bytes(length_bytes);
        let remaining = (bytes.len() - offset - 12) as u64;
        if length.checked_add(4).map_or(true, |need| need > remaining) {
            return Err(read_error(format!(
                "truncated payload at record {index}: need {length}+4 bytes, {remaining} remain"
            )));
        }
        let length = length as usize;

        let payload = &bytes[offset + 12..offset + 12 + length];
        crc_bytes.copy_from_slice(&bytes[offset + 12 + length..offset + 16 + length]);
        if masked_crc32c(payload) != u32::from_le_bytes(crc_bytes) {
            return Err(read_error(format!(
                "payload checksum mismatch at record {index}"
            )));
        }

        let example = proto::Example::decode(payload)
            .map_err(|source| read_error(format!("record {index}: {source}")))?;
        examples.push(example);

        offset += 16 + length;
        index += 1;
    }

    Ok(examples)
}

fn bytes_feature(value: impl Into<Vec<u8>>) -> proto::Feature {
    proto::Feature {
        kind: Some(proto::feature::Kind::BytesList(proto::BytesList {
            value: vec![value.into()],
        })),
    }
}

fn bytes_list_feature(values: Vec<Vec<u8>>) -> proto::Feature {
    proto::Feature {
        kind: Some(proto::feature::Kind::BytesList(proto::BytesList {
            value: values,
        })),
    }
}

fn float_list_feature(values: Vec<f32>) -> proto::Feature {
    proto::Feature {
        kind: Some(proto::feature::Kind::FloatList(proto::FloatList {
            value: values,
        })),
    }
}

fn int64_feature(value: i64) -> proto::Feature {
    proto::Feature {
        kind: Some(proto::feature::Kind::Int64List(proto::Int64List {
            value: vec![value],
        })),
    }
}

fn int64_list_feature(values: Vec<i64>) -> proto::Feature {
    proto::Feature {
        kind: Some(proto::feature::Kind::Int64List(proto::Int64List {
            value: values,
        })),
    }
}

fn bytes_value<'a>(features: Option<&'a proto::Features>, key: &str) -> Option<&'a [u8]> {
    match features?.feature.get(key)?.kind.as_ref()? {
        proto::feature::Kind::BytesList(list) => list.value.first().map(Vec::as_slice),
        _ => None,
    }
}

fn int64_value(features: Option<&proto::Features>, key: &str) -> Option<i64> {
    match features?.feature.get(key)?.kind.as_ref()? {
        proto::feature::Kind::Int64List(list) => list.value.first().copied(),
        _ => None,
    }
}

fn int64_list_len(features: Option<&proto::Features>, key: &str) -> Option<usize> {
    match features?.feature.get(key)?.kind.as_ref()? {
        proto::feature::Kind::Int64List(list) => Some(list.value.len()),
        _ => None,
    }
}
