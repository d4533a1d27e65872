//! Feature extraction: annotation records plus image bytes into example
//! records ready for serialization.
//!
//! One example per image that keeps at least one object. Per-object values
//! live in parallel sequences so they serialize as the flat feature lists
//! detection trainers expect.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::ConvertError;
use crate::label_map::LabelMap;
use crate::voc::VocAnnotation;

/// Image format tag written into every record; the only format accepted.
pub const IMAGE_FORMAT: &str = "jpeg";

/// One output record: an image plus per-object parallel sequences.
///
/// Coordinates are normalized to [0,1] by the declared image size. The
/// sequences are index-aligned: entry `i` of every sequence describes the
/// same object.
#[derive(Clone, Debug)]
pub struct ImageExample {
    /// Image file name, also used as the source identifier.
    pub filename: String,
    /// Declared image width in pixels.
    pub width: u32,
    /// Declared image height in pixels.
    pub height: u32,
    /// SHA-256 of the encoded image bytes, hex-encoded.
    pub key_sha256: String,
    /// Encoded JPEG bytes exactly as read from disk.
    pub encoded: Vec<u8>,
    /// Format tag, always [`IMAGE_FORMAT`].
    pub format: &'static str,
    pub xmins: Vec<f32>,
    pub ymins: Vec<f32>,
    pub xmaxs: Vec<f32>,
    pub ymaxs: Vec<f32>,
    pub class_names: Vec<String>,
    pub class_ids: Vec<i64>,
    /// Truncated flags as 0/1.
    pub truncated: Vec<i64>,
    /// Pose strings, one per object.
    pub poses: Vec<String>,
    /// Difficult flags as 0/1.
    pub difficult: Vec<i64>,
}

impl ImageExample {
    /// Number of objects carried by this example.
    pub fn object_count(&self) -> usize {
        self.class_ids.len()
    }
}

/// Extraction output: examples in input order plus skip counters.
#[derive(Debug, Default)]
pub struct Extraction {
    pub examples: Vec<ImageExample>,
    /// Objects skipped by the difficult filter.
    pub skipped_difficult: usize,
    /// Annotation records with no objects at all.
    pub records_without_objects: usize,
    /// Records whose objects were all skipped by the difficult filter.
    pub records_all_difficult: usize,
}

/// Build one [`ImageExample`] per annotation record that keeps at least one
/// object.
///
/// Images are resolved as `images_dir/<filename>` and read once per record,
/// and only when the record keeps an object. Records with nothing to keep
/// are counted and dropped.
pub fn extract_examples(
    annotations: &BTreeMap<String, VocAnnotation>,
    images_dir: &Path,
    label_map: &LabelMap,
    ignore_difficult_instances: bool,
) -> Result<Extraction, ConvertError> {
    let mut extraction = Extraction::default();

    for (source_file, annotation) in annotations {
        if annotation.objects.is_empty() {
            extraction.records_without_objects += 1;
            continue;
        }

        let mut xmins = Vec::new();
        let mut ymins = Vec::new();
        let mut xmaxs = Vec::new();
        let mut ymaxs = Vec::new();
        let mut class_names = Vec::new();
        let mut class_ids = Vec::new();
        let mut truncated = Vec::new();
        let mut poses = Vec::new();
        let mut difficult = Vec::new();

        let mut image: Option<LoadedImage> = None;

        for object in &annotation.objects {
            if ignore_difficult_instances && object.difficult {
                extraction.skipped_difficult += 1;
                continue;
            }

            difficult.push(i64::from(object.difficult));

            if image.is_none() {
                image = Some(load_jpeg(images_dir, &annotation.filename)?);
            }

            let norm = object
                .bbox
                .to_normalized(f64::from(annotation.width), f64::from(annotation.height));
            xmins.push(norm.xmin() as f32);
            ymins.push(norm.ymin() as f32);
            xmaxs.push(norm.xmax() as f32);
            ymaxs.push(norm.ymax() as f32);

            let class_id =
                label_map
                    .id_for(&object.name)
                    .ok_or_else(|| ConvertError::UnknownClass {
                        name: object.name.clone(),
                        file: source_file.clone(),
                    })?;
            class_names.push(object.name.clone());
            class_ids.push(class_id);

            truncated.push(i64::from(object.truncated));
            poses.push(object.pose.clone());
        }

        let Some(image) = image else {
            extraction.records_all_difficult += 1;
            continue;
        };

        extraction.examples.push(ImageExample {
            filename: annotation.filename.clone(),
            width: annotation.width,
            height: annotation.height,
            key_sha256: image.key_sha256,
            encoded: image.encoded,
            format: IMAGE_FORMAT,
            xmins,
            ymins,
            xmaxs,
            ymaxs,
            class_names,
            class_ids,
            truncated,
            poses,
            difficult,
        });
    }

    Ok(extraction)
}

struct LoadedImage {
    encoded: Vec<u8>,
    key_sha256: String,
}

fn load_jpeg(images_dir: &Path, filename: &str) -> Result<LoadedImage, ConvertError> {
    let path = images_dir.join(filename);
    let encoded = fs::read(&path).map_err(|source| ConvertError::ImageRead {
        path: path.clone(),
        source,
    })?;

    let image_type =
        imagesize::image_type(&encoded).map_err(|source| ConvertError::ImageProbe {
            path: path.clone(),
            source,
        })?;
    match image_type {
        imagesize::ImageType::Jpeg => {}
        other => {
            return Err(ConvertError::UnsupportedImageFormat {
                path,
                detected: format!("{other:?}"),
            });
        }
    }

    let key_sha256 = hex::encode(Sha256::digest(&encoded));
    Ok(LoadedImage { encoded, key_sha256 })
}
