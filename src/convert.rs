//! The end-to-end conversion pipeline.
//!
//! Four stages run strictly in sequence: load annotations, build or load the
//! label map, extract examples, write the record file. Any stage error
//! aborts the run; there are no retries and no partial-output recovery.

use std::path::PathBuf;

use crate::error::ConvertError;
use crate::example;
use crate::label_map::{self, LabelMapSource};
use crate::report::{ConvertReport, LabelMapSummary};
use crate::tfrecord;
use crate::voc;

/// Options for one conversion run.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// Directory holding the `.xml` annotation files.
    pub annotations_dir: PathBuf,
    /// Directory holding the referenced JPEG files.
    pub images_dir: PathBuf,
    /// Output TFRecord path.
    pub output_path: PathBuf,
    /// Label map pbtxt path; loaded if present and non-empty, else written.
    pub label_map_path: PathBuf,
    /// Drop objects flagged difficult, and records the filter empties out.
    pub ignore_difficult_instances: bool,
    /// Fail if a pre-existing label map does not cover every observed class.
    pub check_label_map: bool,
}

/// Run the pipeline and return a report of what was written.
///
/// Progress milestones go to stderr so that stdout stays reserved for the
/// report the caller chooses to print.
pub fn convert(options: &ConvertOptions) -> Result<ConvertReport, ConvertError> {
    let annotations = voc::read_voc_dir(&options.annotations_dir)?;
    eprintln!("Pascal VOC data loaded.");

    let (label_map, label_map_source) =
        label_map::build_or_load(&options.label_map_path, &annotations)?;
    if label_map_source == LabelMapSource::Built {
        eprintln!("Label map saved as: {}", options.label_map_path.display());
    }

    if options.check_label_map {
        let missing = label_map.missing_classes(&annotations);
        if !missing.is_empty() {
            return Err(ConvertError::LabelMapCoverage {
                path: options.label_map_path.clone(),
                names: missing,
            });
        }
    }

    let extraction = example::extract_examples(
        &annotations,
        &options.images_dir,
        &label_map,
        options.ignore_difficult_instances,
    )?;

    tfrecord::write_tfrecord(&options.output_path, &extraction.examples)?;
    eprintln!("TFRecord saved as: {}", options.output_path.display());

    let objects_written = extraction
        .examples
        .iter()
        .map(example::ImageExample::object_count)
        .sum();

    Ok(ConvertReport {
        annotation_files: annotations.len(),
        examples_written: extraction.examples.len(),
        objects_written,
        skipped_difficult: extraction.skipped_difficult,
        records_without_objects: extraction.records_without_objects,
        records_all_difficult: extraction.records_all_difficult,
        label_map: LabelMapSummary {
            path: options.label_map_path.clone(),
            source: label_map_source,
            classes: label_map.len(),
        },
        output_path: options.output_path.clone(),
    })
}
