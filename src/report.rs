//! Conversion run reporting.
//!
//! The report tracks what the pipeline kept and what it dropped, so users
//! can tell a quiet run from one that filtered half the dataset away.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::label_map::LabelMapSource;

/// A report generated by one conversion run.
///
/// `Display` renders the human-readable block the CLI prints; `Serialize`
/// backs the `--report json` output.
#[derive(Clone, Debug, Serialize)]
pub struct ConvertReport {
    /// Annotation files parsed.
    pub annotation_files: usize,
    /// Examples written to the record file.
    pub examples_written: usize,
    /// Objects across all written examples.
    pub objects_written: usize,
    /// Objects skipped by the difficult filter.
    pub skipped_difficult: usize,
    /// Annotation files dropped because they declare no objects.
    pub records_without_objects: usize,
    /// Annotation files dropped because the difficult filter removed every object.
    pub records_all_difficult: usize,
    /// Label map details.
    pub label_map: LabelMapSummary,
    /// Output record file path.
    pub output_path: PathBuf,
}

/// Label map portion of a [`ConvertReport`].
#[derive(Clone, Debug, Serialize)]
pub struct LabelMapSummary {
    /// Label map file path.
    pub path: PathBuf,
    /// Whether the map was loaded from disk or freshly built.
    pub source: LabelMapSource,
    /// Number of classes in the map.
    pub classes: usize,
}

impl fmt::Display for ConvertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Converted {} annotation file(s): {} example(s), {} object(s)",
            self.annotation_files, self.examples_written, self.objects_written
        )?;

        // Only surface drop counters when something was actually dropped
        if self.skipped_difficult > 0 {
            writeln!(
                f,
                "  {} object(s) skipped as difficult",
                self.skipped_difficult
            )?;
        }
        if self.records_without_objects > 0 {
            writeln!(
                f,
                "  {} record(s) dropped: no objects",
                self.records_without_objects
            )?;
        }
        if self.records_all_difficult > 0 {
            writeln!(
                f,
                "  {} record(s) dropped: all objects difficult",
                self.records_all_difficult
            )?;
        }

        let label_map_verb = match self.label_map.source {
            LabelMapSource::Loaded => "loaded from",
            LabelMapSource::Built => "built and saved to",
        };
        writeln!(
            f,
            "Label map: {} class(es) {} {}",
            self.label_map.classes,
            label_map_verb,
            self.label_map.path.display()
        )?;
        writeln!(f, "Output: {}", self.output_path.display())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ConvertReport {
        ConvertReport {
            annotation_files: 3,
            examples_written: 2,
            objects_written: 5,
            skipped_difficult: 0,
            records_without_objects: 1,
            records_all_difficult: 0,
            label_map: LabelMapSummary {
                path: PathBuf::from("label_map.pbtxt"),
                source: LabelMapSource::Built,
                classes: 2,
            },
            output_path: PathBuf::from("train.tfrecord"),
        }
    }

    #[test]
    fn display_shows_counts_and_label_map_provenance() {
        let text = sample_report().to_string();
        assert!(text.contains("Converted 3 annotation file(s): 2 example(s), 5 object(s)"));
        assert!(text.contains("1 record(s) dropped: no objects"));
        assert!(text.contains("Label map: 2 class(es) built and saved to label_map.pbtxt"));
        assert!(text.contains("Output: train.tfrecord"));
    }

    #[test]
    fn display_hides_zero_drop_counters() {
        let text = sample_report().to_string();
        assert!(!text.contains("skipped as difficult"));
        assert!(!text.contains("all objects difficult"));
    }

    #[test]
    fn loaded_label_map_renders_differently() {
        let mut report = sample_report();
        report.label_map.source = LabelMapSource::Loaded;
        assert!(report
            .to_string()
            .contains("Label map: 2 class(es) loaded from label_map.pbtxt"));
    }

    #[test]
    fn report_serializes_to_json() {
        let json = serde_json::to_string(&sample_report()).unwrap();
        assert!(json.contains("\"annotation_files\":3"));
        assert!(json.contains("\"examples_written\":2"));
        assert!(json.contains("\"source\":\"built\""));
    }
}
