//! Pascal VOC XML annotation reader.
//!
//! This module reads the common VOC layout of one XML file per image from a
//! flat annotations directory. Bounding boxes stay in pixel-space XYXY; the
//! feature extractor normalizes them later.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;
use walkdir::WalkDir;

use crate::bbox::{BBoxXYXY, Pixel};
use crate::error::ConvertError;

const VOC_XML_EXTENSION: &str = "xml";
const DEFAULT_POSE: &str = "Unspecified";

/// One parsed `<annotation>` document.
#[derive(Clone, Debug)]
pub struct VocAnnotation {
    /// Image file name as declared by `<filename>`.
    pub filename: String,
    /// Declared image width in pixels.
    pub width: u32,
    /// Declared image height in pixels.
    pub height: u32,
    /// Objects in document order.
    pub objects: Vec<VocObject>,
}

/// One `<object>` block within an annotation.
#[derive(Clone, Debug)]
pub struct VocObject {
    /// Class name as declared by `<name>`.
    pub name: String,
    /// Pixel-space bounding box from `<bndbox>`.
    pub bbox: BBoxXYXY<Pixel>,
    /// `<difficult>` flag; absent means false.
    pub difficult: bool,
    /// `<truncated>` flag; absent means false.
    pub truncated: bool,
    /// `<pose>` text; absent means "Unspecified".
    pub pose: String,
}

/// Read every annotation file in `dir` into parsed form.
///
/// The scan is flat (non-recursive) and considers only `.xml` files. The
/// returned map is keyed by XML file name, so iteration follows the sorted
/// file-name order regardless of directory enumeration order.
pub fn read_voc_dir(dir: &Path) -> Result<BTreeMap<String, VocAnnotation>, ConvertError> {
    let xml_files = collect_xml_files(dir)?;

    let mut annotations = BTreeMap::new();
    for xml_path in xml_files {
        let key = xml_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| xml_path.to_string_lossy().to_string());
        annotations.insert(key, parse_voc_xml(&xml_path)?);
    }

    Ok(annotations)
}

/// Parse VOC XML from a UTF-8 string.
///
/// This helper is primarily useful for testing/fuzzing parse behavior in-memory.
pub fn from_voc_xml_str(xml: &str) -> Result<VocAnnotation, ConvertError> {
    parse_voc_xml_str(xml, Path::new("<memory>"))
}

/// Parse VOC XML from bytes.
///
/// The input must be valid UTF-8.
pub fn from_voc_xml_slice(bytes: &[u8]) -> Result<VocAnnotation, ConvertError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| ConvertError::VocXmlParse {
        path: PathBuf::from("<memory>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    from_voc_xml_str(xml)
}

fn collect_xml_files(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir).map_err(ConvertError::Io)? {
        let entry = entry.map_err(ConvertError::Io)?;
        let path = entry.path();
        if path.is_file() && has_xml_extension(&path) {
            files.push(path);
        }
    }

    files.sort_by_cached_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| rel_string(dir, path))
    });

    let mut nested_xml = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).min_depth(2) {
        let entry = entry.map_err(|source| ConvertError::VocXmlParse {
            path: dir.to_path_buf(),
            message: format!("failed while traversing annotations directory: {source}"),
        })?;

        if entry.file_type().is_file() && has_xml_extension(entry.path()) {
            nested_xml.push(entry.path().to_path_buf());
        }
    }

    if !nested_xml.is_empty() {
        nested_xml.sort_by_cached_key(|path| rel_string(dir, path));
        let sample = rel_string(dir, &nested_xml[0]);
        eprintln!(
            "Warning: annotation scan is flat (non-recursive); skipping {} nested .xml file(s), e.g. {}",
            nested_xml.len(),
            sample
        );
    }

    Ok(files)
}

fn parse_voc_xml(path: &Path) -> Result<VocAnnotation, ConvertError> {
    let xml = fs::read_to_string(path).map_err(ConvertError::Io)?;
    parse_voc_xml_str(&xml, path)
}

fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<VocAnnotation, ConvertError> {
    let document = roxmltree::Document::parse(xml).map_err(|source| ConvertError::VocXmlParse {
        path: path.to_path_buf(),
        message: source.to_string(),
    })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(ConvertError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    let filename = required_child_text(annotation, "filename", path, "<annotation>")?;

    let size = required_child_element(annotation, "size", path, "<annotation>")?;
    let width = parse_required_u32(size, "width", path, "<size>")?;
    let height = parse_required_u32(size, "height", path, "<size>")?;

    let mut objects = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name = required_child_text(object, "name", path, "<object>")?;
        let bndbox = required_child_element(object, "bndbox", path, "<object>")?;

        let xmin = parse_required_f64(bndbox, "xmin", path, "<bndbox>")?;
        let ymin = parse_required_f64(bndbox, "ymin", path, "<bndbox>")?;
        let xmax = parse_required_f64(bndbox, "xmax", path, "<bndbox>")?;
        let ymax = parse_required_f64(bndbox, "ymax", path, "<bndbox>")?;

        let difficult = parse_flag(object, "difficult", path)?;
        let truncated = parse_flag(object, "truncated", path)?;
        let pose =
            optional_child_text(object, "pose").unwrap_or_else(|| DEFAULT_POSE.to_string());

        objects.push(VocObject {
            name,
            bbox: BBoxXYXY::<Pixel>::from_xyxy(xmin, ymin, xmax, ymax),
            difficult,
            truncated,
            pose,
        });
    }

    Ok(VocAnnotation {
        filename,
        width,
        height,
        objects,
    })
}

/// Parse an optional integer flag element such as `<difficult>`.
///
/// A missing element means false; any nonzero integer means true.
fn parse_flag(node: Node<'_, '_>, tag: &str, path: &Path) -> Result<bool, ConvertError> {
    match optional_child_text(node, tag) {
        None => Ok(false),
        Some(raw) => {
            let value = raw.parse::<i64>().map_err(|_| ConvertError::VocXmlParse {
                path: path.to_path_buf(),
                message: format!("invalid <{tag}> value '{raw}' in <object>; expected integer flag"),
            })?;
            Ok(value != 0)
        }
    }
}

fn required_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<Node<'a, 'input>, ConvertError> {
    child_element(node, tag).ok_or_else(|| ConvertError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

fn required_child_text(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<String, ConvertError> {
    optional_child_text(node, tag).ok_or_else(|| ConvertError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

fn parse_required_u32(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<u32, ConvertError> {
    let raw = required_child_text(node, tag, path, context)?;
    raw.parse::<u32>().map_err(|_| ConvertError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("invalid <{tag}> value '{raw}' in {context}; expected u32"),
    })
}

fn parse_required_f64(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<f64, ConvertError> {
    let raw = required_child_text(node, tag, path, context)?;
    raw.parse::<f64>().map_err(|_| ConvertError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!(
            "invalid <{tag}> value '{raw}' in {context}; expected floating-point number"
        ),
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(VOC_XML_EXTENSION))
        .unwrap_or(false)
}

fn rel_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
