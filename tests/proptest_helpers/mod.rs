#![allow(dead_code)]

use std::collections::BTreeSet;

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use sha2::{Digest, Sha256};

use voc2tfrecord::bbox::{BBoxXYXY, Pixel};
use voc2tfrecord::example::{ImageExample, IMAGE_FORMAT};
use voc2tfrecord::label_map::{LabelMap, LabelMapEntry};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn class_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z]{1,12}")
        .expect("valid class name regex")
        .boxed()
}

/// Wider charset that still survives pbtxt quoting.
pub fn pbtxt_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-zA-Z0-9 _.-]{1,16}")
        .expect("valid pbtxt name regex")
        .boxed()
}

pub fn image_file_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z0-9_]{1,12}\\.jpg")
        .expect("valid filename regex")
        .boxed()
}

pub fn arb_class_names(max: usize) -> BoxedStrategy<BTreeSet<String>> {
    proptest::collection::btree_set(class_name_strategy(), 1..=max).boxed()
}

/// A structurally valid label map: unique names, unique ids, ids >= 1.
pub fn arb_label_map(max_entries: usize) -> BoxedStrategy<LabelMap> {
    proptest::collection::btree_map(pbtxt_name_strategy(), 1i64..=9999, 1..=max_entries)
        .prop_map(|named_ids| {
            let mut seen_ids = BTreeSet::new();
            let entries: Vec<LabelMapEntry> = named_ids
                .into_iter()
                .filter(|(_, id)| seen_ids.insert(*id))
                .map(|(name, id)| LabelMapEntry { name, id })
                .collect();
            LabelMap::from_entries(entries)
        })
        .boxed()
}

pub fn arb_pixel_bbox_within(width: u32, height: u32) -> BoxedStrategy<BBoxXYXY<Pixel>> {
    prop::num::u32::ANY
        .prop_map(move |seed| {
            pixel_bbox_from_seed(
                width,
                height,
                seed,
                seed.rotate_left(3),
                seed.rotate_left(7),
                seed.rotate_left(11),
            )
        })
        .boxed()
}

pub fn arb_image_example() -> BoxedStrategy<ImageExample> {
    (
        image_file_name_strategy(),
        1u32..=512,
        1u32..=512,
        proptest::collection::vec(any::<u8>(), 0..64),
        0usize..=6,
    )
        .prop_flat_map(|(filename, width, height, encoded, object_count)| {
            (
                Just(filename),
                Just(width),
                Just(height),
                Just(encoded),
                proptest::collection::vec(arb_object_fields(), object_count..=object_count),
            )
        })
        .prop_map(|(filename, width, height, encoded, objects)| {
            let key_sha256 = hex::encode(Sha256::digest(&encoded));
            let mut example = ImageExample {
                filename,
                width,
                height,
                key_sha256,
                encoded,
                format: IMAGE_FORMAT,
                xmins: Vec::new(),
                ymins: Vec::new(),
                xmaxs: Vec::new(),
                ymaxs: Vec::new(),
                class_names: Vec::new(),
                class_ids: Vec::new(),
                truncated: Vec::new(),
                poses: Vec::new(),
                difficult: Vec::new(),
            };
            for (name, id, sx, sy, sw, sh, truncated, difficult, pose) in objects {
                let (xmin, ymin, xmax, ymax) = normalized_bbox_from_seed(sx, sy, sw, sh);
                example.xmins.push(xmin);
                example.ymins.push(ymin);
                example.xmaxs.push(xmax);
                example.ymaxs.push(ymax);
                example.class_names.push(name);
                example.class_ids.push(id);
                example.truncated.push(i64::from(truncated));
                example.poses.push(pose);
                example.difficult.push(i64::from(difficult));
            }
            example
        })
        .boxed()
}

pub fn arb_examples(max: usize) -> BoxedStrategy<Vec<ImageExample>> {
    proptest::collection::vec(arb_image_example(), 0..=max).boxed()
}

type ObjectFields = (String, i64, u32, u32, u32, u32, bool, bool, String);

fn arb_object_fields() -> impl Strategy<Value = ObjectFields> {
    (
        class_name_strategy(),
        1i64..=100,
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
        any::<bool>(),
        any::<bool>(),
        proptest::string::string_regex("[A-Za-z]{1,8}").expect("valid pose regex"),
    )
}

fn pixel_bbox_from_seed(
    width: u32,
    height: u32,
    sx: u32,
    sy: u32,
    sw: u32,
    sh: u32,
) -> BBoxXYXY<Pixel> {
    let xmin = sx % (width - 1);
    let ymin = sy % (height - 1);
    let xmax = xmin + 1 + (sw % (width - xmin));
    let ymax = ymin + 1 + (sh % (height - ymin));

    BBoxXYXY::from_xyxy(xmin as f64, ymin as f64, xmax as f64, ymax as f64)
}

fn normalized_bbox_from_seed(sx: u32, sy: u32, sw: u32, sh: u32) -> (f32, f32, f32, f32) {
    let xmin = (sx % 1000) as f32 / 1000.0;
    let ymin = (sy % 1000) as f32 / 1000.0;
    let xmax = xmin + (1.0 - xmin) * ((sw % 1000) as f32 / 1000.0);
    let ymax = ymin + (1.0 - ymin) * ((sh % 1000) as f32 / 1000.0);
    (xmin, ymin, xmax, ymax)
}
