use proptest::prelude::*;

use voc2tfrecord::tfrecord::{proto, read_tfrecord_slice, to_tfrecord_bytes};

mod proptest_helpers;

fn int64_list(example: &proto::Example, key: &str) -> Vec<i64> {
    match example
        .features
        .as_ref()
        .and_then(|features| features.feature.get(key))
        .and_then(|feature| feature.kind.as_ref())
    {
        Some(proto::feature::Kind::Int64List(list)) => list.value.clone(),
        other => panic!("feature '{key}' is not an int64 list: {other:?}"),
    }
}

fn first_bytes(example: &proto::Example, key: &str) -> Vec<u8> {
    match example
        .features
        .as_ref()
        .and_then(|features| features.feature.get(key))
        .and_then(|feature| feature.kind.as_ref())
    {
        Some(proto::feature::Kind::BytesList(list)) => {
            list.value.first().cloned().expect("non-empty bytes list")
        }
        other => panic!("feature '{key}' is not a bytes list: {other:?}"),
    }
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn framing_roundtrip_preserves_examples(examples in proptest_helpers::arb_examples(6)) {
        let bytes = to_tfrecord_bytes(&examples);
        let decoded = read_tfrecord_slice(&bytes).expect("read back what was written");

        prop_assert_eq!(decoded.len(), examples.len());
        for (example, record) in examples.iter().zip(&decoded) {
            prop_assert_eq!(first_bytes(record, "image/filename"), example.filename.as_bytes());
            prop_assert_eq!(first_bytes(record, "image/encoded"), example.encoded.clone());
            prop_assert_eq!(int64_list(record, "image/object/class/label"), example.class_ids.clone());
            prop_assert_eq!(int64_list(record, "image/object/truncated"), example.truncated.clone());
            prop_assert_eq!(int64_list(record, "image/object/difficult"), example.difficult.clone());
        }
    }

    #[test]
    fn serialization_is_deterministic(example in proptest_helpers::arb_image_example()) {
        let first = to_tfrecord_bytes(std::slice::from_ref(&example));
        let second = to_tfrecord_bytes(std::slice::from_ref(&example));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn any_corrupted_byte_is_detected(
        examples in proptest::collection::vec(proptest_helpers::arb_image_example(), 1..=3),
        position in any::<prop::sample::Index>(),
    ) {
        let mut bytes = to_tfrecord_bytes(&examples);
        prop_assert!(!bytes.is_empty());

        let target = position.index(bytes.len());
        bytes[target] ^= 0xff;

        prop_assert!(read_tfrecord_slice(&bytes).is_err());
    }
}
