use proptest::prelude::*;

use voc2tfrecord::label_map::{
    from_pbtxt_str, read_label_map, to_pbtxt_string, write_label_map, LabelMap,
};

mod proptest_helpers;

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn built_maps_are_valid_with_contiguous_ids(names in proptest_helpers::arb_class_names(12)) {
        let count = names.len();
        let map = LabelMap::from_names(names.iter().cloned());

        prop_assert!(map.validate().is_ok());
        prop_assert_eq!(map.len(), count);

        // BTreeSet iteration order is sorted, so ids follow sorted names.
        for (idx, name) in names.iter().enumerate() {
            prop_assert_eq!(map.id_for(name), Some((idx + 1) as i64));
            prop_assert_eq!(map.name_for((idx + 1) as i64), Some(name.as_str()));
        }
    }

    #[test]
    fn pbtxt_roundtrip_preserves_entries(map in proptest_helpers::arb_label_map(12)) {
        let text = to_pbtxt_string(&map);
        let parsed = from_pbtxt_str(&text).expect("rendered pbtxt parses");

        prop_assert_eq!(parsed.entries(), map.entries());
    }

    #[test]
    fn written_file_reads_back_identical(map in proptest_helpers::arb_label_map(8)) {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("label_map.pbtxt");

        write_label_map(&path, &map).expect("write label map");
        let restored = read_label_map(&path).expect("read label map");

        prop_assert_eq!(restored.entries(), map.entries());
    }
}
