//! Ordering and deduplication properties of the dictionary

use enumstore_core::{EntryRef, EnumValue, StoreConfig};
use enumstore_datastore::DataStore;
use enumstore_dictionary::{DictionaryKind, EnumDictionary};
use proptest::prelude::*;
use std::cmp::Ordering;

fn new_pair<T: EnumValue>() -> (DataStore<T>, EnumDictionary<T>) {
    (
        DataStore::new(StoreConfig::default()),
        EnumDictionary::new(DictionaryKind::Unique),
    )
}

proptest! {
    #[test]
    fn prop_iteration_strictly_ascending(values in prop::collection::vec(any::<i32>(), 0..300)) {
        let (mut store, mut dict) = new_pair::<i32>();
        for v in &values {
            dict.add(&mut store, v).unwrap();
        }
        let sorted: Vec<i32> = dict.iter().map(|(v, _)| *v).collect();
        for pair in sorted.windows(2) {
            prop_assert_eq!(pair[0].cmp_primary(&pair[1]), Ordering::Less);
        }
        let mut expected = values.clone();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(sorted, expected);
    }

    #[test]
    fn prop_equal_values_share_ref(values in prop::collection::vec("[a-cA-C]{0,3}", 1..100)) {
        let (mut store, mut dict) = new_pair::<String>();
        let refs: Vec<EntryRef> = values
            .iter()
            .map(|v| dict.add(&mut store, v).unwrap().entry_ref)
            .collect();
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                prop_assert_eq!(a == b, refs[i] == refs[j]);
            }
            prop_assert_eq!(store.get(refs[i]), a);
        }
    }

    #[test]
    fn prop_folded_match_is_exact_class(values in prop::collection::vec("[a-bA-B]{1,2}", 1..50), probe in "[a-bA-B]{1,2}") {
        let (mut store, mut dict) = new_pair::<String>();
        for v in &values {
            dict.add(&mut store, v).unwrap();
        }
        let matched: Vec<&String> = dict
            .find_matching_folded(&probe)
            .iter()
            .map(|r| store.get(*r))
            .collect();
        let mut expected: Vec<&String> = dict
            .iter()
            .map(|(v, _)| v)
            .filter(|v| v.cmp_folded(&probe) == Ordering::Equal)
            .collect();
        expected.dedup();
        prop_assert_eq!(matched, expected);
    }
}
