//! Property-based tests for the cell codec.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Encoded values decode back to the same value
//! - Term lists survive encoding regardless of spacing
//! - Decoding arbitrary cells never panics
//! - Slug sanitization is idempotent

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use quarry::io::codec::{
    DecodeResult, FieldCodec, display_terms, encode_terms, encode_value, parse_bool, split_terms,
};
use quarry::models::{FieldKind, FieldValue, sanitize_slug};
use quarry::storage::InMemoryRecordStore;

fn decode(kind: FieldKind, cell: &str) -> DecodeResult {
    let store = InMemoryRecordStore::new();
    FieldCodec::new(&store).decode(kind, cell)
}

fn list_item() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9 .-]{0,10}[a-z0-9]"
}

fn term_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 &]{0,12}[A-Za-z0-9]"
}

const KINDS: &[FieldKind] = &[
    FieldKind::Text,
    FieldKind::Number,
    FieldKind::List,
    FieldKind::Relationship,
    FieldKind::Structured,
    FieldKind::Boolean,
    FieldKind::Date,
    FieldKind::DateTime,
];

proptest! {
    #[test]
    fn prop_list_round_trip(items in prop::collection::vec(list_item(), 1..8)) {
        let value = FieldValue::List(items);
        let cell = encode_value(&value);
        prop_assert_eq!(decode(FieldKind::List, &cell), DecodeResult::Value(value));
    }

    #[test]
    fn prop_ids_round_trip(ids in prop::collection::vec(1u64..1_000_000, 1..10)) {
        let value = FieldValue::Ids(ids);
        let cell = encode_value(&value);
        prop_assert_eq!(decode(FieldKind::Relationship, &cell), DecodeResult::Value(value));
    }

    #[test]
    fn prop_integral_number_round_trip(n in -1_000_000i64..1_000_000) {
        #[allow(clippy::cast_precision_loss)]
        let value = FieldValue::Number(n as f64);
        let cell = encode_value(&value);
        prop_assert_eq!(&cell, &n.to_string());
        prop_assert_eq!(decode(FieldKind::Number, &cell), DecodeResult::Value(value));
    }

    #[test]
    fn prop_bool_round_trip(b in any::<bool>()) {
        prop_assert_eq!(parse_bool(&encode_value(&FieldValue::Bool(b))), b);
    }

    #[test]
    fn prop_terms_round_trip(names in prop::collection::vec(term_name(), 0..6)) {
        let cell = encode_terms(&names);
        prop_assert_eq!(split_terms(&cell), names);
    }

    #[test]
    fn prop_term_spacing_is_irrelevant(names in prop::collection::vec(term_name(), 1..6)) {
        let spaced = names.join(" ,  ");
        prop_assert_eq!(display_terms(&split_terms(&spaced)), display_terms(&names));
    }

    #[test]
    fn prop_structured_round_trip(
        pairs in prop::collection::btree_map("[a-z]{1,6}", -1000i64..1000, 1..5)
    ) {
        let value = FieldValue::Structured(serde_json::json!(pairs));
        let cell = encode_value(&value);
        prop_assert_eq!(decode(FieldKind::Structured, &cell), DecodeResult::Value(value));
    }

    #[test]
    fn prop_decode_never_panics(cell in "\\PC{0,40}", index in 0usize..KINDS.len()) {
        let result = decode(KINDS[index], &cell);
        if cell.trim().is_empty() {
            prop_assert_eq!(result, DecodeResult::Unset);
        }
    }

    #[test]
    fn prop_slug_is_idempotent(s in "[ -~]{0,40}") {
        let once = sanitize_slug(&s);
        prop_assert_eq!(sanitize_slug(&once), once.clone());
        prop_assert!(!once.starts_with('-') && !once.ends_with('-'));
    }
}
