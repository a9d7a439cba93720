//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use jsondb_core::{DocumentId, Number, Object, Value};
use proptest::prelude::*;

/// Strategy for generating document identifiers.
pub fn identifier_strategy() -> impl Strategy<Value = DocumentId> {
    prop_oneof![
        any::<i64>().prop_map(DocumentId::Integer),
        "[a-z0-9-]{1,12}".prop_map(DocumentId::Text),
    ]
}

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for generating object keys. Keys never contain the path
/// separator and are never purely numeric.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,7}").expect("Invalid regex")
}

/// Strategy for generating leaf values. Floats are always finite.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(Number::Integer(n))),
        (-1.0e9..1.0e9f64).prop_map(|f| Value::Number(Number::Float(f))),
        "[a-zA-Z0-9 %_]{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for generating arbitrary trees up to a few levels deep,
/// including empty containers.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((key_strategy(), inner), 0..6)
                .prop_map(|members| Value::Object(members.into_iter().collect::<Object>())),
        ]
    })
}

/// Strategy for generating documents: objects whose members are arbitrary
/// trees.
pub fn document_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec((key_strategy(), value_strategy()), 0..8)
        .prop_map(|members| Value::Object(members.into_iter().collect::<Object>()))
}

/// Strategy for generating flat documents with an integer `score` and a
/// string `name`, for query tests that need a known shape.
pub fn scored_document_strategy() -> impl Strategy<Value = Value> {
    (-50i64..50, "[a-e]{1,3}", any::<bool>()).prop_map(|(score, name, active)| {
        let mut document = Value::object();
        document.insert("score", score);
        document.insert("name", name);
        document.insert("active", active);
        document
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
