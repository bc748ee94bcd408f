//! Property-based test generators using proptest.
//!
//! Names are drawn from small alphabets on purpose: collisions between
//! generated pages are what exercise overwrite and backlink churn.

use proptest::prelude::*;
use wikidb_codec::Value;

/// Strategy for page names from a small pool (`P0`..`P7`).
pub fn page_name_strategy() -> impl Strategy<Value = String> {
    (0u8..8).prop_map(|i| format!("P{i}"))
}

/// Strategy for space names from a small pool.
pub fn space_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("Main".to_string()), Just("Sandbox".to_string())]
}

/// Strategy for plain text without link brackets.
pub fn plain_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 .,]{0,40}").expect("Invalid regex")
}

/// Strategy for page content linking to the given number of `Main` pages.
///
/// Returns the content and the linked names in content order, duplicates
/// included.
pub fn linked_content_strategy(max_links: usize) -> impl Strategy<Value = (String, Vec<String>)> {
    prop::collection::vec((plain_text_strategy(), page_name_strategy(), any::<bool>()), 0..=max_links)
        .prop_map(|parts| {
            let mut content = String::new();
            let mut targets = Vec::new();
            for (text, target, legacy) in parts {
                content.push_str(&text);
                if legacy {
                    content.push_str(&format!("[Main.{target}]"));
                } else {
                    content.push_str(&format!("[[label>>Main.{target}]]"));
                }
                targets.push(target);
            }
            (content, targets)
        })
}

/// Strategy for scalar property values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[a-z]{0,12}".prop_map(Value::Text),
    ]
}

/// One step of a link churn sequence.
#[derive(Debug, Clone)]
pub enum ChurnOperation {
    /// Save `Main.<page>` with links to `Main.<target>`.
    Save {
        /// Saved page.
        page: String,
        /// Linked pages.
        targets: Vec<String>,
    },
    /// Delete `Main.<page>`.
    Delete {
        /// Deleted page.
        page: String,
    },
}

/// Strategy for a single churn operation.
pub fn churn_operation_strategy() -> impl Strategy<Value = ChurnOperation> {
    prop_oneof![
        3 => (page_name_strategy(), prop::collection::vec(page_name_strategy(), 0..4))
            .prop_map(|(page, targets)| ChurnOperation::Save { page, targets }),
        1 => page_name_strategy().prop_map(|page| ChurnOperation::Delete { page }),
    ]
}

/// Strategy for a sequence of churn operations.
pub fn churn_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<ChurnOperation>> {
    prop::collection::vec(churn_operation_strategy(), min_ops..max_ops)
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
