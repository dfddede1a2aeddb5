//! Lookup questions and answers.

use serde::{Deserialize, Serialize};

use crate::OutputRef;

/// A structured query routed to one lookup service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LookupQuestion {
    /// Name of the lookup service (e.g. `ls_kvstore`).
    pub service: String,
    /// Protocol-specific query. Absent and `null` are treated alike.
    #[serde(default)]
    pub query: serde_json::Value,
}

impl LookupQuestion {
    pub fn new(service: impl Into<String>, query: serde_json::Value) -> Self {
        Self {
            service: service.into(),
            query,
        }
    }

    /// The query value, or `None` when the caller supplied nothing.
    pub fn query(&self) -> Option<&serde_json::Value> {
        match &self.query {
            serde_json::Value::Null => None,
            other => Some(other),
        }
    }
}

/// One hydrated output in an `output-list` answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputListItem {
    /// Container holding the transaction that created the output.
    pub beef: Vec<u8>,
    pub output_index: u32,
}

/// The answer returned to lookup callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LookupAnswer {
    OutputList { outputs: Vec<OutputListItem> },
    Freeform { result: serde_json::Value },
}

impl LookupAnswer {
    pub fn empty() -> Self {
        Self::OutputList {
            outputs: Vec::new(),
        }
    }
}

/// Outputs a lookup service selected; the engine resolves them into an
/// [`LookupAnswer::OutputList`].
pub type LookupFormula = Vec<OutputRef>;

/// What a lookup service produces: a final answer or a formula that still
/// needs hydration from the coin store.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupResult {
    Answer(LookupAnswer),
    Formula(LookupFormula),
}
