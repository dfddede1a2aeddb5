//! Submission envelopes and per-topic results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::TypesError;

/// A transaction container tagged with the topics it should be admitted to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedTransaction {
    /// Self-contained transaction container (BEEF, or a bare raw transaction).
    pub beef: Vec<u8>,
    pub topics: Vec<String>,
}

impl TaggedTransaction {
    pub fn new(beef: Vec<u8>, topics: Vec<String>) -> Self {
        Self { beef, topics }
    }

    /// Reject envelopes that cannot be processed at all.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.topics.is_empty() {
            return Err(TypesError::EmptyTopics);
        }
        if self.beef.is_empty() {
            return Err(TypesError::EmptyTransaction);
        }
        Ok(())
    }
}

/// What a topic manager decided for one transaction.
///
/// `outputs_to_admit` are output indices of the submitted transaction.
/// `coins_to_retain` are *input* indices whose previous coins stay tracked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmittanceInstructions {
    pub outputs_to_admit: Vec<u32>,
    pub coins_to_retain: Vec<u32>,
}

impl AdmittanceInstructions {
    pub fn is_empty(&self) -> bool {
        self.outputs_to_admit.is_empty() && self.coins_to_retain.is_empty()
    }
}

/// Per-topic outcome of a submission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSteak {
    pub outputs_to_admit: Vec<u32>,
    pub coins_to_retain: Vec<u32>,
    /// Input indices whose previous coins were dropped from the topic.
    #[serde(default)]
    pub coins_removed: Vec<u32>,
}

impl From<AdmittanceInstructions> for TopicSteak {
    fn from(a: AdmittanceInstructions) -> Self {
        Self {
            outputs_to_admit: a.outputs_to_admit,
            coins_to_retain: a.coins_to_retain,
            coins_removed: Vec::new(),
        }
    }
}

/// Submitted Transaction Execution AcKnowledgment: one entry per topic.
pub type Steak = BTreeMap<String, TopicSteak>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_topics_rejected() {
        let tagged = TaggedTransaction::new(vec![1, 2, 3], vec![]);
        assert!(matches!(tagged.validate(), Err(TypesError::EmptyTopics)));
    }

    #[test]
    fn empty_container_rejected() {
        let tagged = TaggedTransaction::new(vec![], vec!["tm_kvstore".into()]);
        assert!(matches!(tagged.validate(), Err(TypesError::EmptyTransaction)));
    }

    #[test]
    fn steak_entry_from_instructions() {
        let steak: TopicSteak = AdmittanceInstructions {
            outputs_to_admit: vec![0, 2],
            coins_to_retain: vec![1],
        }
        .into();
        assert_eq!(steak.outputs_to_admit, vec![0, 2]);
        assert!(steak.coins_removed.is_empty());
    }
}
