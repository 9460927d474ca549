//! Batch fetch result items

use citenet_common::errors::Result;
use citenet_common::records::Record;
use serde::{Deserialize, Serialize};

/// Lifecycle state of one identifier in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Pending,
    Success,
    Failed,
}

/// Resolution state of one identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchItem {
    pub identifier: String,

    /// Number of resolution attempts made so far
    pub attempts: u32,

    pub status: FetchStatus,

    /// Parsed response body; only ever set on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl FetchItem {
    /// A freshly submitted identifier
    pub fn pending(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            attempts: 0,
            status: FetchStatus::Pending,
            payload: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == FetchStatus::Failed
    }

    pub(crate) fn succeed(&mut self, payload: serde_json::Value) {
        self.status = FetchStatus::Success;
        self.payload = Some(payload);
    }

    pub(crate) fn fail(&mut self) {
        self.status = FetchStatus::Failed;
        self.payload = None;
    }

    /// Interpret the payload as a citation database record
    ///
    /// `Ok(None)` when the item carries no payload.
    pub fn record(&self) -> Result<Option<Record>> {
        match &self.payload {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle() {
        let mut item = FetchItem::pending("10.1371/journal.pone.0000001");
        assert_eq!(item.status, FetchStatus::Pending);
        assert_eq!(item.attempts, 0);

        item.succeed(json!({"uri": "p1"}));
        assert!(item.is_success());

        item.fail();
        assert!(item.is_failed());
        assert!(item.payload.is_none());
    }

    #[test]
    fn test_record_from_payload() {
        let mut item = FetchItem::pending("x");
        assert!(item.record().unwrap().is_none());

        item.succeed(json!({"uri": "p1", "references": []}));
        let record = item.record().unwrap().unwrap();
        assert_eq!(record.uri, "p1");

        item.succeed(json!([1, 2, 3]));
        assert!(item.record().is_err());
    }
}
