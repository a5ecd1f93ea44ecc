//! Log record types.
//!
//! A `LogRecord` is the unit read from the log topic: the name of the target
//! index, the document (or documents) to store, and optional index mappings
//! used when the index has to be created.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a log record: one document or a list of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogBody {
    /// A single document.
    One(Map<String, Value>),
    /// Several documents bound for the same index.
    Many(Vec<Map<String, Value>>),
}

impl LogBody {
    /// Number of documents carried by this body.
    pub fn len(&self) -> usize {
        match self {
            LogBody::One(_) => 1,
            LogBody::Many(docs) => docs.len(),
        }
    }

    /// Whether this body carries no document at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the documents, flattening a list body.
    pub fn documents(&self) -> impl Iterator<Item = &Map<String, Value>> {
        let slice = match self {
            LogBody::One(doc) => std::slice::from_ref(doc),
            LogBody::Many(docs) => docs.as_slice(),
        };
        slice.iter()
    }
}

/// A structured log record read from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Target index for every document in `body`.
    pub index_name: String,
    /// The document or documents to store.
    pub body: LogBody,
    /// Index mappings to apply if the index does not exist yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Map<String, Value>>,
}

impl LogRecord {
    /// Create a record holding a single document.
    pub fn new(index_name: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            index_name: index_name.into(),
            body: LogBody::One(body),
            mappings: None,
        }
    }

    /// Attach index mappings to the record.
    pub fn with_mappings(mut self, mappings: Map<String, Value>) -> Self {
        self.mappings = Some(mappings);
        self
    }

    /// JSON view of the record, used as the `original` of a dead letter.
    ///
    /// Same shape as the serialized record: `mappings` is omitted when unset.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_body_yields_one_document() {
        let record = LogRecord::new("svc_logs", doc(json!({"msg": "ok"})));
        let docs: Vec<_> = record.body.documents().collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["msg"], "ok");
    }

    #[test]
    fn test_list_body_is_flattened() {
        let record = LogRecord {
            index_name: "svc_logs".to_string(),
            body: LogBody::Many(vec![doc(json!({"n": 1})), doc(json!({"n": 2}))]),
            mappings: None,
        };
        let ns: Vec<_> = record.body.documents().map(|d| d["n"].clone()).collect();
        assert_eq!(ns, vec![json!(1), json!(2)]);
        assert_eq!(record.body.len(), 2);
    }

    #[test]
    fn test_to_value_keeps_all_fields() {
        let record = LogRecord::new("svc_logs", doc(json!({"msg": "ok"})))
            .with_mappings(doc(json!({"properties": {"msg": {"type": "text"}}})));
        let value = record.to_value();
        assert_eq!(value["index_name"], "svc_logs");
        assert_eq!(value["body"]["msg"], "ok");
        assert_eq!(value["mappings"]["properties"]["msg"]["type"], "text");
    }

    #[test]
    fn test_to_value_omits_unset_mappings() {
        let record = LogRecord::new("svc_logs", Map::new());
        let value = record.to_value();
        assert_eq!(value, json!({"index_name": "svc_logs", "body": {}}));
        assert!(value.get("mappings").is_none());
    }

    #[test]
    fn test_to_value_matches_serialized_record() {
        let record = LogRecord {
            index_name: "svc_logs".to_string(),
            body: LogBody::Many(vec![doc(json!({"n": 1})), doc(json!({"n": 2}))]),
            mappings: Some(doc(json!({"properties": {}}))),
        };
        let value = record.to_value();
        assert_eq!(value, serde_json::to_value(&record).unwrap());
        assert_eq!(value["body"], json!([{"n": 1}, {"n": 2}]));
        let back: LogRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
