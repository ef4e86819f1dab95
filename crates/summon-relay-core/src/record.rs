//! Queued result records and payload normalization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::id::ExecutionId;

/// A producer's raw result after JSON decoding
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Key under which undecodable submissions are preserved
pub const RAW_RESULT_KEY: &str = "rawResult";

/// Result as handed over by a producer
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// JSON-encoded text (or arbitrary text from a confused agent)
    Text(String),
    /// Already-decoded JSON
    Structured(serde_json::Value),
}

impl From<&str> for RawResult {
    fn from(s: &str) -> Self {
        RawResult::Text(s.to_string())
    }
}

impl From<String> for RawResult {
    fn from(s: String) -> Self {
        RawResult::Text(s)
    }
}

impl From<serde_json::Value> for RawResult {
    fn from(v: serde_json::Value) -> Self {
        RawResult::Structured(v)
    }
}

impl From<Payload> for RawResult {
    fn from(m: Payload) -> Self {
        RawResult::Structured(serde_json::Value::Object(m))
    }
}

/// Turn a raw submission into a payload mapping.
///
/// Never fails: text that is not a JSON object is kept verbatim under
/// [`RAW_RESULT_KEY`].
pub fn normalize_payload(raw: RawResult) -> Payload {
    match raw {
        RawResult::Text(text) => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => wrap_raw(text),
        },
        RawResult::Structured(serde_json::Value::Object(map)) => map,
        RawResult::Structured(serde_json::Value::String(text)) => {
            normalize_payload(RawResult::Text(text))
        }
        RawResult::Structured(other) => wrap_raw(other.to_string()),
    }
}

fn wrap_raw(text: String) -> Payload {
    let mut map = Payload::new();
    map.insert(RAW_RESULT_KEY.to_string(), serde_json::Value::String(text));
    map
}

/// Semantic category of a queued result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultType {
    FinishComment,
    CreatureData,
    Attack,
    ModelGeneration,
    BlenderScript,
    GeneralJson,
    BattleResult,
    /// Tag supplied by the producer that is not one of the known categories
    Custom(String),
}

impl ResultType {
    pub fn as_str(&self) -> &str {
        match self {
            ResultType::FinishComment => "finish_comment",
            ResultType::CreatureData => "creature_data",
            ResultType::Attack => "attack",
            ResultType::ModelGeneration => "model_generation",
            ResultType::BlenderScript => "blender_script",
            ResultType::GeneralJson => "general_json",
            ResultType::BattleResult => "battle_result",
            ResultType::Custom(tag) => tag,
        }
    }
}

impl From<&str> for ResultType {
    fn from(tag: &str) -> Self {
        match tag {
            "finish_comment" => ResultType::FinishComment,
            "creature_data" => ResultType::CreatureData,
            "attack" => ResultType::Attack,
            "model_generation" => ResultType::ModelGeneration,
            "blender_script" => ResultType::BlenderScript,
            "general_json" => ResultType::GeneralJson,
            "battle_result" => ResultType::BattleResult,
            other => ResultType::Custom(other.to_string()),
        }
    }
}

impl From<String> for ResultType {
    fn from(tag: String) -> Self {
        ResultType::from(tag.as_str())
    }
}

impl From<ResultType> for String {
    fn from(t: ResultType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The queue's sole entity, stored as one JSON file per record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub execution_id: ExecutionId,
    pub timestamp: DateTime<Utc>,
    pub result_type: ResultType,
    pub data: Payload,
}

/// Metadata returned after a record has been saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub execution_id: ExecutionId,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub result_type: ResultType,
}

/// Non-consuming view of a stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub execution_id: ExecutionId,
    pub timestamp: DateTime<Utc>,
    pub result_type: ResultType,
    pub path: PathBuf,
}
