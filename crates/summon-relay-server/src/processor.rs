//! Result processing
//!
//! Turns queued payloads into typed results and, for creature and model
//! results, writes the files the rest of the game reads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use summon_relay_core::classify::CREATURE_FIELDS;
use summon_relay_core::{
    CreatureId, ExecutionId, ParsedResult, Payload, RelayError, Result, ResultType, parse_payload,
};
use summon_relay_store::{CreatureAssets, SummonStatus};
use tracing::{error, info};

pub const PROCESSED_STATUS: &str = "processed";

const STL_DATA_KEY: &str = "stl_data";
const BLENDER_SCRIPT_KEY: &str = "blender_script";

/// Outcome of registering a creature from a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatureRegistration {
    pub creature_id: CreatureId,
    pub execution_id: ExecutionId,
    pub status: String,
    pub creature_dir: PathBuf,
}

/// Files extracted from a model result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelExtraction {
    pub execution_id: ExecutionId,
    pub status: String,
    pub model_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stl_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_file: Option<PathBuf>,
}

/// Interprets payloads and persists creature and model side effects
#[derive(Debug, Clone)]
pub struct ResultProcessor {
    assets: CreatureAssets,
}

impl ResultProcessor {
    pub fn new(assets: CreatureAssets) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &CreatureAssets {
        &self.assets
    }

    /// Typed projection of a payload. Never fails.
    pub fn process(&self, payload: &Payload, result_type: &ResultType) -> ParsedResult {
        let parsed = parse_payload(payload, result_type);
        if parsed.is_raw_text() && matches!(result_type, ResultType::BattleResult) {
            info!("Battle result did not match a known shape, passing through as text");
        }
        parsed
    }

    /// Register a creature described by `data`.
    ///
    /// All of `name`, `hp`, `specialMove` and `description` must be present;
    /// otherwise nothing is written and the missing fields are reported.
    pub fn process_creature_result(
        &self,
        execution_id: &ExecutionId,
        data: &Payload,
    ) -> Result<CreatureRegistration> {
        let missing: Vec<String> = CREATURE_FIELDS
            .iter()
            .filter(|field| !data.contains_key(**field))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            error!(
                "Creature result {} missing fields: {}",
                execution_id,
                missing.join(", ")
            );
            return Err(RelayError::Validation { missing });
        }

        let creature_id = CreatureId::new();
        let status = SummonStatus::completed_from_mcp(creature_id.clone(), execution_id.clone());
        let creature_dir = self.assets.write_creature(&creature_id, data, &status)?;
        info!("Registered creature {} from result {}", creature_id, execution_id);

        Ok(CreatureRegistration {
            creature_id,
            execution_id: execution_id.clone(),
            status: PROCESSED_STATUS.into(),
            creature_dir,
        })
    }

    /// Write the model and script carried by a model result
    pub fn process_model_result(
        &self,
        execution_id: &ExecutionId,
        data: &Payload,
    ) -> Result<ModelExtraction> {
        let stl_data = data.get(STL_DATA_KEY).map(file_contents);
        let script = data.get(BLENDER_SCRIPT_KEY).map(file_contents);

        let files = self.assets.write_model_files(
            execution_id,
            stl_data.as_deref(),
            script.as_deref(),
        )?;

        Ok(ModelExtraction {
            execution_id: execution_id.clone(),
            status: PROCESSED_STATUS.into(),
            model_dir: files.model_dir,
            stl_file: files.stl_file,
            script_file: files.script_file,
        })
    }
}

/// Strings are written as-is, anything else as its JSON text
fn file_contents(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
