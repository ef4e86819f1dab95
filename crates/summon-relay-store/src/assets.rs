//! Creature and model asset storage
//!
//! Layout under the assets root:
//! - `<creature id>/status.json` creature profile
//! - `<creature id>/summon_status.json` registration status
//! - `<creature id>/model.stl` model written by the agent
//! - `models/<execution id>/` files extracted from model results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use summon_relay_core::{CreatureId, ExecutionId, Payload, RelayError, Result};
use tracing::{debug, info};

use crate::wait::{PollWindow, poll_until};

pub const PROFILE_FILE: &str = "status.json";
pub const SUMMON_STATUS_FILE: &str = "summon_status.json";
pub const MODEL_FILE: &str = "model.stl";
pub const MODEL_SCRIPT_FILE: &str = "generate_model.py";
const MODELS_DIR: &str = "models";

/// Marker for creatures registered from a queued MCP result
pub const MCP_RESULT_SOURCE: &str = "mcp_result";

/// Registration state written next to a creature profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonStatus {
    pub status: String,
    pub creature_id: CreatureId,
    pub execution_id: ExecutionId,
    pub created_at: DateTime<Utc>,
    pub source: String,
}

impl SummonStatus {
    /// Completed registration originating from an MCP result
    pub fn completed_from_mcp(creature_id: CreatureId, execution_id: ExecutionId) -> Self {
        Self {
            status: "completed".into(),
            creature_id,
            execution_id,
            created_at: Utc::now(),
            source: MCP_RESULT_SOURCE.into(),
        }
    }
}

/// Files written for one model result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFiles {
    pub model_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stl_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_file: Option<PathBuf>,
}

/// Flat-file storage for creatures and model artifacts
#[derive(Debug, Clone)]
pub struct CreatureAssets {
    root: PathBuf,
}

impl CreatureAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn creature_dir(&self, creature_id: &CreatureId) -> PathBuf {
        self.root.join(creature_id.as_str())
    }

    pub fn model_dir(&self, execution_id: &ExecutionId) -> PathBuf {
        self.root.join(MODELS_DIR).join(execution_id.as_str())
    }

    /// Write a creature's profile and registration status
    pub fn write_creature(
        &self,
        creature_id: &CreatureId,
        profile: &Payload,
        status: &SummonStatus,
    ) -> Result<PathBuf> {
        let dir = self.creature_dir(creature_id);
        create_dir(&dir)?;
        write_json(&dir.join(PROFILE_FILE), profile)?;
        write_json(&dir.join(SUMMON_STATUS_FILE), status)?;
        info!("Wrote creature {} to {}", creature_id, dir.display());
        Ok(dir)
    }

    pub fn load_profile(&self, creature_id: &CreatureId) -> Result<Option<Payload>> {
        read_json(&self.creature_dir(creature_id).join(PROFILE_FILE))
    }

    pub fn load_summon_status(&self, creature_id: &CreatureId) -> Result<Option<SummonStatus>> {
        read_json(&self.creature_dir(creature_id).join(SUMMON_STATUS_FILE))
    }

    /// Both the model and the profile have been written
    pub fn is_summon_complete(&self, creature_id: &CreatureId) -> bool {
        let dir = self.creature_dir(creature_id);
        dir.join(MODEL_FILE).is_file() && dir.join(PROFILE_FILE).is_file()
    }

    /// Wait within `window` for the agent to finish writing a creature.
    /// File checks run on the blocking pool.
    pub async fn wait_for_summon(
        &self,
        creature_id: &CreatureId,
        window: PollWindow,
    ) -> Result<()> {
        if !creature_id.is_safe_key() {
            return Err(RelayError::Storage(format!(
                "creature id {:?} cannot name a creature directory",
                creature_id.as_str()
            )));
        }

        let what = format!("creature {}", creature_id);
        poll_until(window, &what, || {
            let assets = self.clone();
            let creature_id = creature_id.clone();
            async move {
                let complete = tokio::task::spawn_blocking(move || {
                    let complete = assets.is_summon_complete(&creature_id);
                    if !complete {
                        debug!("Creature {} still generating", creature_id);
                    }
                    complete
                })
                .await
                .map_err(|e| RelayError::Storage(format!("blocking task failed: {}", e)))?;
                Ok(complete.then_some(()))
            }
        })
        .await
    }

    /// Write the model and generation script carried by a model result.
    /// The directory is created even when neither is present.
    pub fn write_model_files(
        &self,
        execution_id: &ExecutionId,
        stl_data: Option<&str>,
        blender_script: Option<&str>,
    ) -> Result<ModelFiles> {
        let model_dir = self.model_dir(execution_id);
        create_dir(&model_dir)?;

        let stl_file = stl_data
            .map(|data| write_text(&model_dir.join(MODEL_FILE), data))
            .transpose()?;
        let script_file = blender_script
            .map(|script| write_text(&model_dir.join(MODEL_SCRIPT_FILE), script))
            .transpose()?;

        info!("Wrote model artifacts to {}", model_dir.display());
        Ok(ModelFiles {
            model_dir,
            stl_file,
            script_file,
        })
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| RelayError::storage(format!("create {}", dir.display()), e))
}

fn write_text(path: &Path, contents: &str) -> Result<PathBuf> {
    fs::write(path, contents)
        .map_err(|e| RelayError::storage(format!("write {}", path.display()), e))?;
    Ok(path.to_path_buf())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes).map_err(|e| RelayError::storage(format!("write {}", path.display()), e))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RelayError::storage(format!("read {}", path.display()), e)),
    }
}
