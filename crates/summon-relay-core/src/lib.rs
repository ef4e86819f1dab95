//! # summon-relay-core
//!
//! Core types for the summon result relay.
//!
//! This crate provides the pieces shared by the store, the processor and the MCP surface:
//! - Execution and creature identity
//! - Queued result records and payload normalization
//! - The result-type classifier
//! - Typed parsing of payloads into battle, creature and model results

pub mod classify;
pub mod error;
pub mod id;
pub mod parse;
pub mod record;

pub use classify::{SHAPE_RULES, ShapeRule, classify};
pub use error::{RelayError, Result, error_codes};
pub use id::{CreatureId, ExecutionId};
pub use parse::{
    AttackParticipant, AttackResult, BattleAction, BattleOutcome, CreatureProfile, ModelArtifact,
    ParsedBody, ParsedResult, parse_payload,
};
pub use record::{
    Payload, RAW_RESULT_KEY, RawResult, RecordMeta, RecordSummary, ResultRecord, ResultType,
    normalize_payload,
};
