//! Typed projections of result payloads
//!
//! Parsing is total. Unknown tags, unrecognized shapes and fields of the
//! wrong type all end up as [`ParsedBody::RawText`] carrying the submitted
//! payload, never as an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::{Payload, ResultType};

/// Comment used when a battle result does not narrate itself
pub const DEFAULT_BATTLE_COMMENT: &str = "An attack occurs!";
pub const DEFAULT_CREATURE_NAME: &str = "Unknown creature";
pub const DEFAULT_CREATURE_HP: i64 = 100;
pub const DEFAULT_SPECIAL_MOVE: &str = "Basic attack";

/// Tag reported for parsed creature payloads
pub const CREATURE_GENERATION_TAG: &str = "creature_generation";

/// A single battle action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleAction {
    /// attack, defend or special
    pub action_type: String,
    #[serde(default, deserialize_with = "whole::int")]
    pub damage: i64,
    #[serde(default, deserialize_with = "whole::int")]
    pub heal: i64,
    pub comment: String,
    #[serde(default)]
    pub critical: bool,
}

/// Outcome of one battle exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleOutcome {
    #[serde(default)]
    pub attacker_actions: Vec<BattleAction>,
    #[serde(default)]
    pub defender_actions: Vec<BattleAction>,
    /// Creature identifier -> value reported by the producer
    #[serde(default, deserialize_with = "whole::int_map")]
    pub hp_changes: BTreeMap<String, i64>,
    #[serde(default)]
    pub status_effects: BTreeMap<String, Vec<String>>,
    pub comment: String,
    pub turn_end: bool,
    pub battle_end: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
}

/// A creature described by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatureProfile {
    #[serde(default = "default_creature_name")]
    pub name: String,
    /// Expected in 1..=1000; not enforced here
    #[serde(default = "default_creature_hp")]
    pub hp: i64,
    #[serde(default = "default_special_move", alias = "special_move")]
    pub special_move: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    /// Line the creature says when it wins
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "finish_line")]
    pub finish_line: Option<String>,
}

fn default_creature_name() -> String {
    DEFAULT_CREATURE_NAME.to_string()
}

fn default_creature_hp() -> i64 {
    DEFAULT_CREATURE_HP
}

fn default_special_move() -> String {
    DEFAULT_SPECIAL_MOVE.to_string()
}

/// A generated 3D model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelArtifact {
    #[serde(default, alias = "model_path")]
    pub model_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "blender_script")]
    pub blender_script: Option<String>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "generation_time")]
    pub generation_time: Option<f64>,
    #[serde(default, alias = "model_info")]
    pub model_info: Payload,
}

/// Exactly one typed projection of a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParsedBody {
    BattleResult(BattleOutcome),
    CreatureGeneration(CreatureProfile),
    ModelGeneration(ModelArtifact),
    /// The payload serialized as JSON text
    RawText(String),
}

/// Normalized envelope handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResult {
    pub result_type: String,
    #[serde(flatten)]
    pub body: ParsedBody,
}

impl ParsedResult {
    fn new(result_type: impl Into<String>, body: ParsedBody) -> Self {
        Self {
            result_type: result_type.into(),
            body,
        }
    }

    pub fn raw_text(result_type: impl Into<String>, payload: &Payload) -> Self {
        Self::new(result_type, ParsedBody::RawText(payload_text(payload)))
    }

    pub fn is_raw_text(&self) -> bool {
        matches!(self.body, ParsedBody::RawText(_))
    }
}

fn payload_text(payload: &Payload) -> String {
    serde_json::Value::Object(payload.clone()).to_string()
}

/// Parse a payload according to its result type
pub fn parse_payload(payload: &Payload, result_type: &ResultType) -> ParsedResult {
    match result_type {
        ResultType::BattleResult => parse_battle(payload),
        ResultType::CreatureData => {
            match serde_json::from_value::<CreatureProfile>(object(payload)) {
                Ok(profile) => ParsedResult::new(
                    CREATURE_GENERATION_TAG,
                    ParsedBody::CreatureGeneration(profile),
                ),
                Err(_) => ParsedResult::raw_text(CREATURE_GENERATION_TAG, payload),
            }
        }
        ResultType::ModelGeneration => {
            match serde_json::from_value::<ModelArtifact>(object(payload)) {
                Ok(model) => {
                    ParsedResult::new(result_type.as_str(), ParsedBody::ModelGeneration(model))
                }
                Err(_) => ParsedResult::raw_text(result_type.as_str(), payload),
            }
        }
        other => ParsedResult::raw_text(other.as_str(), payload),
    }
}

fn object(payload: &Payload) -> serde_json::Value {
    serde_json::Value::Object(payload.clone())
}

/// Integer fields that also accept whole numbers written as floats (`80.0`)
mod whole {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;
    use std::collections::BTreeMap;

    fn to_i64<E: Error>(n: Number) -> Result<i64, E> {
        if let Some(i) = n.as_i64() {
            return Ok(i);
        }
        match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Ok(f as i64)
            }
            _ => Err(E::custom(format!("expected a whole number, got {}", n))),
        }
    }

    fn to_i64_map<E: Error>(map: BTreeMap<String, Number>) -> Result<BTreeMap<String, i64>, E> {
        map.into_iter()
            .map(|(key, n)| to_i64(n).map(|v| (key, v)))
            .collect()
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        to_i64(Number::deserialize(d)?)
    }

    pub fn int_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, i64>, D::Error> {
        to_i64_map(BTreeMap::<String, Number>::deserialize(d)?)
    }

    pub fn opt_int_map<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<BTreeMap<String, i64>>, D::Error> {
        Option::<BTreeMap<String, Number>>::deserialize(d)?
            .map(to_i64_map)
            .transpose()
    }
}

/// `{damage, comment, ...}` as sent for a single attack
#[derive(Deserialize)]
struct DirectAction {
    #[serde(deserialize_with = "whole::int")]
    damage: i64,
    comment: Option<String>,
    #[serde(default)]
    critical: bool,
    #[serde(default, alias = "hpChanges", deserialize_with = "whole::opt_int_map")]
    hp_changes: Option<BTreeMap<String, i64>>,
    #[serde(flatten)]
    flags: TurnFlags,
}

/// `{hp_changes, ...}` as sent to adjust hit points directly
#[derive(Deserialize)]
struct HpChangeRecord {
    #[serde(alias = "hpChanges", deserialize_with = "whole::int_map")]
    hp_changes: BTreeMap<String, i64>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(flatten)]
    flags: TurnFlags,
}

#[derive(Deserialize)]
struct TurnFlags {
    #[serde(default = "default_true", alias = "turnEnd")]
    turn_end: bool,
    #[serde(default, alias = "battleEnd")]
    battle_end: bool,
    #[serde(default)]
    winner: Option<String>,
}

fn default_true() -> bool {
    true
}

fn parse_battle(payload: &Payload) -> ParsedResult {
    let tag = ResultType::BattleResult;
    let has = |key: &str| payload.contains_key(key);

    let outcome = if has("damage") && has("comment") {
        serde_json::from_value::<DirectAction>(object(payload)).map(|direct| {
            let comment = direct
                .comment
                .unwrap_or_else(|| DEFAULT_BATTLE_COMMENT.to_string());
            BattleOutcome {
                attacker_actions: vec![BattleAction {
                    action_type: "attack".into(),
                    damage: direct.damage,
                    heal: 0,
                    comment: comment.clone(),
                    critical: direct.critical,
                }],
                defender_actions: vec![],
                hp_changes: direct.hp_changes.unwrap_or_default(),
                status_effects: BTreeMap::new(),
                comment,
                turn_end: direct.flags.turn_end,
                battle_end: direct.flags.battle_end,
                winner: direct.flags.winner,
            }
        })
    } else if has("hp_changes") || has("hpChanges") {
        serde_json::from_value::<HpChangeRecord>(object(payload)).map(|record| BattleOutcome {
            attacker_actions: vec![],
            defender_actions: vec![],
            hp_changes: record.hp_changes,
            status_effects: BTreeMap::new(),
            comment: record
                .comment
                .unwrap_or_else(|| DEFAULT_BATTLE_COMMENT.to_string()),
            turn_end: record.flags.turn_end,
            battle_end: record.flags.battle_end,
            winner: record.flags.winner,
        })
    } else {
        return ParsedResult::raw_text(tag.as_str(), payload);
    };

    match outcome {
        Ok(outcome) => ParsedResult::new(tag.as_str(), ParsedBody::BattleResult(outcome)),
        Err(_) => ParsedResult::raw_text(tag.as_str(), payload),
    }
}

/// One side of an attack exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackParticipant {
    /// Negative values are damage, positive values heal
    #[serde(deserialize_with = "whole::int")]
    pub damage: i64,
}

/// Typed attack result submitted by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackResult {
    /// Play-by-play line for the attack
    pub comment: String,
    pub attacker: AttackParticipant,
    pub defender: AttackParticipant,
}

impl AttackResult {
    /// Damage dealt to the defender as a positive number
    pub fn damage(&self) -> i64 {
        self.defender.damage.abs()
    }

    pub fn to_payload(&self) -> Payload {
        let mut map = Payload::new();
        map.insert("comment".into(), self.comment.clone().into());
        map.insert(
            "attacker".into(),
            serde_json::json!({ "damage": self.attacker.damage }),
        );
        map.insert(
            "defender".into(),
            serde_json::json!({ "damage": self.defender.damage }),
        );
        map
    }
}
