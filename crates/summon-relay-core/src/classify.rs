//! Result-type inference from payload shape
//!
//! Producers are an external agent emitting free-form JSON, so this is
//! shape sniffing rather than schema validation. Classification is total:
//! anything unrecognized becomes [`ResultType::GeneralJson`].

use serde_json::Value;

use crate::record::{Payload, ResultType};

/// Keys that carry a producer-declared result type, in lookup order
pub const EXPLICIT_TYPE_KEYS: [&str; 2] = ["resultType", "result_type"];

/// Fields a payload must carry to count as creature data
pub const CREATURE_FIELDS: [&str; 4] = ["name", "hp", "specialMove", "description"];

/// One shape predicate and the tag it assigns
#[derive(Debug)]
pub struct ShapeRule {
    pub name: &'static str,
    pub tag: ResultType,
    pub matches: fn(&Payload) -> bool,
}

/// Shape rules in priority order; the first match wins.
///
/// Payloads can satisfy several predicates at once (a finish comment is
/// also a loose attack candidate), so the order is part of the contract.
pub const SHAPE_RULES: &[ShapeRule] = &[
    ShapeRule {
        name: "only_comment",
        tag: ResultType::FinishComment,
        matches: is_finish_comment,
    },
    ShapeRule {
        name: "creature_fields",
        tag: ResultType::CreatureData,
        matches: is_creature,
    },
    ShapeRule {
        name: "attacker_defender_comment",
        tag: ResultType::Attack,
        matches: is_full_attack,
    },
    ShapeRule {
        name: "model_output",
        tag: ResultType::ModelGeneration,
        matches: is_model,
    },
    ShapeRule {
        name: "script_output",
        tag: ResultType::BlenderScript,
        matches: is_script,
    },
    ShapeRule {
        name: "comment_with_side",
        tag: ResultType::Attack,
        matches: is_loose_attack,
    },
];

/// Infer the result type of a payload
pub fn classify(payload: &Payload) -> ResultType {
    if let Some(explicit) = explicit_type(payload) {
        return explicit;
    }

    SHAPE_RULES
        .iter()
        .find(|rule| (rule.matches)(payload))
        .map(|rule| rule.tag.clone())
        .unwrap_or(ResultType::GeneralJson)
}

/// Producer-declared type, if present and not null.
///
/// A non-string declaration is kept as a custom tag holding its JSON text.
pub fn explicit_type(payload: &Payload) -> Option<ResultType> {
    EXPLICIT_TYPE_KEYS
        .iter()
        .find_map(|key| payload.get(*key).filter(|v| !v.is_null()))
        .map(|value| match value {
            Value::String(tag) => ResultType::from(tag.as_str()),
            other => ResultType::Custom(other.to_string()),
        })
}

fn has_all(payload: &Payload, keys: &[&str]) -> bool {
    keys.iter().all(|k| payload.contains_key(*k))
}

fn is_finish_comment(p: &Payload) -> bool {
    p.len() == 1 && p.contains_key("comment")
}

fn is_creature(p: &Payload) -> bool {
    has_all(p, &CREATURE_FIELDS)
}

fn is_full_attack(p: &Payload) -> bool {
    has_all(p, &["attacker", "defender", "comment"])
}

fn is_model(p: &Payload) -> bool {
    p.contains_key("model_path") || p.contains_key("stl_data")
}

fn is_script(p: &Payload) -> bool {
    p.contains_key("blender_script") || p.contains_key("python_code")
}

fn is_loose_attack(p: &Payload) -> bool {
    p.contains_key("comment") && (p.contains_key("attacker") || p.contains_key("defender"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn test_single_comment_is_finish_comment() {
        assert_eq!(
            classify(&payload(json!({"comment": "x"}))),
            ResultType::FinishComment
        );
    }

    #[test]
    fn test_comment_with_both_sides_is_attack() {
        let p = payload(json!({
            "comment": "x",
            "attacker": {"damage": 0},
            "defender": {"damage": -30}
        }));
        assert_eq!(classify(&p), ResultType::Attack);
    }

    #[test]
    fn test_explicit_type_wins_over_shape() {
        let p = payload(json!({"resultType": "custom", "comment": "x"}));
        assert_eq!(classify(&p), ResultType::Custom("custom".into()));

        let p = payload(json!({
            "result_type": "attack",
            "name": "Drake", "hp": 1, "specialMove": "m", "description": "d"
        }));
        assert_eq!(classify(&p), ResultType::Attack);
    }

    #[test]
    fn test_non_string_explicit_type_is_custom() {
        let p = payload(json!({"resultType": 7, "model_path": "/m.stl"}));
        assert_eq!(classify(&p), ResultType::Custom("7".into()));

        let p = payload(json!({"result_type": {"kind": "x"}}));
        assert_eq!(classify(&p), ResultType::Custom(r#"{"kind":"x"}"#.into()));
    }

    #[test]
    fn test_null_explicit_type_falls_through() {
        let p = payload(json!({"resultType": null, "model_path": "/m.stl"}));
        assert_eq!(classify(&p), ResultType::ModelGeneration);
    }

    #[test]
    fn test_creature_beats_model() {
        let p = payload(json!({
            "name": "Drake", "hp": 500, "specialMove": "Flame", "description": "d",
            "stl_data": "solid"
        }));
        assert_eq!(classify(&p), ResultType::CreatureData);
    }

    #[test]
    fn test_model_beats_script() {
        let p = payload(json!({"model_path": "/m.stl", "blender_script": "import bpy"}));
        assert_eq!(classify(&p), ResultType::ModelGeneration);
        let p = payload(json!({"python_code": "print(1)"}));
        assert_eq!(classify(&p), ResultType::BlenderScript);
    }

    #[test]
    fn test_loose_attack() {
        let p = payload(json!({"comment": "x", "defender": {"damage": -5}, "extra": 1}));
        assert_eq!(classify(&p), ResultType::Attack);
    }

    #[test]
    fn test_fallback_is_general_json() {
        assert_eq!(classify(&Payload::new()), ResultType::GeneralJson);
        assert_eq!(
            classify(&payload(json!({"comment": "x", "other": 1}))),
            ResultType::GeneralJson
        );
        assert_eq!(
            classify(&payload(json!({"rawResult": "not json"}))),
            ResultType::GeneralJson
        );
    }

    #[test]
    fn test_rule_order_is_pinned() {
        let names: Vec<_> = SHAPE_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            [
                "only_comment",
                "creature_fields",
                "attacker_defender_comment",
                "model_output",
                "script_output",
                "comment_with_side",
            ]
        );
    }
}
