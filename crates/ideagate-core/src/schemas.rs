//! JSON schemas handed to the provider for every structured call.
//!
//! Enumerated domains mirror the serde representations in `ideagate-schema`;
//! typed deserialization remains the authority.

use ideagate_provider::ResponseFormat;
use ideagate_schema::{Dimension, RiskKey};
use serde_json::{json, Map, Value};

const LEVELS: [&str; 3] = ["Low", "Medium", "High"];
const SATURATION: [&str; 3] = ["Blue Ocean", "Competitive", "Oversaturated"];
const RISK_LEVELS: [&str; 4] = ["low", "medium", "high", "critical"];
const RECOMMENDATIONS: [&str; 3] = ["Add", "Skip", "Needs Research"];

fn text() -> Value {
    json!({"type": "string", "minLength": 1})
}

fn text_list() -> Value {
    json!({"type": "array", "items": {"type": "string", "minLength": 1}})
}

fn one_of(values: &[&str]) -> Value {
    json!({"type": "string", "enum": values})
}

fn integer(min: i64, max: i64) -> Value {
    json!({"type": "integer", "minimum": min, "maximum": max})
}

/// Closed object; every listed property is required.
fn object(properties: Vec<(&str, Value)>) -> Value {
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
    let mut props = Map::new();
    for (name, schema) in properties {
        props.insert(name.to_string(), schema);
    }
    json!({
        "type": "object",
        "properties": props,
        "required": required,
        "additionalProperties": false,
    })
}

fn per_dimension(entry: impl Fn() -> Value) -> Value {
    object(Dimension::ALL.iter().map(|d| (d.key(), entry())).collect())
}

fn per_risk(entry: impl Fn() -> Value) -> Value {
    object(RiskKey::ALL.iter().map(|k| (k.key(), entry())).collect())
}

pub fn idea_report() -> ResponseFormat {
    ResponseFormat::new(
        "idea_report",
        "Idea and strategy analysis of a startup idea",
        object(vec![
            ("category", text()),
            ("value_proposition", text()),
            ("technical_complexity", one_of(&LEVELS)),
            ("tech_notes", text()),
            ("monetization", text()),
            ("key_assumptions", text_list()),
        ]),
    )
}

pub fn market_report() -> ResponseFormat {
    ResponseFormat::new(
        "market_report",
        "Market and competition analysis of a startup idea",
        object(vec![
            ("problem_severity", one_of(&LEVELS)),
            ("market_saturation", one_of(&SATURATION)),
            (
                "competitors",
                json!({
                    "type": "array",
                    "items": object(vec![("name", text()), ("positioning", text())]),
                }),
            ),
            ("differentiation", text()),
            ("market_size_note", text()),
        ]),
    )
}

pub fn timing_report() -> ResponseFormat {
    ResponseFormat::new(
        "timing_report",
        "Timing and founder leverage analysis of a startup idea",
        object(vec![
            ("tailwinds", text_list()),
            ("headwinds", text_list()),
            ("founder_fit", one_of(&LEVELS)),
            ("founder_fit_rationale", text()),
            ("why_now", text()),
        ]),
    )
}

pub fn synthesis() -> ResponseFormat {
    ResponseFormat::new(
        "evaluation_synthesis",
        "Scored synthesis of the three specialist reports",
        object(vec![
            (
                "score_breakdown",
                per_dimension(|| object(vec![("score", integer(0, 100)), ("insight", text())])),
            ),
            (
                "risk_profile",
                per_risk(|| {
                    object(vec![
                        ("level", one_of(&RISK_LEVELS)),
                        ("score", integer(0, 100)),
                        ("reason", text()),
                    ])
                }),
            ),
            (
                "competitive_landscape",
                object(vec![
                    ("direct_competitors", text_list()),
                    ("indirect_competitors", text_list()),
                    ("positioning", text()),
                ]),
            ),
            (
                "strategic_analysis",
                object(vec![("strengths", text_list()), ("weaknesses", text_list())]),
            ),
            ("next_steps", text_list()),
            ("executive_summary", text()),
        ]),
    )
}

pub fn simulation_draft() -> ResponseFormat {
    ResponseFormat::new(
        "feature_simulation",
        "Projected impact of adding one feature to an evaluated idea",
        object(vec![
            (
                "dimension_impacts",
                per_dimension(|| {
                    object(vec![
                        ("before", integer(0, 100)),
                        ("after", integer(0, 100)),
                        ("delta", integer(-100, 100)),
                        ("reasoning", text()),
                    ])
                }),
            ),
            (
                "risk_shifts",
                per_risk(|| {
                    object(vec![
                        ("before", one_of(&RISK_LEVELS)),
                        ("after", one_of(&RISK_LEVELS)),
                        ("reasoning", text()),
                    ])
                }),
            ),
            ("strategic_impact", text()),
            ("recommendation", one_of(&RECOMMENDATIONS)),
            ("rationale", text()),
        ]),
    )
}

pub fn diff_summary() -> ResponseFormat {
    ResponseFormat::new(
        "diff_summary",
        "One to three sentence summary of how an idea changed between versions",
        object(vec![(
            "summary",
            json!({"type": "string", "minLength": 1, "maxLength": 400}),
        )]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(schema: &Value) -> Vec<&str> {
        schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect()
    }

    #[test]
    fn synthesis_requires_every_dimension_and_risk() {
        let schema = synthesis().schema;
        let dims = required(&schema["properties"]["score_breakdown"]);
        assert_eq!(dims, Dimension::ALL.map(|d| d.key()).to_vec());
        let risks = required(&schema["properties"]["risk_profile"]);
        assert_eq!(risks, RiskKey::ALL.map(|k| k.key()).to_vec());
        assert_eq!(
            schema["properties"]["risk_profile"]["properties"]["market_risk"]["properties"]
                ["level"]["enum"],
            json!(["low", "medium", "high", "critical"])
        );
    }

    #[test]
    fn report_enums_match_display_names() {
        let market = market_report().schema;
        assert_eq!(
            market["properties"]["market_saturation"]["enum"],
            json!(["Blue Ocean", "Competitive", "Oversaturated"])
        );
        assert_eq!(
            market["properties"]["problem_severity"]["enum"],
            json!(["Low", "Medium", "High"])
        );
    }

    #[test]
    fn simulation_bounds_deltas() {
        let schema = simulation_draft().schema;
        let delta = &schema["properties"]["dimension_impacts"]["properties"]["founder_leverage"]
            ["properties"]["delta"];
        assert_eq!(delta["minimum"], -100);
        assert_eq!(delta["maximum"], 100);
        assert_eq!(
            schema["properties"]["recommendation"]["enum"],
            json!(["Add", "Skip", "Needs Research"])
        );
    }

    #[test]
    fn schema_names_are_identifier_safe() {
        for format in [
            idea_report(),
            market_report(),
            timing_report(),
            synthesis(),
            simulation_draft(),
            diff_summary(),
        ] {
            assert!(format
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
            assert_eq!(format.schema["additionalProperties"], json!(false));
        }
    }
}
