use anyhow::Result;
use async_trait::async_trait;
use ideagate_provider::ToolDef;
use ideagate_schema::{EditableField, IntakeOverrides};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::service::{EvaluatedVersion, FeatureProjection, FieldUpdate, IdeaService};
use crate::tool::{ToolContext, ToolExecutor, ToolOutput, ToolRegistry};

pub const RE_EVALUATE_TOOL_NAME: &str = "re_evaluate";
pub const REFINE_FEATURE_TOOL_NAME: &str = "refine_feature";
pub const UPDATE_FIELD_TOOL_NAME: &str = "update_field";

/// Registry holding the three idea tools over one service.
pub fn idea_tool_registry(service: IdeaService) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ReEvaluateTool::new(service.clone())));
    registry.register(Box::new(RefineFeatureTool::new(service.clone())));
    registry.register(Box::new(UpdateFieldTool::new(service)));
    registry
}

fn parse_input<T: DeserializeOwned>(input: serde_json::Value) -> EngineResult<T> {
    serde_json::from_value(input).map_err(|e| EngineError::InvalidInput(e.to_string()))
}

fn render<T: Serialize>(result: EngineResult<T>) -> Result<ToolOutput> {
    match result {
        Ok(value) => Ok(ToolOutput::ok(serde_json::to_string_pretty(&value)?)),
        Err(err) => Ok(err.into()),
    }
}

fn idea_id_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": "Idea to operate on. Defaults to the idea of the conversation."
    })
}

fn field_names() -> Vec<&'static str> {
    EditableField::ALL.iter().map(|f| f.as_str()).collect()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReEvaluateInput {
    #[serde(default)]
    idea_id: Option<String>,
    #[serde(default)]
    overrides: IntakeOverrides,
}

pub struct ReEvaluateTool {
    service: IdeaService,
}

impl ReEvaluateTool {
    pub fn new(service: IdeaService) -> Self {
        Self { service }
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> EngineResult<EvaluatedVersion> {
        let input: ReEvaluateInput = parse_input(input)?;
        let idea_id = ctx.resolve_idea_id(input.idea_id)?;
        self.service.re_evaluate(&idea_id, &input.overrides).await
    }
}

#[async_trait]
impl ToolExecutor for ReEvaluateTool {
    fn definition(&self) -> ToolDef {
        let override_props: serde_json::Map<String, serde_json::Value> = EditableField::ALL
            .iter()
            .map(|f| {
                (
                    f.as_str().to_string(),
                    serde_json::json!({"type": "string", "description": f.label()}),
                )
            })
            .collect();
        ToolDef {
            name: RE_EVALUATE_TOOL_NAME.to_string(),
            description: "Re-run the full evaluation as a new version of the idea, optionally \
                          overriding intake fields first. Returns the new score, verdict, \
                          confidence and what changed."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "idea_id": idea_id_schema(),
                    "overrides": {
                        "type": "object",
                        "properties": override_props,
                        "additionalProperties": false
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        render(self.run(input, ctx).await)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RefineFeatureInput {
    #[serde(default)]
    idea_id: Option<String>,
    feature: String,
}

pub struct RefineFeatureTool {
    service: IdeaService,
}

impl RefineFeatureTool {
    pub fn new(service: IdeaService) -> Self {
        Self { service }
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> EngineResult<FeatureProjection> {
        let input: RefineFeatureInput = parse_input(input)?;
        let idea_id = ctx.resolve_idea_id(input.idea_id)?;
        self.service.refine_feature(&idea_id, &input.feature).await
    }
}

#[async_trait]
impl ToolExecutor for RefineFeatureTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: REFINE_FEATURE_TOOL_NAME.to_string(),
            description: "Simulate adding one feature to the currently evaluated version. \
                          Does not change the evaluation. Requires a prior evaluation."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "idea_id": idea_id_schema(),
                    "feature": {
                        "type": "string",
                        "description": "Plain description of the proposed feature"
                    }
                },
                "required": ["feature"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        render(self.run(input, ctx).await)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateFieldInput {
    #[serde(default)]
    idea_id: Option<String>,
    field: String,
    value: String,
}

pub struct UpdateFieldTool {
    service: IdeaService,
}

impl UpdateFieldTool {
    pub fn new(service: IdeaService) -> Self {
        Self { service }
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> EngineResult<FieldUpdate> {
        let input: UpdateFieldInput = parse_input(input)?;
        let idea_id = ctx.resolve_idea_id(input.idea_id)?;
        self.service
            .update_field(&idea_id, &input.field, &input.value)
            .await
    }
}

#[async_trait]
impl ToolExecutor for UpdateFieldTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: UPDATE_FIELD_TOOL_NAME.to_string(),
            description: "Change one intake field of the idea without re-evaluating. Scores \
                          stay stale until re_evaluate is called."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "idea_id": idea_id_schema(),
                    "field": {"type": "string", "enum": field_names()},
                    "value": {"type": "string", "minLength": 1}
                },
                "required": ["field", "value"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        render(self.run(input, ctx).await)
    }
}
