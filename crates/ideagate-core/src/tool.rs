//! Named, schema-validated operations for a conversational driver.
//!
//! - `ToolExecutor` trait for implementing tools
//! - `ToolRegistry` for managing available tools
//! - `ToolContext` for the caller's ambient state

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ideagate_provider::ToolDef;

use crate::error::EngineError;

/// Output from a tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

impl From<EngineError> for ToolOutput {
    fn from(err: EngineError) -> Self {
        tracing::warn!(actionable = err.is_actionable(), "tool call failed: {err}");
        Self::error(err.user_message())
    }
}

/// Context passed to tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Idea the conversation is about; used when the input names none.
    idea_id: Option<String>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_idea(idea_id: impl Into<String>) -> Self {
        Self {
            idea_id: Some(idea_id.into()),
        }
    }

    pub fn idea_id(&self) -> Option<&str> {
        self.idea_id.as_deref()
    }

    /// Explicit id from the input, else the conversation's idea.
    pub fn resolve_idea_id(&self, explicit: Option<String>) -> Result<String, EngineError> {
        explicit
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.idea_id.clone())
            .ok_or_else(|| EngineError::InvalidInput("idea_id is required".into()))
    }
}

/// Trait for implementing tools that can be invoked by the LLM.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Return the tool definition (name, description, schema).
    fn definition(&self) -> ToolDef;

    /// Execute the tool. Operation failures come back as `is_error` output;
    /// `Err` is reserved for failures outside the operation itself.
    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Registry of available tools, listed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn ToolExecutor>) {
        let name = tool.definition().name.clone();
        self.tools.insert(name, tool);
    }

    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow!("tool not found: {name}"))?;
        tracing::debug!(tool = name, "executing tool");
        tool.execute(input, ctx).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}
