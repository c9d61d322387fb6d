//! Actions: the side-effecting operations the model can request by name.
//!
//! Collaborators expose their operations as [`ActionSet`]s. The
//! [`ActionRegistry`] flattens every set into one namespace (rejecting name
//! collisions up front) and is shared read-only across all loop instances.
//! A registry bound to one event's [`OperationContext`] becomes an
//! [`ActionExecutor`], which is what the orchestration loop talks to.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistryError;
use crate::host::OperationContext;

/// An action requested by the model inside an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Correlation id (matches the model's tool_use id)
    pub id: String,

    /// Name of the action to invoke
    pub name: String,

    /// Named arguments
    pub input: serde_json::Value,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// The answer to exactly one [`ActionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// The request id this result answers
    pub request_id: String,

    /// Human-readable or JSON-serialized outcome
    pub content: String,

    /// Whether the outcome describes a failure
    #[serde(default)]
    pub is_error: bool,
}

impl ActionResult {
    pub fn success(request_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(request_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// What a handler produced, before it is correlated to a request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub content: String,
    pub is_error: bool,
}

impl ActionOutcome {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failed(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Serialize structured data as the success payload.
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(content) => Self::ok(content),
            Err(e) => Self::failed(format!("Failed to serialize result: {e}")),
        }
    }

    pub fn into_result(self, request_id: impl Into<String>) -> ActionResult {
        ActionResult {
            request_id: request_id.into(),
            content: self.content,
            is_error: self.is_error,
        }
    }
}

/// Parameter type advertised to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

/// One declared parameter of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ParamSpec {
    fn new(name: &str, ty: ParamType, description: &str) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    /// Mark the parameter optional with a default value.
    pub fn optional(mut self, default: serde_json::Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }
}

/// Static descriptor of an action, serialized into every model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    pub description: String,
    /// Declared parameters, in contract order.
    pub params: Vec<ParamSpec>,
}

impl ActionSchema {
    pub fn new(name: &str, description: &str, params: Vec<ParamSpec>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
        }
    }

    /// JSON Schema for the action's input object.
    pub fn input_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for p in &self.params {
            let mut prop = serde_json::json!({
                "type": p.ty,
                "description": p.description,
            });
            if let Some(default) = &p.default {
                prop["default"] = default.clone();
            }
            properties.insert(p.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// The request's arguments in declared parameter order, with defaults
    /// filled in for absent optional parameters.
    pub fn ordered_arguments(&self, input: &serde_json::Value) -> Vec<(String, serde_json::Value)> {
        self.params
            .iter()
            .map(|p| {
                let value = input
                    .get(&p.name)
                    .cloned()
                    .or_else(|| p.default.clone())
                    .unwrap_or(serde_json::Value::Null);
                (p.name.clone(), value)
            })
            .collect()
    }

    /// Render a call as `name(a=1, b="x")` for logs.
    pub fn render_call(&self, input: &serde_json::Value) -> String {
        let args: Vec<String> = self
            .ordered_arguments(input)
            .into_iter()
            .map(|(name, value)| {
                let mut shown = value.to_string();
                if shown.len() > 60 {
                    let cut = shown
                        .char_indices()
                        .take_while(|(i, _)| *i < 57)
                        .last()
                        .map(|(i, c)| i + c.len_utf8())
                        .unwrap_or(0);
                    shown.truncate(cut);
                    shown.push_str("...");
                }
                format!("{name}={shown}")
            })
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

/// A family of operations exposed by one collaborator.
#[async_trait]
pub trait ActionSet: Send + Sync {
    /// Name of the family (used in collision reports and logs).
    fn name(&self) -> &str;

    /// Schemas of every action this set handles.
    fn schemas(&self) -> Vec<ActionSchema>;

    /// Invoke one of this set's actions. Implementations never fail: every
    /// failure is narrated into the returned outcome.
    async fn invoke(&self, ctx: &OperationContext, request: &ActionRequest) -> ActionOutcome;
}

/// The flat name → handler table.
///
/// Immutable after construction; share it behind an `Arc`.
pub struct ActionRegistry {
    sets: Vec<Box<dyn ActionSet>>,
    schemas: Vec<ActionSchema>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("sets", &self.sets.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("actions", &self.names())
            .finish()
    }
}

impl ActionRegistry {
    /// Merge the given sets into one namespace. Fails on the first name
    /// exposed twice.
    pub fn new(sets: Vec<Box<dyn ActionSet>>) -> Result<Self, RegistryError> {
        let mut schemas = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (set_idx, set) in sets.iter().enumerate() {
            for schema in set.schemas() {
                if let Some(&owner) = index.get(&schema.name) {
                    return Err(RegistryError::DuplicateAction {
                        name: schema.name,
                        first: sets[owner].name().to_string(),
                        second: set.name().to_string(),
                    });
                }
                index.insert(schema.name.clone(), set_idx);
                schemas.push(schema);
            }
        }

        Ok(Self {
            sets,
            schemas,
            index,
        })
    }

    /// Look up the set handling `name` (exact match).
    pub fn resolve(&self, name: &str) -> Option<&dyn ActionSet> {
        self.index.get(name).map(|&i| self.sets[i].as_ref())
    }

    pub fn schema(&self, name: &str) -> Option<&ActionSchema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// The schema catalog advertised to the model, in registration order.
    pub fn schemas(&self) -> &[ActionSchema] {
        &self.schemas
    }

    pub fn names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Invoke a request. Unknown names produce an explicit error result so
    /// that every request id the model is waiting on gets an answer.
    pub async fn invoke(&self, ctx: &OperationContext, request: &ActionRequest) -> ActionResult {
        match self.resolve(&request.name) {
            Some(set) => {
                if let Some(schema) = self.schema(&request.name) {
                    debug!(set = set.name(), call = %schema.render_call(&request.input), "Invoking action");
                }
                set.invoke(ctx, request).await.into_result(&request.id)
            }
            None => ActionResult::error(
                &request.id,
                format!(
                    "Unknown action '{}'. Available actions: {}",
                    request.name,
                    self.names().join(", ")
                ),
            ),
        }
    }

    /// Bind this registry to one event's context.
    pub fn bind(self: &Arc<Self>, ctx: OperationContext) -> BoundRegistry {
        BoundRegistry {
            registry: Arc::clone(self),
            ctx,
        }
    }
}

/// What the orchestration loop needs from the action side: the advertised
/// catalog and a way to turn each request into exactly one result.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    fn schemas(&self) -> &[ActionSchema];

    async fn execute(&self, request: &ActionRequest) -> ActionResult;
}

/// A shared registry paired with one event's [`OperationContext`].
pub struct BoundRegistry {
    registry: Arc<ActionRegistry>,
    ctx: OperationContext,
}

impl BoundRegistry {
    pub fn context(&self) -> &OperationContext {
        &self.ctx
    }
}

#[async_trait]
impl ActionExecutor for BoundRegistry {
    fn schemas(&self) -> &[ActionSchema] {
        self.registry.schemas()
    }

    async fn execute(&self, request: &ActionRequest) -> ActionResult {
        self.registry.invoke(&self.ctx, request).await
    }
}
