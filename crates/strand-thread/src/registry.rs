//! Name → executor mapping for locally executed tools.

use crate::{ToolError, ToolRegistryError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use strand_protocol_ag_ui::ToolCallInfo;
use tracing::warn;

/// A local tool executor.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute the call and return its string result.
    async fn execute(&self, call: &ToolCallInfo) -> Result<String, ToolError>;
}

/// Per-tool registration options.
#[derive(Debug, Clone, Default)]
pub struct ToolOptions {
    /// Start the executor without awaiting it; its result (and any
    /// failure) is never observed by the caller.
    pub fire_and_forget: bool,
    /// Human-readable description.
    pub description: Option<String>,
}

impl ToolOptions {
    /// Options for a fire-and-forget tool.
    pub fn fire_and_forget() -> Self {
        Self {
            fire_and_forget: true,
            description: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

struct Registered {
    executor: Arc<dyn ToolExecutor>,
    options: ToolOptions,
}

/// Thread-safe registry of local tool executors.
///
/// Registration is strict (duplicate names are rejected so an executor is
/// never silently replaced); execution is lenient (an unregistered name
/// is a "not found" signal, not an error).
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Registered>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under `name`.
    pub fn register(
        &self,
        name: impl Into<String>,
        executor: Arc<dyn ToolExecutor>,
        options: ToolOptions,
    ) -> Result<(), ToolRegistryError> {
        let name = name.into();
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        if tools.contains_key(&name) {
            return Err(ToolRegistryError::DuplicateTool { name });
        }
        tools.insert(name, Registered { executor, options });
        Ok(())
    }

    /// Register a closure as an executor under `name`.
    pub fn register_fn<F, Fut>(
        &self,
        name: impl Into<String>,
        options: ToolOptions,
        f: F,
    ) -> Result<(), ToolRegistryError>
    where
        F: Fn(ToolCallInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.register(name, Arc::new(FnExecutor(f)), options)
    }

    /// Remove a registration. Returns whether the name was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.tools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some()
    }

    /// Whether `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Registered tool names.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Execute the tool named by `call`.
    ///
    /// Returns `Ok(None)` for an unregistered name and for fire-and-forget
    /// tools (which are spawned, with failures logged, never awaited).
    /// Normal tools are awaited; their errors propagate to the caller.
    pub async fn execute(&self, call: &ToolCallInfo) -> Result<Option<String>, ToolError> {
        let registered = {
            let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
            match tools.get(&call.name) {
                Some(r) => (r.executor.clone(), r.options.fire_and_forget),
                None => return Ok(None),
            }
        };
        let (executor, fire_and_forget) = registered;

        if fire_and_forget {
            let call = call.clone();
            tokio::spawn(async move {
                if let Err(error) = executor.execute(&call).await {
                    warn!(tool = %call.name, call_id = %call.id, %error, "fire-and-forget tool failed");
                }
            });
            return Ok(None);
        }

        executor.execute(call).await.map(Some)
    }

    /// Like [`execute`](Self::execute), but a "not found" signal becomes
    /// the caller-supplied default.
    pub async fn execute_or_default(
        &self,
        call: &ToolCallInfo,
        default: &str,
    ) -> Result<String, ToolError> {
        Ok(self
            .execute(call)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    /// The description a tool was registered with.
    pub fn description(&self, name: &str) -> Option<String> {
        self.tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .and_then(|r| r.options.description.clone())
    }
}

struct FnExecutor<F>(F);

#[async_trait]
impl<F, Fut> ToolExecutor for FnExecutor<F>
where
    F: Fn(ToolCallInfo) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ToolError>> + Send,
{
    async fn execute(&self, call: &ToolCallInfo) -> Result<String, ToolError> {
        (self.0)(call.clone()).await
    }
}
