//! Process lifecycle.
//!
//! The expensive pieces (HTTP client, tool registry, agent) are built once at
//! startup and shared for the life of the process. [`install`] publishes the
//! runtime as a process-wide handle so request handlers and scheduled jobs
//! reach the same agent; [`shutdown`] tears it down.

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;

use crate::agent::Agent;
use crate::config::AssistantConfig;
use crate::llm_client::{ChatClient, ModelClient};
use crate::tools::planner::register_planner_tools;
use crate::tools::ToolRegistry;

static RUNTIME: RwLock<Option<Arc<AssistantRuntime>>> = RwLock::new(None);

pub struct AssistantRuntime {
    pub config: AssistantConfig,
    pub agent: Arc<Agent>,
    pub tool_registry: Arc<ToolRegistry>,
    pub started_at: DateTime<Utc>,
}

pub struct AssistantRuntimeBuilder {
    config: AssistantConfig,
    client: Option<Arc<dyn ModelClient>>,
    tools: Option<ToolRegistry>,
}

impl AssistantRuntimeBuilder {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            client: None,
            tools: None,
        }
    }

    /// Use a custom model client instead of the HTTP one built from config.
    pub fn with_model_client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Use a custom tool registry instead of the built-in planner tools.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn build(self) -> Result<AssistantRuntime> {
        let config = self.config;

        let client = self
            .client
            .unwrap_or_else(|| Arc::new(ChatClient::new(&config)));

        let tool_registry = Arc::new(self.tools.unwrap_or_else(|| {
            let mut tools = ToolRegistry::new();
            register_planner_tools(&mut tools);
            tools
        }));

        let agent = Arc::new(Agent::new(client, tool_registry.clone(), config.clone()));

        tracing::info!(
            "Assistant runtime ready (model: {}, strategy: {:?})",
            config.llm_model,
            config.strategy
        );

        Ok(AssistantRuntime {
            config,
            agent,
            tool_registry,
            started_at: Utc::now(),
        })
    }
}

impl AssistantRuntime {
    pub fn bootstrap(config: AssistantConfig) -> Result<Self> {
        AssistantRuntimeBuilder::new(config).build()
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// Publish a runtime as the process-wide handle, replacing any previous one.
pub fn install(runtime: AssistantRuntime) -> Arc<AssistantRuntime> {
    let handle = Arc::new(runtime);
    let mut slot = RUNTIME.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        tracing::warn!("Replacing an already-installed assistant runtime");
    }
    *slot = Some(handle.clone());
    handle
}

/// The currently installed runtime, if any.
pub fn current() -> Option<Arc<AssistantRuntime>> {
    RUNTIME
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Drop the process-wide handle. Returns false when none was installed.
/// In-flight turns holding an `Arc` finish normally.
pub fn shutdown() -> bool {
    let previous = RUNTIME
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();

    match previous {
        Some(runtime) => {
            tracing::info!(
                "Assistant runtime shut down after {}s",
                runtime.uptime_seconds()
            );
            true
        }
        None => false,
    }
}

/// Initialize tracing with an env-filter. `RUST_LOG` overrides the default
/// level. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,daykeeper=debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
