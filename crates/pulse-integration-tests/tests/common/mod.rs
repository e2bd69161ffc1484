//! Shared test harness for integration tests.

use std::sync::Arc;

use pulse_core::{ControlLevel, StateSnapshot, ToolResult};
use pulse_test::{MockAlertProvider, MockStateProvider, MockTransport, delly_fleet, fleet_agents};
use pulse_tools::{ExecutorSettings, Providers, ToolExecutor};
use serde_json::Value;

/// An executor wired to the `delly` fleet with a recording transport.
#[allow(dead_code)]
pub struct FleetHarness {
    /// The dispatcher under test.
    pub executor: ToolExecutor,
    /// Records every command the tools send to agents.
    pub transport: Arc<MockTransport>,
    /// Inventory served to the tools.
    pub state: Arc<MockStateProvider>,
}

#[allow(dead_code)]
impl FleetHarness {
    /// A harness whose transport simulates remote files.
    pub fn new(level: ControlLevel) -> Self {
        Self::builder(level).build()
    }

    /// Start building a harness with customisation options.
    pub fn builder(level: ControlLevel) -> HarnessBuilder {
        HarnessBuilder {
            level,
            snapshot: delly_fleet(),
            transport: MockTransport::new()
                .with_agents(fleet_agents())
                .with_file_system(),
            settings: ExecutorSettings::default(),
        }
    }

    /// Call `tool` through the dispatcher.
    pub async fn call(&self, tool: &str, args: Value) -> ToolResult {
        self.executor.execute(tool, args).await
    }

    /// Whether any command reached an agent.
    pub fn transport_untouched(&self) -> bool {
        self.transport.calls().is_empty()
    }
}

/// Builder for [`FleetHarness`].
#[allow(dead_code)]
pub struct HarnessBuilder {
    level: ControlLevel,
    snapshot: StateSnapshot,
    transport: MockTransport,
    settings: ExecutorSettings,
}

#[allow(dead_code)]
impl HarnessBuilder {
    /// Replace the inventory.
    pub fn snapshot(mut self, snapshot: StateSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Replace the transport.
    pub fn transport(mut self, transport: MockTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Replace the settings.
    pub fn settings(mut self, settings: ExecutorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Wire everything together.
    pub fn build(self) -> FleetHarness {
        let transport = Arc::new(self.transport);
        let state = Arc::new(MockStateProvider::new(self.snapshot));
        let providers = Providers::default()
            .with_state(state.clone())
            .with_transport(transport.clone())
            .with_alerts(Arc::new(MockAlertProvider::default()));
        let executor = ToolExecutor::new(self.level)
            .with_providers(providers)
            .with_settings(self.settings);
        FleetHarness {
            executor,
            transport,
            state,
        }
    }
}

/// The blocked code of `result`, or a panic naming what came back instead.
#[allow(dead_code)]
pub fn blocked_code(result: &ToolResult) -> &'static str {
    match result {
        ToolResult::Blocked(b) => b.code.as_str(),
        other => panic!("expected a blocked result, got {other:?}"),
    }
}
