use serde::{Deserialize, Serialize};

/// Body of the health endpoint. Every metric is optional on the wire: the
/// backend reports accelerator figures best-effort and omits them when its
/// own probe fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthSnapshot {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub lm_studio: LmStudioHealth,
    #[serde(default)]
    pub system: SystemMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LmStudioHealth {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub models: Vec<String>,
}

/// Utilization percentages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub ram: Option<f64>,
    #[serde(default)]
    pub gpu: Option<f64>,
    #[serde(default)]
    pub vram: Option<f64>,
}

/// Displayed gauge state, merged across polls. A metric the backend omits
/// keeps its last known value so the gauges never flicker back to unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryState {
    pub backend_connected: bool,
    pub cpu: Option<f64>,
    pub ram: Option<f64>,
    pub gpu: Option<f64>,
    pub vram: Option<f64>,
    pub models: Vec<String>,
}

impl TelemetryState {
    /// Fold one snapshot into the displayed state.
    pub fn absorb(&mut self, snapshot: &HealthSnapshot) {
        self.backend_connected = snapshot.lm_studio.connected;
        if snapshot.system.cpu.is_some() {
            self.cpu = snapshot.system.cpu;
        }
        if snapshot.system.ram.is_some() {
            self.ram = snapshot.system.ram;
        }
        if snapshot.system.gpu.is_some() {
            self.gpu = snapshot.system.gpu;
        }
        if snapshot.system.vram.is_some() {
            self.vram = snapshot.system.vram;
        }
        if !snapshot.lm_studio.models.is_empty() {
            self.models = snapshot.lm_studio.models.clone();
        }
    }
}
