use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::{GraphSpec, TensorBuffer};

#[derive(Clone, Copy, Debug)]
pub struct BackendCapabilities {
    /// Whether device handles can be queried and created.
    pub supports_device_properties: bool,
    pub supports_profiling: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProfilingLevel {
    #[default]
    Off,
    Basic,
    Detailed,
}

impl FromStr for ProfilingLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(ProfilingLevel::Off),
            "basic" => Ok(ProfilingLevel::Basic),
            "detailed" => Ok(ProfilingLevel::Detailed),
            other => bail!("invalid profiling level: {other} (expected off, basic or detailed)"),
        }
    }
}

impl fmt::Display for ProfilingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProfilingLevel::Off => "off",
            ProfilingLevel::Basic => "basic",
            ProfilingLevel::Detailed => "detailed",
        })
    }
}

/// A custom operator package: `path:interface_provider[:target]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpPackage {
    pub path: String,
    pub interface_provider: String,
    pub target: Option<String>,
}

impl OpPackage {
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.split(':').filter(|f| !f.is_empty()).collect();
        match fields.as_slice() {
            [path, provider] => Ok(Self {
                path: path.to_string(),
                interface_provider: provider.to_string(),
                target: None,
            }),
            [path, provider, target] => Ok(Self {
                path: path.to_string(),
                interface_provider: provider.to_string(),
                target: Some(target.to_string()),
            }),
            _ => bail!("malformed op package string: {raw}"),
        }
    }
}

/// The execution runtime the driver talks to.
///
/// Every call is synchronous and takes `&mut self`: a backend is never invoked
/// concurrently or re-entered. Handles are owned by the caller and handed back
/// to the matching `free_*` method exactly once.
pub trait Backend {
    type Device;
    type Profile;
    type Context;
    type Graph;

    fn name(&self) -> &'static str;
    fn capabilities(&self) -> BackendCapabilities;

    fn initialize(&mut self) -> Result<()>;
    fn terminate(&mut self) -> Result<()>;

    fn register_op_package(&mut self, package: &OpPackage) -> Result<()>;

    /// `Ok(None)` when the backend has no device concept.
    fn create_device(&mut self) -> Result<Option<Self::Device>>;
    fn free_device(&mut self, device: Self::Device) -> Result<()>;

    fn create_profile(&mut self, level: ProfilingLevel) -> Result<Self::Profile>;
    fn free_profile(&mut self, profile: Self::Profile) -> Result<()>;

    fn create_context(&mut self, device: Option<&Self::Device>) -> Result<Self::Context>;
    fn free_context(&mut self, context: Self::Context) -> Result<()>;

    /// Builds every graph in the context; spec indices follow the returned order.
    fn compose_graphs(
        &mut self,
        context: &mut Self::Context,
    ) -> Result<Vec<(GraphSpec, Self::Graph)>>;

    fn finalize_graph(
        &mut self,
        graph: &mut Self::Graph,
        profile: Option<&Self::Profile>,
    ) -> Result<()>;

    /// Runs one batch step. `outputs` are preallocated to the declared sizes.
    fn execute_graph(
        &mut self,
        graph: &mut Self::Graph,
        inputs: &[TensorBuffer],
        outputs: &mut [TensorBuffer],
        profile: Option<&Self::Profile>,
    ) -> Result<()>;

    fn free_graph(&mut self, graph: Self::Graph) -> Result<()>;

    /// Restores a context and its graphs, already finalized, from a binary
    /// previously written by [`Backend::save_binary`]. Spec indices follow
    /// the returned order.
    fn create_from_binary(
        &mut self,
        path: &Path,
        device: Option<&Self::Device>,
        profile: Option<&Self::Profile>,
    ) -> Result<(Self::Context, Vec<(GraphSpec, Self::Graph)>)> {
        let _ = (device, profile);
        bail!("{} cannot restore a context from {}", self.name(), path.display())
    }

    /// Serializes a context holding finalized graphs.
    fn save_binary(&mut self, context: &Self::Context, path: &Path) -> Result<()> {
        let _ = context;
        bail!("{} cannot save a context binary to {}", self.name(), path.display())
    }
}
