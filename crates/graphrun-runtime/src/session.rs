use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use graphrun_core::{Backend, GraphSpec, OpPackage, ProfilingLevel, TensorBuffer};
use tracing::{debug, error, info, warn};

/// Owns a backend and every handle created through it.
///
/// Handles are released in reverse order of creation: graphs, context,
/// profile, device, then the backend itself. `close` does this and reports the
/// first failure; `Drop` does the same on any other exit path and only logs.
pub struct Session<B: Backend> {
    backend: B,
    initialized: bool,
    device: Option<B::Device>,
    profile: Option<B::Profile>,
    context: Option<B::Context>,
    graphs: Vec<(GraphSpec, B::Graph)>,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            initialized: false,
            device: None,
            profile: None,
            context: None,
            graphs: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn has_profile(&self) -> bool {
        self.profile.is_some()
    }

    pub fn graph_specs(&self) -> impl Iterator<Item = &GraphSpec> {
        self.graphs.iter().map(|(spec, _)| spec)
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    pub fn initialize(&mut self) -> Result<()> {
        ensure!(!self.initialized, "backend {} already initialized", self.backend.name());
        self.backend
            .initialize()
            .with_context(|| format!("failed to initialize backend {}", self.backend.name()))?;
        self.initialized = true;
        info!(backend = self.backend.name(), "backend initialized");
        Ok(())
    }

    pub fn register_op_package(&mut self, package: &OpPackage) -> Result<()> {
        ensure!(self.initialized, "backend not initialized");
        self.backend.register_op_package(package).with_context(|| {
            format!(
                "failed to register op package {} (interface provider {})",
                package.path, package.interface_provider
            )
        })?;
        debug!(path = %package.path, provider = %package.interface_provider, "registered op package");
        Ok(())
    }

    pub fn create_device(&mut self) -> Result<()> {
        ensure!(self.initialized, "backend not initialized");
        ensure!(self.device.is_none(), "device already created");
        match self.backend.create_device().context("failed to create device")? {
            Some(device) => self.device = Some(device),
            None => warn!(backend = self.backend.name(), "device creation unsupported; continuing without a device"),
        }
        Ok(())
    }

    pub fn create_profile(&mut self, level: ProfilingLevel) -> Result<()> {
        ensure!(self.initialized, "backend not initialized");
        ensure!(self.profile.is_none(), "profile already created");
        let profile = self
            .backend
            .create_profile(level)
            .with_context(|| format!("failed to create {level} profile"))?;
        self.profile = Some(profile);
        Ok(())
    }

    pub fn create_context(&mut self) -> Result<()> {
        ensure!(self.initialized, "backend not initialized");
        ensure!(self.context.is_none(), "context already created");
        let context = self
            .backend
            .create_context(self.device.as_ref())
            .context("failed to create context")?;
        self.context = Some(context);
        Ok(())
    }

    pub fn compose_graphs(&mut self) -> Result<()> {
        ensure!(self.graphs.is_empty(), "graphs already composed");
        let context = self.context.as_mut().context("no context to compose graphs in")?;
        self.graphs = self
            .backend
            .compose_graphs(context)
            .context("failed to compose graphs")?;
        Ok(())
    }

    pub fn finalize_graphs(&mut self) -> Result<()> {
        for (spec, graph) in &mut self.graphs {
            self.backend
                .finalize_graph(graph, self.profile.as_ref())
                .with_context(|| format!("failed to finalize graph {}", spec.label()))?;
        }
        Ok(())
    }

    /// Restores the context and finalized graphs from a cached binary in
    /// place of `create_context`, `compose_graphs` and `finalize_graphs`.
    pub fn create_from_binary(&mut self, path: &Path) -> Result<()> {
        ensure!(self.initialized, "backend not initialized");
        ensure!(self.context.is_none(), "context already created");
        let (context, graphs) = self
            .backend
            .create_from_binary(path, self.device.as_ref(), self.profile.as_ref())
            .with_context(|| format!("failed to restore context from {}", path.display()))?;
        self.context = Some(context);
        self.graphs = graphs;
        Ok(())
    }

    pub fn save_binary(&mut self, path: &Path) -> Result<()> {
        let context = self.context.as_ref().context("no context to save")?;
        self.backend
            .save_binary(context, path)
            .with_context(|| format!("failed to save context binary {}", path.display()))?;
        info!(path = %path.display(), "context binary saved");
        Ok(())
    }

    /// Runs the graph at `pos` in composition order for one batch step.
    pub fn execute(
        &mut self,
        pos: usize,
        inputs: &[TensorBuffer],
        outputs: &mut [TensorBuffer],
    ) -> Result<()> {
        let (spec, graph) = self
            .graphs
            .get_mut(pos)
            .ok_or_else(|| anyhow!("no graph at position {pos}"))?;
        self.backend
            .execute_graph(graph, inputs, outputs, self.profile.as_ref())
            .with_context(|| format!("failed to execute graph {}", spec.label()))
    }

    /// Releases every handle and terminates the backend.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let mut first = None;
        let mut record = |stage: &str, res: Result<()>| {
            if let Err(err) = res {
                error!(stage, error = ?err, "failed to release backend resource");
                first.get_or_insert(err);
            }
        };

        while let Some((spec, graph)) = self.graphs.pop() {
            let res = self.backend.free_graph(graph);
            record("graph", res.with_context(|| format!("failed to free graph {}", spec.label())));
        }
        if let Some(context) = self.context.take() {
            record("context", self.backend.free_context(context));
        }
        if let Some(profile) = self.profile.take() {
            record("profile", self.backend.free_profile(profile));
        }
        if let Some(device) = self.device.take() {
            record("device", self.backend.free_device(device));
        }
        if self.initialized {
            self.initialized = false;
            record("backend", self.backend.terminate());
            debug!(backend = self.backend.name(), "backend terminated");
        }

        first.map_or(Ok(()), Err)
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        // Failures were already logged by `release`.
        let _ = self.release();
    }
}
