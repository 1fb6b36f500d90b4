use std::fs;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use graphrun_core::{Backend, GraphSpec, IoTensorError, ProfilingLevel};
use graphrun_iotensor::{
    populate_input_tensors, read_input_lists, setup_input_and_output_tensors,
    tear_down_input_and_output_tensors, write_output_tensors, GraphTensors, InputManifest,
    OutputTarget,
};
use tracing::{debug, error, info, warn};

use crate::timings::elapsed_us;
use crate::{GraphRun, RunConfig, RunState, RunSummary, Session, StepTimings};

/// Drives one run: load input lists, bring the backend up, build graphs, then
/// execute every graph over its batch steps.
///
/// Each stage is a separate call so callers can report which one failed.
/// Stages must be called in order; any failure (including calling a stage out
/// of order) leaves the app in [`RunState::Failed`].
pub struct App<B: Backend> {
    config: RunConfig,
    state: RunState,
    manifests: Vec<InputManifest>,
    session: Session<B>,
}

impl<B: Backend> App<B> {
    pub fn new(backend: B, config: RunConfig) -> Self {
        Self {
            config,
            state: RunState::Idle,
            manifests: Vec::new(),
            session: Session::new(backend),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn session(&self) -> &Session<B> {
        &self.session
    }

    pub fn manifests(&self) -> &[InputManifest] {
        &self.manifests
    }

    /// Reads every input list and prepares the output root.
    pub fn initialize(&mut self) -> Result<()> {
        self.advance(RunState::Idle, RunState::ManifestsLoaded, |app| {
            app.manifests = read_input_lists(&app.config.input_lists, app.config.manifest)
                .context("failed to read input lists")?;

            let root = &app.config.output_dir;
            if app.config.dump_outputs && !root.exists() {
                fs::create_dir_all(root).map_err(|source| IoTensorError::CreateDir {
                    path: root.clone(),
                    source,
                })?;
            }

            info!(
                input_lists = app.manifests.len(),
                output_dir = %root.display(),
                "input lists loaded"
            );
            Ok(())
        })
    }

    pub fn initialize_backend(&mut self) -> Result<()> {
        self.advance(RunState::ManifestsLoaded, RunState::BackendReady, |app| {
            app.session.initialize()
        })
    }

    /// Registers op packages in the order they were configured.
    pub fn register_op_packages(&mut self) -> Result<()> {
        self.advance(RunState::BackendReady, RunState::BackendReady, |app| {
            for package in &app.config.op_packages {
                app.session.register_op_package(package)?;
            }
            if !app.config.op_packages.is_empty() {
                info!(count = app.config.op_packages.len(), "op packages registered");
            }
            Ok(())
        })
    }

    pub fn create_device(&mut self) -> Result<()> {
        self.advance(RunState::BackendReady, RunState::BackendReady, |app| {
            let backend = app.session.backend();
            if !backend.capabilities().supports_device_properties {
                warn!(
                    backend = backend.name(),
                    "device properties not supported; skipping device creation"
                );
                return Ok(());
            }
            app.session.create_device()
        })
    }

    pub fn initialize_profiling(&mut self) -> Result<()> {
        self.advance(RunState::BackendReady, RunState::BackendReady, |app| {
            let level = app.config.profiling_level;
            if level == ProfilingLevel::Off {
                return Ok(());
            }
            let backend = app.session.backend();
            if !backend.capabilities().supports_profiling {
                warn!(backend = backend.name(), %level, "profiling not supported; continuing without it");
                return Ok(());
            }
            app.session.create_profile(level)?;
            info!(%level, "profiling enabled");
            Ok(())
        })
    }

    pub fn create_context(&mut self) -> Result<()> {
        self.advance(RunState::BackendReady, RunState::ContextReady, |app| {
            app.session.create_context()
        })
    }

    pub fn compose_graphs(&mut self) -> Result<()> {
        self.advance(RunState::ContextReady, RunState::GraphsComposed, |app| {
            app.session.compose_graphs()?;
            app.warn_on_extra_input_lists();
            info!(graphs = app.session.graph_count(), "graphs composed");
            Ok(())
        })
    }

    /// Finalizes every graph, then saves the context binary when one is named.
    pub fn finalize_graphs(&mut self) -> Result<()> {
        self.advance(RunState::GraphsComposed, RunState::GraphsFinalized, |app| {
            app.session.finalize_graphs()?;
            if let Some(path) = app.config.saved_binary_path() {
                let root = &app.config.output_dir;
                fs::create_dir_all(root).map_err(|source| IoTensorError::CreateDir {
                    path: root.clone(),
                    source,
                })?;
                app.session.save_binary(&path)?;
            }
            Ok(())
        })
    }

    /// Restores context and finalized graphs from the configured cached
    /// binary. Replaces `create_context`, `compose_graphs` and
    /// `finalize_graphs`.
    pub fn create_from_binary(&mut self) -> Result<()> {
        self.advance(RunState::BackendReady, RunState::GraphsFinalized, |app| {
            let path = app
                .config
                .cached_binary
                .clone()
                .context("no cached binary configured")?;
            app.session.create_from_binary(&path)?;
            app.warn_on_extra_input_lists();
            info!(
                path = %path.display(),
                graphs = app.session.graph_count(),
                "graphs restored from cached binary"
            );
            Ok(())
        })
    }

    /// Executes every graph in composition order, stopping at the first failure.
    pub fn execute_graphs(&mut self) -> Result<RunSummary> {
        self.advance(RunState::GraphsFinalized, RunState::Done, |app| {
            app.state = RunState::Executing;
            let specs: Vec<GraphSpec> = app.session.graph_specs().cloned().collect();
            app.check_input_counts(&specs)?;
            let mut summary = RunSummary::default();
            for (pos, spec) in specs.iter().enumerate() {
                summary.graphs.push(app.execute_graph(pos, spec)?);
            }
            info!(
                graphs = summary.graphs.len(),
                steps = summary.total_steps(),
                "execution complete"
            );
            Ok(summary)
        })
    }

    /// Runs every stage up to and including execution. Backend resources stay
    /// alive until [`App::shutdown`] or drop.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.initialize().context("Initialization failure")?;
        self.initialize_backend().context("Backend Initialization failure")?;
        self.create_device().context("Device Creation failure")?;
        self.initialize_profiling().context("Profiling Initialization failure")?;
        self.register_op_packages().context("Register Op Packages failure")?;
        if self.config.cached_binary.is_some() {
            self.create_from_binary().context("Create From Binary failure")?;
        } else {
            self.create_context().context("Context Creation failure")?;
            self.compose_graphs().context("Graph Prepare failure")?;
            self.finalize_graphs().context("Graph Finalize failure")?;
        }
        self.execute_graphs().context("Graph Execution failure")
    }

    /// Frees graphs, context, profile and device, then terminates the backend.
    pub fn shutdown(self) -> Result<()> {
        self.session.close().context("Teardown failure")
    }

    fn execute_graph(&mut self, pos: usize, spec: &GraphSpec) -> Result<GraphRun> {
        let label = spec.label();
        let manifest = self
            .manifests
            .get_mut(pos)
            .ok_or_else(|| anyhow!("no inputs available for graph {pos} ({label})"))?;

        let mut run = GraphRun {
            graph_idx: pos,
            label,
            steps: 0,
            timings: StepTimings::default(),
        };
        if manifest.is_empty() {
            warn!(graph_idx = pos, path = %manifest.source().display(), "input list is empty; skipping graph");
            return Ok(run);
        }

        let mut tensors = setup_input_and_output_tensors(spec)
            .with_context(|| format!("failed to set up tensors for graph {pos}"))?;
        let result = run_batch_steps(
            &mut self.session,
            &self.config,
            manifest,
            &mut tensors,
            &mut run,
        );
        tear_down_input_and_output_tensors(tensors);
        result?;

        info!(graph_idx = pos, graph = %run.label, steps = run.steps, "graph executed");
        Ok(run)
    }

    /// Matches every non-empty input list against its graph's declared inputs.
    fn check_input_counts(&self, specs: &[GraphSpec]) -> Result<()> {
        for (pos, (spec, manifest)) in specs.iter().zip(&self.manifests).enumerate() {
            if !manifest.is_empty() && manifest.slot_count() != spec.inputs.len() {
                return Err(IoTensorError::InputCountMismatch {
                    graph_idx: pos,
                    expected: spec.inputs.len(),
                    actual: manifest.slot_count(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn warn_on_extra_input_lists(&self) {
        let graphs = self.session.graph_count();
        if self.manifests.len() > graphs {
            warn!(
                graphs,
                input_lists = self.manifests.len(),
                "more input lists than graphs; extra lists are ignored"
            );
        }
    }

    fn advance<T>(
        &mut self,
        from: RunState,
        to: RunState,
        stage: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.state != from {
            let current = self.state;
            self.state = RunState::Failed;
            bail!("run is {current}, expected {from}");
        }
        match stage(self) {
            Ok(value) => {
                self.state = to;
                Ok(value)
            }
            Err(err) => {
                error!(from = %from, error = ?err, "run stage failed");
                self.state = RunState::Failed;
                Err(err)
            }
        }
    }
}

fn run_batch_steps<B: Backend>(
    session: &mut Session<B>,
    config: &RunConfig,
    manifest: &mut InputManifest,
    tensors: &mut GraphTensors,
    run: &mut GraphRun,
) -> Result<()> {
    let pos = run.graph_idx;
    while !manifest.is_exhausted() {
        let batch_idx = run.steps;

        let t0 = Instant::now();
        populate_input_tensors(pos, manifest, &mut tensors.inputs, config.input_data_type)
            .with_context(|| format!("failed to populate inputs of graph {pos}, batch {batch_idx}"))?;
        let populate_us = elapsed_us(t0);

        let t1 = Instant::now();
        session.execute(pos, &tensors.inputs, &mut tensors.outputs)?;
        let backend_us = elapsed_us(t1);

        let t2 = Instant::now();
        if config.dump_outputs {
            let target = OutputTarget {
                output_root: &config.output_dir,
                graph_idx: pos,
                graph_label: &run.label,
                batch_idx,
                output_type: config.output_data_type,
            };
            write_output_tensors(&target, &tensors.outputs)
                .with_context(|| format!("failed to write outputs of graph {pos}, batch {batch_idx}"))?;
        }
        let serialize_us = elapsed_us(t2);

        debug!(graph_idx = pos, batch_idx, populate_us, backend_us, serialize_us, "batch step done");
        run.timings += StepTimings {
            populate_us,
            backend_us,
            serialize_us,
        };
        run.steps += 1;
    }
    Ok(())
}
