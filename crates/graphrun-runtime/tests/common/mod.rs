#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, ensure, Context, Result};
use graphrun_core::{
    Backend, BackendCapabilities, GraphSpec, OpPackage, ProfilingLevel, TensorBuffer,
};

/// Shared record of every backend call, readable after the backend is dropped.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub struct LoopGraph {
    idx: usize,
    finalized: bool,
}

/// Copies input `i` into output `i` on every execute and records each call.
pub struct LoopbackBackend {
    pub log: CallLog,
    pub graphs: Vec<GraphSpec>,
    pub caps: BackendCapabilities,
    /// Call name (as logged, without arguments) that should fail.
    pub fail_on: Option<&'static str>,
    pub device_supported: bool,
}

impl LoopbackBackend {
    pub fn new(graphs: Vec<GraphSpec>) -> (Self, CallLog) {
        let log = CallLog::default();
        let backend = Self {
            log: log.clone(),
            graphs,
            caps: BackendCapabilities {
                supports_device_properties: true,
                supports_profiling: true,
            },
            fail_on: None,
            device_supported: true,
        };
        (backend, log)
    }

    fn call(&self, name: &'static str, detail: impl std::fmt::Display) -> Result<()> {
        let detail = detail.to_string();
        self.log.borrow_mut().push(if detail.is_empty() {
            name.to_string()
        } else {
            format!("{name}:{detail}")
        });
        if self.fail_on == Some(name) {
            bail!("injected {name} failure");
        }
        Ok(())
    }
}

impl Backend for LoopbackBackend {
    type Device = u32;
    type Profile = ProfilingLevel;
    type Context = u32;
    type Graph = LoopGraph;

    fn name(&self) -> &'static str {
        "loopback"
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.caps
    }

    fn initialize(&mut self) -> Result<()> {
        self.call("initialize", "")
    }

    fn terminate(&mut self) -> Result<()> {
        self.call("terminate", "")
    }

    fn register_op_package(&mut self, package: &OpPackage) -> Result<()> {
        self.call("register_op_package", &package.path)
    }

    fn create_device(&mut self) -> Result<Option<u32>> {
        self.call("create_device", "")?;
        Ok(self.device_supported.then_some(7))
    }

    fn free_device(&mut self, device: u32) -> Result<()> {
        self.call("free_device", device)
    }

    fn create_profile(&mut self, level: ProfilingLevel) -> Result<ProfilingLevel> {
        self.call("create_profile", level)?;
        Ok(level)
    }

    fn free_profile(&mut self, level: ProfilingLevel) -> Result<()> {
        self.call("free_profile", level)
    }

    fn create_context(&mut self, device: Option<&u32>) -> Result<u32> {
        let device = device.map(u32::to_string).unwrap_or_else(|| "none".into());
        self.call("create_context", device)?;
        Ok(1)
    }

    fn free_context(&mut self, _context: u32) -> Result<()> {
        self.call("free_context", "")
    }

    fn compose_graphs(&mut self, _context: &mut u32) -> Result<Vec<(GraphSpec, LoopGraph)>> {
        self.call("compose_graphs", "")?;
        Ok(self
            .graphs
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                let graph = LoopGraph {
                    idx,
                    finalized: false,
                };
                (spec.clone(), graph)
            })
            .collect())
    }

    fn finalize_graph(&mut self, graph: &mut LoopGraph, profile: Option<&ProfilingLevel>) -> Result<()> {
        let detail = match profile {
            Some(level) => format!("{}+{level}", graph.idx),
            None => graph.idx.to_string(),
        };
        self.call("finalize_graph", detail)?;
        graph.finalized = true;
        Ok(())
    }

    fn execute_graph(
        &mut self,
        graph: &mut LoopGraph,
        inputs: &[TensorBuffer],
        outputs: &mut [TensorBuffer],
        _profile: Option<&ProfilingLevel>,
    ) -> Result<()> {
        self.call("execute_graph", graph.idx)?;
        ensure!(graph.finalized, "graph {} executed before finalize", graph.idx);
        for (out, input) in outputs.iter_mut().zip(inputs) {
            out.copy_from(input.as_bytes())?;
        }
        Ok(())
    }

    fn free_graph(&mut self, graph: LoopGraph) -> Result<()> {
        self.call("free_graph", graph.idx)
    }

    /// Reads back the graph names written by `save_binary`, one per line.
    fn create_from_binary(
        &mut self,
        path: &Path,
        _device: Option<&u32>,
        _profile: Option<&ProfilingLevel>,
    ) -> Result<(u32, Vec<(GraphSpec, LoopGraph)>)> {
        self.call("create_from_binary", "")?;
        let names = fs::read_to_string(path)?;
        let graphs = names
            .lines()
            .enumerate()
            .map(|(idx, name)| {
                let spec = self
                    .graphs
                    .iter()
                    .find(|spec| spec.name == name)
                    .with_context(|| format!("unknown graph {name} in binary"))?;
                let spec = GraphSpec {
                    index: idx,
                    ..spec.clone()
                };
                Ok((spec, LoopGraph { idx, finalized: true }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((2, graphs))
    }

    fn save_binary(&mut self, _context: &u32, path: &Path) -> Result<()> {
        self.call("save_binary", "")?;
        let names: Vec<&str> = self.graphs.iter().map(|spec| spec.name.as_str()).collect();
        fs::write(path, names.join("\n"))?;
        Ok(())
    }
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.borrow().clone()
}

pub fn count(log: &CallLog, call: &str) -> usize {
    log.borrow().iter().filter(|c| c.as_str() == call).count()
}
