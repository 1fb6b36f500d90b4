use std::ops::AddAssign;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepTimings {
    pub populate_us: u64,
    pub backend_us: u64,
    pub serialize_us: u64,
}

impl AddAssign for StepTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.populate_us += rhs.populate_us;
        self.backend_us += rhs.backend_us;
        self.serialize_us += rhs.serialize_us;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRun {
    pub graph_idx: usize,
    pub label: String,
    pub steps: usize,
    /// Summed over every step of the graph.
    pub timings: StepTimings,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub graphs: Vec<GraphRun>,
}

impl RunSummary {
    pub fn total_steps(&self) -> usize {
        self.graphs.iter().map(|g| g.steps).sum()
    }
}

pub(crate) fn elapsed_us(start: Instant) -> u64 {
    start.elapsed().as_micros() as u64
}
