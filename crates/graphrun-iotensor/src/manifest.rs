use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use graphrun_core::{IoTensorError, IoTensorResult};
use tracing::{debug, error, warn};

/// Separates an optional input name from its path inside one token.
const KEY_SEPARATOR: &str = ":=";
const TOKEN_SEPARATOR: char = ' ';
const HEADER_PREFIX: char = '#';

#[derive(Clone, Copy, Debug, Default)]
pub struct ManifestOptions {
    /// Accept lines whose path count differs from the first data line. Slots are
    /// then neither padded nor truncated and may fall out of step.
    pub allow_ragged: bool,
}

/// Per-input-slot FIFO queues of file paths parsed from one input list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputManifest {
    source: PathBuf,
    slots: Vec<VecDeque<String>>,
}

impl InputManifest {
    pub fn parse(
        source: impl Into<PathBuf>,
        text: &str,
        options: ManifestOptions,
    ) -> IoTensorResult<Self> {
        let source = source.into();
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .peekable();

        if let Some((_, first)) = lines.peek() {
            if first.starts_with(HEADER_PREFIX) {
                lines.next();
            }
        }

        let mut slots: Vec<VecDeque<String>> = Vec::new();
        let mut first_len: Option<usize> = None;
        for (line_idx, line) in lines {
            let paths = parse_line(line);
            let expected = *first_len.get_or_insert(paths.len());
            if expected != paths.len() {
                if !options.allow_ragged {
                    return Err(IoTensorError::RaggedInputList {
                        path: source.clone(),
                        line: line_idx + 1,
                        expected,
                        actual: paths.len(),
                    });
                }
                warn!(
                    input_list = %source.display(),
                    line = line_idx + 1,
                    expected,
                    actual = paths.len(),
                    "ragged input list line, input slots may be misaligned"
                );
            }

            for (idx, path) in paths.into_iter().enumerate() {
                if idx >= slots.len() {
                    slots.push(VecDeque::new());
                }
                slots[idx].push_back(path);
            }
        }

        Ok(Self { source, slots })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn slots(&self) -> &[VecDeque<String>] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of batch steps still queued, taken from the first slot.
    pub fn remaining_steps(&self) -> usize {
        self.slots.first().map_or(0, VecDeque::len)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_steps() == 0
    }

    /// Pops the next path of `slot`, consuming it for this batch step.
    pub fn dequeue(&mut self, slot: usize) -> Option<String> {
        self.slots.get_mut(slot)?.pop_front()
    }
}

pub fn read_input_list(
    path: impl AsRef<Path>,
    options: ManifestOptions,
) -> IoTensorResult<InputManifest> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| {
        error!(input_list = %path.display(), "failed to open input list");
        IoTensorError::InputListUnreadable {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let manifest = InputManifest::parse(path, &text, options)?;
    debug!(
        input_list = %path.display(),
        slots = manifest.slot_count(),
        steps = manifest.remaining_steps(),
        "read input list"
    );
    Ok(manifest)
}

/// Reads one input list per graph, in order. The first failure discards
/// everything read so far.
pub fn read_input_lists<P: AsRef<Path>>(
    paths: &[P],
    options: ManifestOptions,
) -> IoTensorResult<Vec<InputManifest>> {
    paths
        .iter()
        .map(|path| read_input_list(path, options))
        .collect()
}

fn parse_line(line: &str) -> Vec<String> {
    line.split(TOKEN_SEPARATOR)
        .filter(|token| !token.is_empty())
        .map(|token| match token.find(KEY_SEPARATOR) {
            Some(pos) => token[pos + KEY_SEPARATOR.len()..].to_string(),
            None => token.to_string(),
        })
        .collect()
}
