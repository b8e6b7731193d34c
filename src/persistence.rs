use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::graph::Graph;

/// Receives every committed graph version when backups are enabled.
pub trait PersistenceHook: fmt::Debug + Send + Sync {
    fn on_commit(&self, graph: &Graph) -> Result<()>;
}

/// Writes each version to `{dir}/{graph_id}_{version:06}.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotHook {
    dir: PathBuf,
}

impl FileSnapshotHook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self, graph: &Graph) -> PathBuf {
        self.dir
            .join(format!("{}_{:06}.json", graph.id(), graph.version()))
    }
}

impl PersistenceHook for FileSnapshotHook {
    fn on_commit(&self, graph: &Graph) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| io_err("Failed to create backup directory", err))?;
        save_graph(graph, self.snapshot_path(graph))
    }
}

fn io_err(public: &'static str, err: std::io::Error) -> LibError {
    LibError::persistence(public, anyhow!(err))
}

/// Serializes the whole graph, including its log and graph actions, as JSON.
pub fn save_graph(graph: &Graph, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|err| io_err("Failed to write graph file", err))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, graph).map_err(|err| {
        LibError::persistence(
            "Failed to serialize graph",
            anyhow!(err).context(format!("writing {}", path.display())),
        )
    })?;
    writer
        .flush()
        .map_err(|err| io_err("Failed to write graph file", err))?;
    tracing::debug!(graph_id = %graph.id(), path = %path.display(), "graph saved");
    Ok(())
}

/// Reads a graph written by [`save_graph`] and checks every graph invariant.
pub fn load_graph(path: impl AsRef<Path>) -> Result<Graph> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| io_err("Failed to read graph file", err))?;
    let graph: Graph = serde_json::from_reader(BufReader::new(file))?;
    graph.validate()?;
    Ok(graph)
}
