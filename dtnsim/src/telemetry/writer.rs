use super::{
    snapshot::{StateRecord, COLUMNS},
    TelemetryError,
};
use dtnsim_core::NodeId;
use std::{
    collections::HashMap,
    fs::{self, File},
    path::{Path, PathBuf},
};

/// The per-node output streams of the telemetry loop.
///
/// One CSV file per attached node, named `<prefix>_<node>.csv` under the
/// output directory. Files are created (truncated) at construction and
/// the header row is written immediately, so a run that samples nothing
/// still leaves well-formed, empty tables behind.
pub(crate) struct NodeWriters {
    paths: HashMap<NodeId, PathBuf>,
    writers: HashMap<NodeId, csv::Writer<File>>,
}

impl NodeWriters {
    pub(crate) fn create(
        outdir: &Path,
        prefix: &str,
        nodes: &[NodeId],
    ) -> Result<Self, TelemetryError> {
        fs::create_dir_all(outdir)?;

        let mut paths = HashMap::new();
        let mut writers = HashMap::new();

        for nid in nodes {
            let path = outdir.join(format!("{prefix}_{nid}.csv"));

            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(File::create(&path)?);
            writer.write_record(COLUMNS)?;
            writer.flush()?;

            paths.insert(nid.clone(), path);
            writers.insert(nid.clone(), writer);
        }

        Ok(Self { paths, writers })
    }

    /// Append one record to the node's stream and flush it, so partial
    /// runs leave complete rows behind.
    pub(crate) fn append(
        &mut self,
        nid: &NodeId,
        record: &StateRecord,
    ) -> Result<(), TelemetryError> {
        if let Some(writer) = self.writers.get_mut(nid) {
            writer.serialize(record)?;
            writer.flush()?;
        }
        Ok(())
    }

    pub(crate) fn path(&self, nid: &NodeId) -> Option<&Path> {
        self.paths.get(nid).map(PathBuf::as_path)
    }
}
