//! In-process distributed collection engine
//!
//! Partitions are plain vectors processed on a dedicated rayon pool. The
//! engine offers the bulk primitives evaluation needs and nothing about
//! scheduling leaks out of it.

mod collection;
mod errors;
mod frame;
mod source;

pub use collection::{Collection, PairCollection};
pub use errors::{ClusterError, ClusterResult};
pub use frame::{DataFrame, RowKind};

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::errors::EngineResult;
use crate::item::Item;
use crate::observability::Logger;

/// Handle to the worker pool and partitioning defaults
#[derive(Clone)]
pub struct Cluster {
    pool: Arc<ThreadPool>,
    default_partitions: usize,
}

impl Cluster {
    /// Builds the worker pool; zero threads means one per core
    ///
    /// Every worker logs through `logger`.
    pub fn new(
        worker_threads: usize,
        default_partitions: usize,
        logger: Logger,
    ) -> ClusterResult<Self> {
        if default_partitions == 0 {
            return Err(ClusterError::InvalidPartitions);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|i| format!("tidequery-worker-{i}"))
            .start_handler(move |_| logger.attach_for_thread())
            .build()
            .map_err(|e| ClusterError::Pool(e.to_string()))?;

        Ok(Self {
            pool: Arc::new(pool),
            default_partitions,
        })
    }

    /// Runs `f` with this pool as the ambient rayon pool
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(f)
    }

    pub fn default_partitions(&self) -> usize {
        self.default_partitions
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Distributes local items over the default partition count
    pub fn parallelize(&self, items: Vec<Item>, partitions: Option<usize>) -> Collection<Item> {
        Collection::parallelize(items, partitions.unwrap_or(self.default_partitions))
    }

    /// Reads a text file as one record per line
    pub fn text_file(
        &self,
        location: &str,
        partitions: Option<usize>,
    ) -> ClusterResult<Collection<String>> {
        let partitions = partitions.unwrap_or(self.default_partitions);
        self.pool.install(|| source::text_file(location, partitions))
    }

    /// Reads a JSON-lines file as one item per non-blank line
    pub fn json_file(
        &self,
        location: &str,
        partitions: Option<usize>,
    ) -> EngineResult<Collection<Item>> {
        let partitions = partitions.unwrap_or(self.default_partitions);
        self.pool.install(|| source::json_lines(location, partitions))
    }

    /// Reads JSON lines of objects into a columnar frame
    pub fn structured_json_file(&self, location: &str) -> EngineResult<DataFrame> {
        let rows = self.json_file(location, None)?;
        self.pool.install(|| DataFrame::from_objects(&rows))
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("worker_threads", &self.worker_threads())
            .field("default_partitions", &self.default_partitions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Severity;

    #[test]
    fn test_zero_partitions_rejected() {
        assert!(matches!(
            Cluster::new(1, 0, Logger::default()),
            Err(ClusterError::InvalidPartitions)
        ));
    }

    #[test]
    fn test_parallelize_uses_default_partitions() {
        let cluster = Cluster::new(2, 3, Logger::default()).unwrap();
        let c = cluster.parallelize((0..9).map(Item::Integer).collect(), None);
        assert_eq!(c.num_partitions(), 3);
        assert_eq!(cluster.install(|| c.count()), 9);
    }

    #[test]
    fn test_workers_use_cluster_logger() {
        let quiet = Cluster::new(2, 2, Logger::new(Severity::Error)).unwrap();
        let verbose = Cluster::new(2, 2, Logger::new(Severity::Trace)).unwrap();
        assert_eq!(quiet.install(|| Logger::current().min_severity()), Severity::Error);
        assert_eq!(verbose.install(|| Logger::current().min_severity()), Severity::Trace);
    }

    #[test]
    fn test_sources_use_requested_partitions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..6 {
            std::io::Write::write_all(&mut file, format!("{{\"n\": {}}}\n", i).as_bytes()).unwrap();
        }
        let location = file.path().to_str().unwrap();
        let cluster = Cluster::new(2, 3, Logger::default()).unwrap();

        assert_eq!(cluster.text_file(location, None).unwrap().num_partitions(), 3);
        assert_eq!(cluster.json_file(location, Some(2)).unwrap().num_partitions(), 2);

        let frame = cluster.structured_json_file(location).unwrap();
        assert_eq!(frame.columns(), &["n"]);
        assert_eq!(frame.count(), 6);
    }
}
