//! External source ingestion
//!
//! Sources are line-oriented local files, addressed by a plain path or a
//! `file://` URL. Other schemes are rejected.

use std::fs;
use std::path::{Path, PathBuf};

use super::collection::Collection;
use super::errors::{ClusterError, ClusterResult};
use crate::errors::EngineResult;
use crate::item::{parse_json_line, Item};
use crate::observability::{log_event_with_fields, Event};

/// Turns a source reference into a local path
pub fn resolve_path(location: &str) -> ClusterResult<PathBuf> {
    let path = match location.split_once("://") {
        Some(("file", rest)) => rest,
        Some(_) => return Err(ClusterError::UnsupportedScheme(location.to_string())),
        None => location,
    };
    let path = Path::new(path);
    if !path.is_file() {
        return Err(ClusterError::NotFound(location.to_string()));
    }
    Ok(path.to_path_buf())
}

/// Reads a text file as a collection of lines
pub fn text_file(location: &str, partitions: usize) -> ClusterResult<Collection<String>> {
    let path = resolve_path(location)?;
    let content = fs::read_to_string(&path).map_err(|e| ClusterError::Io {
        path: location.to_string(),
        message: e.to_string(),
    })?;

    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    let records = lines.len().to_string();
    let collection = Collection::parallelize(lines, partitions);

    log_event_with_fields(
        Event::SourceIngested,
        &[
            ("location", location),
            ("partitions", &collection.num_partitions().to_string()),
            ("records", &records),
        ],
    );
    Ok(collection)
}

/// Reads a JSON-lines file; blank lines are skipped
pub fn json_lines(location: &str, partitions: usize) -> EngineResult<Collection<Item>> {
    let lines = text_file(location, partitions)?;
    lines.flat_map(|line| {
        if line.trim().is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![parse_json_line(line)?])
        }
    })
}
