//! Precomputed job embeddings as stored in the vector file.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::corpus::{JobId, JobRecord};
use crate::error::DataError;

/// One job paired with its embedding; the unit the ranker scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobVector {
    /// Stable job identifier.
    pub id: JobId,
    /// Dense embedding of the job posting.
    pub embedding: Vec<f32>,
    /// Full posting the embedding was computed from.
    pub data: JobRecord,
}

/// Value side of the `{id: {embedding, data}}` vector map.
#[derive(Debug, Deserialize)]
struct VectorEntry {
    embedding: Vec<f32>,
    data: JobRecord,
}

/// Map entries in file order; the ranker breaks ties by this order.
/// A repeated id keeps its first position and its last value.
struct OrderedEntries(Vec<(JobId, VectorEntry)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from job id to {embedding, data}")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(JobId, VectorEntry)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                let mut seen: HashMap<JobId, usize> = HashMap::new();
                while let Some((id, entry)) = map.next_entry::<JobId, VectorEntry>()? {
                    match seen.get(&id) {
                        Some(&slot) => {
                            tracing::warn!(
                                job_id = %id,
                                "duplicate job id in vector map; keeping the last entry"
                            );
                            entries[slot].1 = entry;
                        }
                        None => {
                            seen.insert(id.clone(), entries.len());
                            entries.push((id, entry));
                        }
                    }
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Loads job vectors from `path`.
///
/// Files ending in `.jsonl` hold one `{id, embedding, data}` object per line;
/// anything else is read as a single `{id: {embedding, data}}` JSON object.
/// Widths are not checked here; the ranker rejects mismatched entries.
pub fn load_vectors(path: &Path) -> Result<Vec<JobVector>, DataError> {
    let is_jsonl = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
    let vectors = if is_jsonl {
        load_jsonl(path)?
    } else {
        load_map(path)?
    };
    if vectors.is_empty() {
        return Err(DataError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(vectors)
}

fn load_map(path: &Path) -> Result<Vec<JobVector>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let OrderedEntries(entries) =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| DataError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(entries
        .into_iter()
        .map(|(id, entry)| JobVector::new(id, entry.embedding, entry.data))
        .collect())
}

fn load_jsonl(path: &Path) -> Result<Vec<JobVector>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut vectors = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: JobVector = serde_json::from_str(&line).map_err(|source| DataError::Line {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        vectors.push(JobVector::new(record.id, record.embedding, record.data));
    }
    Ok(vectors)
}

impl JobVector {
    /// Pairs an id with its embedding, backfilling the record id when the
    /// embedded posting omits it.
    pub fn new(id: JobId, embedding: Vec<f32>, mut data: JobRecord) -> Self {
        if data.id.is_empty() {
            data.id = id.clone();
        }
        Self {
            id,
            embedding,
            data,
        }
    }

    /// Embedding width.
    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }
}
