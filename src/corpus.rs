//! Job postings and the immutable, reloadable corpus they live in.

use std::borrow::{Borrow, Cow};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use filter_rules::{Field, FieldSource};
use parking_lot::RwLock;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::embeddings::{load_vectors, JobVector};
use crate::error::DataError;

/// Stable job identifier. Accepts JSON strings or integers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    /// Wraps an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrowed identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no id was supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for JobId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = JobId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a job id string or integer")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<JobId, E> {
                Ok(JobId::new(value))
            }

            fn visit_string<E: de::Error>(self, value: String) -> Result<JobId, E> {
                Ok(JobId(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<JobId, E> {
                Ok(JobId(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<JobId, E> {
                Ok(JobId(value.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// One job posting as ingested. Missing or null fields default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRecord {
    /// Identifier assigned at ingestion.
    #[serde(deserialize_with = "null_as_default")]
    pub id: JobId,
    /// Posting title.
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    /// Hiring company.
    #[serde(deserialize_with = "null_as_default")]
    pub company: String,
    /// Free-text description.
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    /// Location as written by the source.
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    /// Employment type (Full Time, Freelance, ...).
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub job_type: String,
    /// Required skills, in source order.
    #[serde(deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    /// Publication date, ISO 8601 (`YYYY-MM-DD`).
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    /// Job board the posting came from.
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
    /// Link to the original posting.
    #[serde(deserialize_with = "null_as_default")]
    pub link: String,
}

impl JobRecord {
    /// Parsed publication date, when the source supplied a valid one.
    pub fn posted_on(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()
    }

    /// Date formatted for display (`07 Mar, 2025`), falling back to the raw text.
    pub fn display_date(&self) -> String {
        match self.posted_on() {
            Some(date) => date.format("%d %b, %Y").to_string(),
            None => self.date.clone(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl FieldSource for JobRecord {
    fn field_text(&self, field: Field) -> Cow<'_, str> {
        match field {
            Field::Title => Cow::Borrowed(&self.title),
            Field::Company => Cow::Borrowed(&self.company),
            Field::Description => Cow::Borrowed(&self.description),
            Field::Location => Cow::Borrowed(&self.location),
            Field::JobType => Cow::Borrowed(&self.job_type),
            Field::Skills => Cow::Owned(self.skills.join(" ")),
            Field::Date => Cow::Borrowed(&self.date),
            Field::Source => Cow::Borrowed(&self.source),
            Field::Link => Cow::Borrowed(&self.link),
        }
    }
}

/// Files the corpus is read from.
#[derive(Debug, Clone)]
pub struct CorpusSource {
    /// Vector store (`.json` map or `.jsonl` rows).
    pub vectors: PathBuf,
    /// Optional listing file; defaults to the postings embedded in the vectors.
    pub jobs: Option<PathBuf>,
}

/// Immutable snapshot of all postings and their embeddings.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    jobs: Vec<JobRecord>,
    vectors: Vec<JobVector>,
}

impl Corpus {
    /// Builds a corpus from vectors, listing the postings they carry.
    pub fn from_vectors(vectors: Vec<JobVector>) -> Self {
        let jobs = vectors.iter().map(|vector| vector.data.clone()).collect();
        Self { jobs, vectors }
    }

    /// Builds a corpus with a separate listing.
    pub fn new(jobs: Vec<JobRecord>, vectors: Vec<JobVector>) -> Self {
        Self { jobs, vectors }
    }

    /// Reads every file named by `source`.
    pub fn load(source: &CorpusSource) -> Result<Self, DataError> {
        let vectors = load_vectors(&source.vectors)?;
        match &source.jobs {
            Some(path) => Ok(Self::new(load_jobs(path)?, vectors)),
            None => Ok(Self::from_vectors(vectors)),
        }
    }

    /// All postings, for browsing.
    pub fn jobs(&self) -> &[JobRecord] {
        &self.jobs
    }

    /// All embedded postings, in file order.
    pub fn vectors(&self) -> &[JobVector] {
        &self.vectors
    }

    /// Number of embedded postings.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True when no postings are embedded.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Reads the listing file: a JSON array of postings.
pub fn load_jobs(path: &Path) -> Result<Vec<JobRecord>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let jobs: Vec<JobRecord> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| DataError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if jobs.is_empty() {
        return Err(DataError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(jobs)
}

/// Explicitly initialised holder of the current corpus snapshot.
///
/// Readers clone the `Arc` and work on an immutable snapshot; `reload`
/// swaps in a fresh one. A failed reload keeps the previous snapshot.
pub struct CorpusStore {
    source: Option<CorpusSource>,
    current: RwLock<Option<Arc<Corpus>>>,
}

impl CorpusStore {
    /// Opens a store backed by files. Load failures are logged and leave the
    /// store empty, so searches report the corpus as unavailable.
    pub fn open(source: CorpusSource) -> Self {
        let store = Self {
            source: Some(source),
            current: RwLock::new(None),
        };
        if let Err(err) = store.reload() {
            tracing::error!("could not load job vectors: {err}");
        }
        store
    }

    /// Wraps an in-memory corpus.
    pub fn from_corpus(corpus: Corpus) -> Self {
        Self {
            source: None,
            current: RwLock::new(Some(Arc::new(corpus))),
        }
    }

    /// A store with nothing loaded.
    pub fn unavailable() -> Self {
        Self {
            source: None,
            current: RwLock::new(None),
        }
    }

    /// Current snapshot, if one loaded successfully.
    pub fn snapshot(&self) -> Option<Arc<Corpus>> {
        self.current.read().clone()
    }

    /// Re-reads the source files and swaps the snapshot on success.
    pub fn reload(&self) -> Result<Arc<Corpus>, DataError> {
        let corpus = self.read_source()?;
        self.install(Arc::clone(&corpus));
        Ok(corpus)
    }

    /// Reads the source files without touching the current snapshot.
    pub fn read_source(&self) -> Result<Arc<Corpus>, DataError> {
        let source = self.source.as_ref().ok_or(DataError::NoSource)?;
        let corpus = Arc::new(Corpus::load(source)?);
        tracing::info!(
            vectors = corpus.len(),
            jobs = corpus.jobs().len(),
            path = %source.vectors.display(),
            "loaded job corpus"
        );
        Ok(corpus)
    }

    /// Makes `corpus` the snapshot new readers see.
    pub fn install(&self, corpus: Arc<Corpus>) {
        *self.current.write() = Some(corpus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn records_accept_partial_postings() {
        let job: JobRecord = serde_json::from_str(
            r#"{"id": 42, "title": "Rust Engineer", "type": "Full Time", "skills": ["Rust", "Tokio"]}"#,
        )
        .expect("parse");
        assert_eq!(job.id.as_str(), "42");
        assert_eq!(job.job_type, "Full Time");
        assert_eq!(job.company, "");
        assert_eq!(job.field_text(Field::Skills), "Rust Tokio");
        assert_eq!(job.field_text(Field::JobType), "Full Time");
    }

    #[test]
    fn null_fields_read_as_empty() {
        let job: JobRecord = serde_json::from_str(
            r#"{"id": null, "title": "Data Analyst", "company": null, "date": null,
                "skills": null, "location": "Remote", "link": null}"#,
        )
        .expect("parse");
        assert_eq!(
            job,
            JobRecord {
                title: "Data Analyst".into(),
                location: "Remote".into(),
                ..JobRecord::default()
            }
        );
        assert_eq!(job.field_text(Field::Skills), "");
        assert_eq!(job.display_date(), "");
    }

    #[test]
    fn display_date_formats_iso_dates() {
        let mut job = JobRecord {
            date: "2025-03-07".into(),
            ..JobRecord::default()
        };
        assert_eq!(job.display_date(), "07 Mar, 2025");
        job.date = "last week".into();
        assert_eq!(job.display_date(), "last week");
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("temp file");
        file.write_all(br#"{"1": {"embedding": [1.0, 0.0], "data": {"title": "A"}}}"#)
            .expect("write");
        let store = CorpusStore::open(CorpusSource {
            vectors: file.path().to_path_buf(),
            jobs: None,
        });
        let first = store.snapshot().expect("loaded");
        assert_eq!(first.len(), 1);

        std::fs::write(file.path(), b"{ broken").expect("overwrite");
        assert!(matches!(store.reload(), Err(DataError::Parse { .. })));
        let after = store.snapshot().expect("still loaded");
        assert!(Arc::ptr_eq(&first, &after));
    }

    #[test]
    fn missing_files_leave_store_unavailable() {
        let store = CorpusStore::open(CorpusSource {
            vectors: PathBuf::from("/nonexistent/job_vectors.json"),
            jobs: None,
        });
        assert!(store.snapshot().is_none());
        assert!(matches!(
            CorpusStore::unavailable().reload(),
            Err(DataError::NoSource)
        ));
    }
}
