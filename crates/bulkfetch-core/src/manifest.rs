//! Manifest reader: CSV records of `identifier,url` turned into download tasks.
//!
//! The reader is a lazy, finite iterator. The first error it yields is fatal
//! for the whole batch; after it, the iterator is exhausted.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::task::{DownloadTask, IdentifierError};

/// Minimum number of fields per record (identifier, URL).
pub const MIN_FIELDS: usize = 2;

/// Errors that abort the batch while reading the manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot open manifest {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest read failed at record {record}")]
    Read {
        record: u64,
        #[source]
        source: csv::Error,
    },
    #[error("record {record} has {found} field(s), expected at least 2")]
    TooFewFields { record: u64, found: usize },
    #[error("record {record} has an invalid identifier")]
    Identifier {
        record: u64,
        #[source]
        source: IdentifierError,
    },
}

/// How manifest records are filtered before they become tasks.
#[derive(Debug, Clone)]
pub struct ManifestOptions {
    /// Discard the first record as a header.
    pub skip_header: bool,
    /// Drop records whose identifier starts with this prefix. `None` or an
    /// empty string excludes nothing.
    pub exclude_prefix: Option<String>,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            skip_header: true,
            exclude_prefix: None,
        }
    }
}

impl ManifestOptions {
    fn excludes(&self, identifier: &str) -> bool {
        match self.exclude_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => identifier.starts_with(prefix),
            _ => false,
        }
    }
}

/// Iterator over the download tasks of a manifest.
pub struct Manifest<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    options: ManifestOptions,
    /// 1-based number of the last record read, header included.
    record: u64,
    excluded: u64,
    failed: bool,
}

impl Manifest<File> {
    /// Opens a manifest file. Failure to open is fatal.
    pub fn open(path: &Path, options: ManifestOptions) -> Result<Self, ManifestError> {
        let file = File::open(path).map_err(|source| ManifestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(file, options))
    }
}

impl<R: Read> Manifest<R> {
    pub fn from_reader(reader: R, options: ManifestOptions) -> Self {
        let records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_records();
        Self {
            records,
            options,
            record: 0,
            excluded: 0,
            failed: false,
        }
    }

    /// Records dropped so far by the exclusion prefix.
    pub fn excluded(&self) -> u64 {
        self.excluded
    }

    fn parse(&mut self, record: csv::StringRecord) -> Option<Result<DownloadTask, ManifestError>> {
        if record.len() < MIN_FIELDS {
            return Some(Err(ManifestError::TooFewFields {
                record: self.record,
                found: record.len(),
            }));
        }
        let identifier = &record[0];
        let url = &record[1];

        // Length is checked before exclusion: a short identifier is fatal even
        // when the prefix filter would have dropped it.
        let task = match DownloadTask::new(identifier, url) {
            Ok(task) => task,
            Err(source) => {
                return Some(Err(ManifestError::Identifier {
                    record: self.record,
                    source,
                }))
            }
        };
        if self.options.excludes(task.identifier()) {
            self.excluded += 1;
            return None;
        }
        Some(Ok(task))
    }
}

impl<R: Read> Iterator for Manifest<R> {
    type Item = Result<DownloadTask, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(source) => {
                    self.failed = true;
                    return Some(Err(ManifestError::Read {
                        record: self.record + 1,
                        source,
                    }));
                }
            };
            self.record += 1;
            if self.record == 1 && self.options.skip_header {
                continue;
            }
            match self.parse(record) {
                Some(Ok(task)) => return Some(Ok(task)),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(data: &str, options: ManifestOptions) -> Vec<Result<DownloadTask, ManifestError>> {
        Manifest::from_reader(data.as_bytes(), options).collect()
    }

    fn ids(results: &[Result<DownloadTask, ManifestError>]) -> Vec<&str> {
        results
            .iter()
            .map(|r| r.as_ref().unwrap().identifier())
            .collect()
    }

    #[test]
    fn skips_header_by_default() {
        let data = "ImageID,OriginalURL\nab12,http://h/1\ncd34,http://h/2\n";
        let tasks = read(data, ManifestOptions::default());
        assert_eq!(ids(&tasks), vec!["ab12", "cd34"]);
        let first = tasks[0].as_ref().unwrap();
        assert_eq!(first.url(), "http://h/1");
        assert_eq!(first.shard(), "ab");
    }

    #[test]
    fn keeps_first_record_without_header_skip() {
        let data = "ab12,http://h/1\ncd34,http://h/2\n";
        let options = ManifestOptions {
            skip_header: false,
            ..Default::default()
        };
        assert_eq!(ids(&read(data, options)), vec!["ab12", "cd34"]);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let data = "ab12,http://h/1,extra,more\n";
        let options = ManifestOptions {
            skip_header: false,
            ..Default::default()
        };
        let tasks = read(data, options);
        assert_eq!(tasks[0].as_ref().unwrap().url(), "http://h/1");
    }

    #[test]
    fn quoted_fields_and_whitespace() {
        let data = "id,url\n\"ab,12\",\"http://h/a?x=1,2\"\n  cd34 ,  http://h/b  \n";
        let tasks = read(data, ManifestOptions::default());
        let task = tasks[0].as_ref().unwrap();
        assert_eq!(task.identifier(), "ab,12");
        assert_eq!(task.url(), "http://h/a?x=1,2");
        let task = tasks[1].as_ref().unwrap();
        assert_eq!(task.identifier(), "cd34");
        assert_eq!(task.url(), "http://h/b");
    }

    #[test]
    fn exclusion_prefix_drops_records() {
        let data = "0a11,u1\n1b22,u2\n0c33,u3\n";
        let mut manifest = Manifest::from_reader(
            data.as_bytes(),
            ManifestOptions {
                skip_header: false,
                exclude_prefix: Some("0".to_string()),
            },
        );
        let tasks: Vec<_> = manifest.by_ref().collect();
        assert_eq!(ids(&tasks), vec!["1b22"]);
        assert_eq!(manifest.excluded(), 2);
    }

    #[test]
    fn empty_prefix_excludes_nothing() {
        let data = "0a11,u1\n1b22,u2\n";
        let options = ManifestOptions {
            skip_header: false,
            exclude_prefix: Some(String::new()),
        };
        assert_eq!(ids(&read(data, options)), vec!["0a11", "1b22"]);
    }

    #[test]
    fn single_field_record_is_fatal_and_stops() {
        let data = "ab12,u1\nlonely\ncd34,u3\n";
        let options = ManifestOptions {
            skip_header: false,
            ..Default::default()
        };
        let results = read(data, options);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(ManifestError::TooFewFields { record, found }) => {
                assert_eq!(*record, 2);
                assert_eq!(*found, 1);
            }
            other => panic!("expected TooFewFields, got {:?}", other),
        }
    }

    #[test]
    fn short_identifier_is_fatal_even_if_excluded() {
        let data = "id,url\nab12,u1\nx,u2\ncd34,u3\n";
        let options = ManifestOptions {
            skip_header: true,
            exclude_prefix: Some("x".to_string()),
        };
        let results = read(data, options);
        assert_eq!(results.len(), 2);
        match &results[1] {
            Err(ManifestError::Identifier { record, source }) => {
                assert_eq!(*record, 3);
                assert_eq!(*source, IdentifierError::TooShort("x".to_string()));
            }
            other => panic!("expected Identifier error, got {:?}", other),
        }
    }

    #[test]
    fn open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::open(&dir.path().join("nope.csv"), ManifestOptions::default())
            .err()
            .expect("open should fail");
        assert!(matches!(err, ManifestError::Open { .. }));
    }
}
