//! Memo of the last loaded batch, keyed by the uploaded file set.
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::config::Config;
use crate::loader::{load_batch, LoadedBatch, UploadedFile};

/// Identity of an upload set: file names and contents, order-insensitive.
pub fn fingerprint(files: &[UploadedFile]) -> u64 {
    let mut parts: Vec<u64> = files
        .iter()
        .map(|f| {
            let mut h = DefaultHasher::new();
            f.hash(&mut h);
            h.finish()
        })
        .collect();
    parts.sort_unstable();
    let mut h = DefaultHasher::new();
    parts.hash(&mut h);
    h.finish()
}

#[derive(Debug, Default)]
pub struct Session {
    cached: Option<(u64, LoadedBatch)>,
    loads: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The batch for `files`, parsing only when the file set changed.
    pub fn load(&mut self, files: &[UploadedFile], config: &Config) -> &LoadedBatch {
        let key = fingerprint(files);
        if matches!(&self.cached, Some((k, _)) if *k == key) {
            tracing::debug!(key, "upload set unchanged, reusing parsed batch");
        } else {
            self.cached = None;
        }
        let loads = &mut self.loads;
        let (_, batch) = self.cached.get_or_insert_with(|| {
            *loads += 1;
            (key, load_batch(files, config))
        });
        batch
    }

    pub fn batch(&self) -> Option<&LoadedBatch> {
        self.cached.as_ref().map(|(_, b)| b)
    }

    /// Number of times files were actually parsed.
    pub fn loads(&self) -> usize {
        self.loads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_files_are_parsed_once() {
        let cfg = Config::default();
        let a = UploadedFile::new("a.csv", "FILIALE,KONTROLLE\nFil01,OK\n");
        let b = UploadedFile::new("b.csv", "FILIALE,KONTROLLE\nFil02,OK\n");
        let mut session = Session::new();
        session.load(&[a.clone(), b.clone()], &cfg);
        let batch = session.load(&[b.clone(), a.clone()], &cfg);
        assert_eq!(batch.report.regular_rows, 2);
        assert_eq!(session.loads(), 1);
        session.load(&[a], &cfg);
        assert_eq!(session.loads(), 2);
    }
}
