use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::Local;
use tracing::info;

use crate::error::Error;
use crate::reddit::SourceItem;

/// Backing storage for the processed-post history. The file format is
/// line 1 = date (`YYYY-MM-DD`), then one post id per line.
pub trait HistoryStore {
    fn load(&self) -> io::Result<Option<String>>;
    /// Replaces the whole file with just the given date line.
    fn reset(&self, date: &str) -> io::Result<()>;
    /// Appends one id line. Never touches the date line.
    fn append(&self, id: &str) -> io::Result<()>;
}

pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistoryStore for HistoryFile {
    fn load(&self) -> io::Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&self.path).map(Some)
    }

    fn reset(&self, date: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{date}\n"))
    }

    fn append(&self, id: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{id}")
    }
}

/// Tracks which posts were already processed today. The set is valid only
/// for the date stored in the first line; `unseen` rolls the file over
/// before any membership lookup.
pub struct DedupStore<S> {
    store: S,
}

impl<S: HistoryStore> DedupStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the candidates not yet processed today, preserving their
    /// order. Fails with [`Error::Exhausted`] when every candidate has been
    /// seen, so callers can tell "fetched but all seen" from "nothing
    /// fetched".
    pub fn unseen(&self, candidates: Vec<SourceItem>) -> Result<Vec<SourceItem>, Error> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let mut seen = HashSet::new();

        match self.store.load()? {
            Some(content) if !content.trim().is_empty() => {
                let mut lines = content.lines();
                let file_date = lines.next().unwrap_or("");
                if file_date == today {
                    for id in lines.filter(|l| !l.is_empty()) {
                        seen.insert(id.to_string());
                    }
                } else {
                    info!("history file is from {file_date}, starting a fresh day");
                    self.store.reset(&today)?;
                }
            }
            _ => self.store.reset(&today)?,
        }

        let unseen: Vec<SourceItem> = candidates
            .into_iter()
            .filter(|post| !seen.contains(&post.id))
            .collect();

        if unseen.is_empty() {
            return Err(Error::Exhausted);
        }
        Ok(unseen)
    }

    /// Records one processed id. Only call this after the post has actually
    /// been published; recording earlier would suppress a legitimate retry
    /// after a mid-pipeline failure.
    pub fn record(&self, id: &str) -> Result<(), Error> {
        self.store.append(id)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MemoryHistory;
    use super::*;

    fn post(id: &str) -> SourceItem {
        SourceItem {
            id: id.to_string(),
            title: format!("title {id}"),
            body: "body".to_string(),
            url: format!("https://www.reddit.com/r/test/{id}"),
            author: "author".to_string(),
        }
    }

    fn today() -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }

    #[test]
    fn missing_file_is_created_and_everything_is_unseen() {
        let store = DedupStore::new(MemoryHistory::new(None));
        let unseen = store.unseen(vec![post("a"), post("b")]).unwrap();
        assert_eq!(unseen.len(), 2);
        assert_eq!(store.store.content().unwrap(), format!("{}\n", today()));
    }

    #[test]
    fn stale_date_clears_the_recorded_set() {
        let history = MemoryHistory::new(Some("2000-01-01\na\nb\n"));
        let store = DedupStore::new(history);
        let unseen = store.unseen(vec![post("a"), post("b")]).unwrap();
        // After rollover, previously recorded ids are unseen again.
        assert_eq!(unseen.len(), 2);
        assert_eq!(store.store.content().unwrap(), format!("{}\n", today()));
    }

    #[test]
    fn same_day_entries_are_filtered_in_candidate_order() {
        let history = MemoryHistory::new(Some(&format!("{}\nb\n", today())));
        let store = DedupStore::new(history);
        let unseen = store.unseen(vec![post("a"), post("b"), post("c")]).unwrap();
        let ids: Vec<&str> = unseen.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[test]
    fn all_seen_is_exhausted_not_an_empty_success() {
        let history = MemoryHistory::new(Some(&format!("{}\na\n", today())));
        let store = DedupStore::new(history);
        let result = store.unseen(vec![post("a")]);
        assert!(matches!(result, Err(Error::Exhausted)));
    }

    #[test]
    fn record_appends_without_rewriting_the_date_line() {
        let history = MemoryHistory::new(Some(&format!("{}\na\n", today())));
        let store = DedupStore::new(history);
        store.record("b").unwrap();
        store.record("c").unwrap();
        assert_eq!(store.store.content().unwrap(), format!("{}\na\nb\nc\n", today()));
    }

    #[test]
    fn history_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = HistoryFile::new(dir.path().join("processedPosts.txt"));
        assert!(file.load().unwrap().is_none());

        file.reset("2026-08-04").unwrap();
        file.append("abc123").unwrap();
        assert_eq!(file.load().unwrap().unwrap(), "2026-08-04\nabc123\n");
    }
}
