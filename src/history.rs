use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Completed translations kept on disk, newest first.
pub const MAX_ENTRIES: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: String,
    pub from: String,
    pub to: String,
    pub original: String,
    pub translated: String,
}

impl HistoryEntry {
    pub fn new(from: &str, to: &str, original: &str, translated: &str) -> Self {
        let now = chrono::Local::now();
        Self {
            id: now.timestamp_millis(),
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            from: from.to_string(),
            to: to.to_string(),
            original: original.to_string(),
            translated: translated.to_string(),
        }
    }
}

pub struct History {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl History {
    fn default_path() -> PathBuf {
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
        let dir = exe.parent().unwrap_or(Path::new("."));
        dir.join("history.json")
    }

    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        Self { path, entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prepends a completed translation, evicting the oldest entry past the cap.
    pub fn add(&mut self, entry: HistoryEntry) -> Result<()> {
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_ENTRIES);
        self.save()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let s = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, s)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry::new("Auto", "en", &format!("in {n}"), &format!("out {n}"))
    }

    #[test]
    fn newest_entry_comes_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = History::load_from(dir.path().join("history.json"));
        history.add(entry(1)).unwrap();
        history.add(entry(2)).unwrap();
        assert_eq!(history.entries()[0].original, "in 2");
        assert_eq!(history.entries()[1].original, "in 1");
    }

    #[test]
    fn caps_at_fifty_entries_evicting_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = History::load_from(dir.path().join("history.json"));
        for n in 0..MAX_ENTRIES + 1 {
            history.add(entry(n)).unwrap();
        }
        assert_eq!(history.entries().len(), MAX_ENTRIES);
        // Entry 0 was the oldest and must be gone.
        assert_eq!(history.entries().last().unwrap().original, "in 1");
        assert_eq!(history.entries()[0].original, format!("in {}", MAX_ENTRIES));
    }

    #[test]
    fn persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        {
            let mut history = History::load_from(path.clone());
            history.add(entry(7)).unwrap();
        }
        let reloaded = History::load_from(path);
        assert_eq!(reloaded.entries().len(), 1);
        assert_eq!(reloaded.entries()[0].translated, "out 7");
    }

    #[test]
    fn clear_removes_entries_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut history = History::load_from(path.clone());
        history.add(entry(1)).unwrap();
        history.clear().unwrap();
        assert!(history.is_empty());
        assert!(!path.exists());
    }
}
