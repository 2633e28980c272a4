use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::FetchError;

/// An animal as it appears in the adjectives table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimalRef {
    pub name: String,
    /// Absolute URL of the animal's article, if the table linked one.
    pub wiki_url: Option<String>,
}

impl AnimalRef {
    pub fn new(name: impl Into<String>, wiki_url: Option<String>) -> Self {
        Self {
            name: name.into(),
            wiki_url,
        }
    }

    /// An animal without an article link.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }
}

/// Adjective → animals, in table row order. Adjectives iterate sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjectiveMapping {
    entries: BTreeMap<String, Vec<AnimalRef>>,
}

impl AdjectiveMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, adjective: String, animal: AnimalRef) {
        self.entries.entry(adjective).or_default().push(animal);
    }

    pub fn get(&self, adjective: &str) -> Option<&[AnimalRef]> {
        self.entries.get(adjective).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AnimalRef])> {
        self.entries
            .iter()
            .map(|(adj, animals)| (adj.as_str(), animals.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every animal once, keyed by name. The first occurrence wins.
    pub fn unique_animals(&self) -> Vec<AnimalRef> {
        let mut seen = HashSet::new();
        self.entries
            .values()
            .flatten()
            .filter(|animal| seen.insert(animal.name.as_str()))
            .cloned()
            .collect()
    }
}

impl FromIterator<(String, AnimalRef)> for AdjectiveMapping {
    fn from_iter<T: IntoIterator<Item = (String, AnimalRef)>>(iter: T) -> Self {
        let mut mapping = Self::new();
        for (adjective, animal) in iter {
            mapping.push(adjective, animal);
        }
        mapping
    }
}

/// Where an animal's image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    Pending,
    /// Already on disk before this run asked for it.
    Cached(PathBuf),
    /// Downloaded and written by this run.
    Fetched(PathBuf),
    Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimalRecord {
    pub name: String,
    pub image_source_url: Option<String>,
    pub status: ImageStatus,
}

impl AnimalRecord {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_source_url: None,
            status: ImageStatus::Pending,
        }
    }

    pub fn cached(name: impl Into<String>, source: Option<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            image_source_url: source,
            status: ImageStatus::Cached(path),
        }
    }

    pub fn fetched(name: impl Into<String>, source: String, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            image_source_url: Some(source),
            status: ImageStatus::Fetched(path),
        }
    }

    pub fn failed(name: impl Into<String>, source: Option<String>, err: FetchError) -> Self {
        Self {
            name: name.into(),
            image_source_url: source,
            status: ImageStatus::Failed(err),
        }
    }

    /// Set exactly when the status is `Cached` or `Fetched`.
    pub fn local_image_path(&self) -> Option<&Path> {
        match &self.status {
            ImageStatus::Cached(path) | ImageStatus::Fetched(path) => Some(path),
            ImageStatus::Pending | ImageStatus::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.status {
            ImageStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, ImageStatus::Pending)
    }
}
