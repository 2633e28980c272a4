use std::collections::{hash_map::Entry, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{info, warn};

use crate::cache::{sanitize, CacheStore};
use crate::config::Config;
use crate::fetch::ImageFetcher;
use crate::model::{AnimalRecord, AnimalRef, ImageStatus};
use crate::parse::parse_adjective_table;
use crate::render::write_report;
use crate::request::{build_client, request_page_html};
use crate::resolve::{SourceResolver, WikiImageResolver};
use crate::{info_time, Error, FailureKind, FetchError, Result};

/// Runs the whole pipeline: load the article, parse the table, fetch every image,
/// render the report. Returns the path of the written report.
pub async fn process_site(config: &Config) -> Result<PathBuf> {
    let start_time = Local::now();
    let client = build_client(config)?;

    info!(source = %config.source, "Scraping data from Wikipedia");
    let html = load_source(&client, config).await?;
    let page_url = config.source_is_remote().then(|| config.source.clone());
    let mapping = parse_adjective_table(html, page_url).await?;
    if mapping.is_empty() {
        return Err(Error::Extraction("the adjective table has no usable rows".into()));
    }
    info_time!(start_time, "Extracted {} adjectives", mapping.len());

    let fetch_time = Local::now();
    let cache = CacheStore::open(&config.image_dir)?;
    let fetcher = Arc::new(
        ImageFetcher::new(client.clone(), cache, config.min_image_bytes)
            .with_max_image_bytes(config.max_image_bytes),
    );
    let coordinator = Coordinator::new(fetcher, config.concurrency);
    let resolver = Arc::new(WikiImageResolver::new(client));
    let records = coordinator
        .fetch_all(mapping.unique_animals(), resolver)
        .await;

    let summary = BatchSummary::from_records(&records);
    info_time!(
        fetch_time,
        "Images done: {} fetched, {} cached, {} failed",
        summary.fetched,
        summary.cached,
        summary.failed
    );
    ensure_storage_healthy(&records, &config.image_dir)?;

    let output = write_report(&mapping, &records, &config.output).await?;
    info_time!(start_time, "Done. HTML saved to: {}", output.display());
    Ok(output)
}

async fn load_source(client: &reqwest::Client, config: &Config) -> Result<String> {
    if config.source_is_remote() {
        Ok(request_page_html(client, &config.source).await?)
    } else {
        Ok(tokio::fs::read_to_string(&config.source).await?)
    }
}

/// Fans image fetches out over a bounded number of concurrent tasks.
pub struct Coordinator {
    fetcher: Arc<ImageFetcher>,
    limit: usize,
}

impl Coordinator {
    /// `limit` is the maximum number of fetches in flight. Zero is treated as one.
    pub fn new(fetcher: Arc<ImageFetcher>, limit: usize) -> Self {
        Self {
            fetcher,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fetches one image per cache file and waits for all of them.
    ///
    /// Every requested name ends up in the returned map in a terminal state. Names that
    /// sanitize to the same file stem share one fetch and one record. Failures are
    /// recorded on their animal and never cancel the other fetches. Cached animals
    /// are answered without taking a concurrency slot or resolving a source.
    pub async fn fetch_all<I>(
        &self,
        animals: I,
        resolver: Arc<dyn SourceResolver>,
    ) -> HashMap<String, AnimalRecord>
    where
        I: IntoIterator<Item = AnimalRef>,
    {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        // Stem -> the first name seen with it. Later names with that stem are aliases.
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut aliases = Vec::new();
        let mut names = Vec::new();
        let mut task_set = JoinSet::new();

        for animal in animals {
            match owners.entry(sanitize(&animal.name)) {
                Entry::Occupied(owner) => {
                    if *owner.get() != animal.name {
                        aliases.push((animal.name, owner.get().clone()));
                    }
                    continue;
                }
                Entry::Vacant(slot) => {
                    slot.insert(animal.name.clone());
                }
            }
            names.push(animal.name.clone());

            task_set.spawn({
                // `ImageFetcher` and the resolver sit behind `Arc`s, cloning is cheap.
                let fetcher = Arc::clone(&self.fetcher);
                let resolver = Arc::clone(&resolver);
                let semaphore = Arc::clone(&semaphore);
                async move { fetch_one(animal, fetcher, resolver, semaphore).await }
            });
        }

        let mut records = HashMap::with_capacity(names.len());
        while let Some(task) = task_set.join_next().await {
            match task {
                Ok(record) => {
                    records.insert(record.name.clone(), record);
                }
                Err(e) => warn!(error = %e, "Fetch task didn't finish"),
            }
        }

        // A panicked task loses its record, account for it by name.
        for name in names {
            records.entry(name.clone()).or_insert_with(|| {
                AnimalRecord::failed(
                    name.clone(),
                    None,
                    FetchError::Aborted {
                        name,
                        message: "task panicked or was cancelled".into(),
                    },
                )
            });
        }

        for (alias, owner) in aliases {
            if records.contains_key(&alias) {
                continue;
            }
            if let Some(record) = records.get(&owner) {
                let record = AnimalRecord {
                    name: alias.clone(),
                    ..record.clone()
                };
                records.insert(alias, record);
            }
        }
        records
    }
}

async fn fetch_one(
    animal: AnimalRef,
    fetcher: Arc<ImageFetcher>,
    resolver: Arc<dyn SourceResolver>,
    semaphore: Arc<Semaphore>,
) -> AnimalRecord {
    if let Some(path) = fetcher.cache().lookup(&animal.name).await {
        info!(animal = %animal.name, path = %path.display(), "Image already cached");
        return AnimalRecord::cached(animal.name, None, path);
    }

    // The semaphore is never closed.
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            let message = e.to_string();
            return AnimalRecord::failed(
                animal.name.clone(),
                None,
                FetchError::Aborted {
                    name: animal.name,
                    message,
                },
            );
        }
    };

    let source = match resolver.resolve(&animal).await {
        Ok(source) => source,
        Err(e) => {
            warn!(animal = %animal.name, wiki_url = ?animal.wiki_url, error = %e, "Couldn't resolve an image");
            return AnimalRecord::failed(animal.name, None, e);
        }
    };

    match fetcher.fetch(&animal.name, &source).await {
        Ok(record) => record,
        Err(e) => {
            warn!(animal = %animal.name, url = %source, kind = ?e.kind(), error = %e, "Image fetch failed");
            AnimalRecord::failed(animal.name, Some(source), e)
        }
    }
}

/// Counts per terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub cached: usize,
    pub fetched: usize,
    pub failed: usize,
    pub storage_failures: usize,
}

impl BatchSummary {
    pub fn from_records(records: &HashMap<String, AnimalRecord>) -> Self {
        records
            .values()
            .fold(Self::default(), |mut summary, record| {
                match &record.status {
                    ImageStatus::Cached(_) => summary.cached += 1,
                    ImageStatus::Fetched(_) => summary.fetched += 1,
                    ImageStatus::Failed(e) => {
                        summary.failed += 1;
                        if e.kind() == FailureKind::Storage {
                            summary.storage_failures += 1;
                        }
                    }
                    ImageStatus::Pending => {}
                }
                summary
            })
    }

    /// Writes that were attempted: successes plus writes that failed on storage.
    pub fn attempted_writes(&self) -> usize {
        self.fetched + self.storage_failures
    }
}

/// Escalates to [`Error::StorageExhausted`] when storage failures repeat and nothing was
/// written: no image was fetched, at least two writes failed and storage errors make up
/// most of the failures. That points at the cache directory (full disk, no permissions)
/// rather than at single images. A lone storage error stays on its animal.
pub fn ensure_storage_healthy(
    records: &HashMap<String, AnimalRecord>,
    dir: impl Into<PathBuf>,
) -> Result<()> {
    let summary = BatchSummary::from_records(records);
    let repeated = summary.storage_failures >= 2;
    let dominant = summary.storage_failures * 2 > summary.failed;
    if summary.fetched == 0 && repeated && dominant {
        return Err(Error::StorageExhausted {
            dir: dir.into(),
            attempted: summary.attempted_writes(),
        });
    }
    Ok(())
}
