use std::path::PathBuf;
use std::time::Duration;

use crate::{
    DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS, IMAGE_DIR, MAX_IMAGE_BYTES, MIN_IMAGE_BYTES,
    OUTPUT_PATH, USER_AGENT, WIKI_URL,
};

/// Everything a run needs. The cache directory is passed explicitly, there is no global one.
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the article, or a path to a saved HTML snapshot of it.
    pub source: String,
    pub image_dir: PathBuf,
    pub output: PathBuf,
    /// Maximum number of image fetches in flight.
    pub concurrency: usize,
    /// Applies to every single request.
    pub request_timeout: Duration,
    pub min_image_bytes: usize,
    pub max_image_bytes: usize,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: WIKI_URL.to_string(),
            image_dir: PathBuf::from(IMAGE_DIR),
            output: PathBuf::from(OUTPUT_PATH),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            min_image_bytes: MIN_IMAGE_BYTES,
            max_image_bytes: MAX_IMAGE_BYTES,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// `true` when `source` should be fetched over HTTP(S) rather than read from disk.
    pub fn source_is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_wikipedia() {
        let config = Config::default();
        assert!(config.source_is_remote());
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);

        let local = Config {
            source: "snapshots/list_of_animal_names.html".into(),
            ..Config::default()
        };
        assert!(!local.source_is_remote());
    }
}
