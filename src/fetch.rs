use std::path::{Path, PathBuf};

use reqwest::Client;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info};

use crate::cache::{CacheStore, IMAGE_EXTENSIONS};
use crate::model::AnimalRecord;
use crate::request::{request_bytes, Payload};
use crate::{FetchError, MAX_IMAGE_BYTES};

/// Downloads one animal's image into the cache, unless it's there already.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    cache: CacheStore,
    min_image_bytes: usize,
    max_image_bytes: usize,
}

impl ImageFetcher {
    pub fn new(client: Client, cache: CacheStore, min_image_bytes: usize) -> Self {
        Self {
            client,
            cache,
            min_image_bytes,
            max_image_bytes: MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Returns a `Cached` record without touching the network when the cache has the image,
    /// otherwise downloads, validates and atomically stores it and returns a `Fetched` record.
    pub async fn fetch(&self, animal: &str, source_url: &str) -> Result<AnimalRecord, FetchError> {
        if let Some(path) = self.cache.lookup(animal).await {
            debug!(animal, path = %path.display(), "Image already cached");
            return Ok(AnimalRecord::cached(animal, Some(source_url.into()), path));
        }

        debug!(animal, url = source_url, "Downloading image");
        let payload = request_bytes(&self.client, source_url, self.max_image_bytes).await?;
        validate(&payload, source_url, self.min_image_bytes)?;

        let ext = image_extension(payload.content_type.as_deref(), source_url);
        let path = self.cache.resolve_path(animal, ext);
        persist(&self.cache.temp_path(animal), &path, &payload.bytes).await?;

        info!(animal, bytes = payload.bytes.len(), path = %path.display(), "Saved image");
        Ok(AnimalRecord::fetched(animal, source_url.into(), path))
    }
}

fn validate(payload: &Payload, url: &str, min_bytes: usize) -> Result<(), FetchError> {
    if payload.bytes.is_empty() {
        return Err(FetchError::EmptyBody { url: url.into() });
    }
    if payload.bytes.len() < min_bytes {
        return Err(FetchError::TooSmall {
            url: url.into(),
            len: payload.bytes.len(),
            min: min_bytes,
        });
    }
    match payload.content_type.as_deref() {
        Some(content_type) if !content_type.starts_with("image/") => Err(FetchError::NotAnImage {
            url: url.into(),
            content_type: content_type.into(),
        }),
        _ => Ok(()),
    }
}

/// Picks the cache extension from the content type, then the URL path, then falls back to `jpg`.
fn image_extension(content_type: Option<&str>, url: &str) -> &'static str {
    let from_type = content_type.and_then(|content_type| {
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        match mime {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            "image/svg+xml" => Some("svg"),
            "image/webp" => Some("webp"),
            _ => None,
        }
    });

    from_type
        .or_else(|| {
            let path = url::Url::parse(url).ok()?.path().to_ascii_lowercase();
            let ext = Path::new(&path).extension()?.to_str()?.to_string();
            let ext = if ext == "jpeg" { "jpg".to_string() } else { ext };
            IMAGE_EXTENSIONS.iter().copied().find(|known| *known == ext)
        })
        .unwrap_or("jpg")
}

/// Removes the temp file on drop unless the write made it to the final path.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Writes `bytes` to `temp`, flushes them to disk and renames the file onto `dest`.
async fn persist(temp: &Path, dest: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    let mut guard = PartialFile {
        path: temp.to_path_buf(),
        committed: false,
    };

    {
        let mut file = File::create(temp)
            .await
            .map_err(|e| FetchError::storage(temp, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| FetchError::storage(temp, e))?;
        file.sync_all()
            .await
            .map_err(|e| FetchError::storage(temp, e))?;
    }

    tokio::fs::rename(temp, dest)
        .await
        .map_err(|e| FetchError::storage(dest, e))?;
    guard.committed = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize, content_type: Option<&str>) -> Payload {
        Payload {
            bytes: vec![0xff; len],
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn test_validate() {
        let url = "http://example.org/dog.jpg";
        assert!(validate(&payload(64, Some("image/jpeg")), url, 32).is_ok());
        assert!(validate(&payload(64, None), url, 32).is_ok());
        assert_eq!(
            validate(&payload(0, Some("image/jpeg")), url, 32),
            Err(FetchError::EmptyBody { url: url.into() })
        );
        assert!(matches!(
            validate(&payload(8, Some("image/jpeg")), url, 32),
            Err(FetchError::TooSmall { len: 8, .. })
        ));
        assert!(matches!(
            validate(&payload(64, Some("text/html; charset=utf-8")), url, 32),
            Err(FetchError::NotAnImage { .. })
        ));
    }

    #[test]
    fn test_image_extension() {
        let url = "https://upload.wikimedia.org/a/ab/Dog.PNG";
        assert_eq!(image_extension(Some("image/webp"), url), "webp");
        assert_eq!(image_extension(Some("image/svg+xml; charset=utf-8"), url), "svg");
        assert_eq!(image_extension(None, url), "png");
        assert_eq!(image_extension(None, "https://x.org/cat.jpeg?w=200"), "jpg");
        assert_eq!(image_extension(Some("image/tiff"), "https://x.org/cat.tif"), "jpg");
        assert_eq!(image_extension(None, "not a url"), "jpg");
    }

    #[tokio::test]
    async fn test_persist_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let temp = store.temp_path("owl");
        let dest = store.resolve_path("owl", "jpg");

        persist(&temp, &dest, b"hoot hoot").await.unwrap();
        assert!(!temp.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"hoot hoot");
    }

    #[tokio::test]
    async fn test_persist_failure_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let temp = store.temp_path("owl");
        // Renaming a file onto a non-empty directory fails on every platform.
        let dest = store.resolve_path("owl", "jpg");
        std::fs::create_dir_all(dest.join("occupied")).unwrap();

        let err = persist(&temp, &dest, b"hoot hoot").await.unwrap_err();
        assert!(matches!(err, FetchError::Storage { .. }));
        assert!(!temp.exists());
        assert!(!store.has_cached("owl").await);
    }
}
