use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tokio::task::spawn_blocking;
use url::Url;

use crate::model::AnimalRef;
use crate::request::request_page_html;
use crate::FetchError;

/// Finds the image URL to download for an animal.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, animal: &AnimalRef) -> Result<String, FetchError>;
}

/// Fixed name → image URL table.
#[async_trait]
impl SourceResolver for HashMap<String, String> {
    async fn resolve(&self, animal: &AnimalRef) -> Result<String, FetchError> {
        self.get(&animal.name).cloned().ok_or_else(|| FetchError::NoSource {
            name: animal.name.clone(),
        })
    }
}

/// Resolves the representative image from the animal's Wikipedia article.
#[derive(Debug, Clone)]
pub struct WikiImageResolver {
    client: Client,
}

impl WikiImageResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceResolver for WikiImageResolver {
    async fn resolve(&self, animal: &AnimalRef) -> Result<String, FetchError> {
        let no_source = || FetchError::NoSource {
            name: animal.name.clone(),
        };
        let page_url = animal.wiki_url.as_deref().ok_or_else(no_source)?;

        let html = request_page_html(&self.client, page_url).await?;
        let page_url_owned = page_url.to_string();
        let image_url = spawn_blocking(move || find_image_url(&html, &page_url_owned))
            .await
            .map_err(|e| FetchError::Aborted {
                name: animal.name.clone(),
                message: e.to_string(),
            })?;

        image_url.ok_or_else(no_source)
    }
}

/// Candidate `img` selectors, most representative first.
const IMAGE_SELECTORS: &[&str] = &[
    "table.infobox.biota img[src]",
    r#"[typeof="mw:File/Thumb"] img[src]"#,
    r#"[typeof="mw:File"] img[src]"#,
    "img.mw-file-element[src]",
];

/// Picks the article's representative image and makes its `src` absolute.
pub fn find_image_url(html: &str, page_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok()?;

    IMAGE_SELECTORS
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .find_map(|sel| {
            doc.select(&sel)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(str::to_string)
        })
        .and_then(|src| base.join(&src).ok())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://en.wikipedia.org/wiki/Fake_Animal";

    #[test]
    fn test_infobox_image_wins() {
        let html = r#"
        <html><body>
            <figure typeof="mw:File/Thumb"><img src="//upload.wikimedia.org/thumb.jpg"></figure>
            <table class="infobox biota">
                <tr><td><img src="//upload.wikimedia.org/fake_image.jpg" /></td></tr>
            </table>
        </body></html>"#;
        assert_eq!(
            find_image_url(html, PAGE).as_deref(),
            Some("https://upload.wikimedia.org/fake_image.jpg")
        );
    }

    #[test]
    fn test_falls_back_to_thumbnails() {
        let html = r#"
        <html><body>
            <span typeof="mw:File"><img src="/static/file.png"></span>
            <figure typeof="mw:File/Thumb"><img src="//upload.wikimedia.org/thumb.jpg"></figure>
        </body></html>"#;
        assert_eq!(
            find_image_url(html, PAGE).as_deref(),
            Some("https://upload.wikimedia.org/thumb.jpg")
        );

        let html = r#"<html><body><img class="mw-file-element" src="/static/plain.png"></body></html>"#;
        assert_eq!(
            find_image_url(html, PAGE).as_deref(),
            Some("https://en.wikipedia.org/static/plain.png")
        );
    }

    #[test]
    fn test_no_image() {
        assert_eq!(find_image_url("<html></html>", PAGE), None);
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver: HashMap<String, String> =
            HashMap::from([("dog".to_string(), "http://x/dog.jpg".to_string())]);
        assert_eq!(
            resolver.resolve(&AnimalRef::named("dog")).await.unwrap(),
            "http://x/dog.jpg"
        );
        assert_eq!(
            resolver.resolve(&AnimalRef::named("cat")).await,
            Err(FetchError::NoSource { name: "cat".into() })
        );
    }

    #[tokio::test]
    async fn test_wiki_resolver_without_link() {
        let resolver = WikiImageResolver::new(Client::new());
        assert!(matches!(
            resolver.resolve(&AnimalRef::named("cat")).await,
            Err(FetchError::NoSource { .. })
        ));
    }
}
