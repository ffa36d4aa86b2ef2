use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;

use crate::models::ParentSummary;

/// Read-only source of canonical thread/space data.
pub trait ParentListing: Send + Sync {
    /// Every parent visible to the current user, with true counts.
    fn list_parents(&self) -> BoxFuture<'_, Result<Vec<ParentSummary>>>;

    /// A single parent, or `None` if the listing does not contain it.
    fn fetch_parent<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ParentSummary>>> {
        async move {
            let parents = self.list_parents().await?;
            Ok(parents.into_iter().find(|p| p.id == id))
        }
        .boxed()
    }
}

/// Listing client over HTTP. Expects a JSON array of parent summaries.
pub struct HttpParentListing {
    url: String,
    client: reqwest::Client,
}

impl HttpParentListing {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build listing HTTP client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn get_parents(&self) -> Result<Vec<ParentSummary>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to send request to listing endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Listing endpoint error ({}): {}", status, error_text);
        }

        response
            .json::<Vec<ParentSummary>>()
            .await
            .context("Failed to parse listing response")
    }
}

impl ParentListing for HttpParentListing {
    fn list_parents(&self) -> BoxFuture<'_, Result<Vec<ParentSummary>>> {
        self.get_parents().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<ParentSummary>);

    impl ParentListing for Fixed {
        fn list_parents(&self) -> BoxFuture<'_, Result<Vec<ParentSummary>>> {
            let parents = self.0.clone();
            async move { Ok::<_, anyhow::Error>(parents) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_fetch_parent_filters_listing() {
        let listing = Fixed(vec![
            ParentSummary {
                id: "t1".to_string(),
                title: "Genesis".to_string(),
                count: 4,
                background_gradient: None,
            },
            ParentSummary {
                id: "t2".to_string(),
                title: "Exodus".to_string(),
                count: 1,
                background_gradient: None,
            },
        ]);

        let found = listing.fetch_parent("t2").await.unwrap();
        assert_eq!(found.map(|p| p.title), Some("Exodus".to_string()));
        assert!(listing.fetch_parent("t9").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires a running backend
    async fn test_http_listing() {
        let url = std::env::var("THREADLINE_LISTING_URL").expect("THREADLINE_LISTING_URL not set");
        let listing = HttpParentListing::new(url, Duration::from_secs(10)).unwrap();
        let parents = listing.list_parents().await.unwrap();
        assert!(parents.iter().all(|p| !p.id.is_empty()));
    }
}
