use crate::{CrawlerError, Fetcher};
use tokio::{
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::debug;

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<HttpFetcher, CrawlerError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|source| CrawlerError::Fetch {
                url: String::new(),
                source,
            })?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError> {
        let to_error = |source| CrawlerError::Fetch {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(to_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::Status {
                url: url.to_string(),
                status,
            });
        }
        response.text().await.map_err(to_error)
    }
}

/// Spaces out request starts across every caller sharing this fetcher, so
/// the request rate stays bounded however many workers are extracting.
pub struct Throttled<F> {
    inner: F,
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl<F> Throttled<F> {
    pub fn new(inner: F, delay: Duration) -> Self {
        Throttled {
            inner,
            delay,
            last_request: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<F: Fetcher> Fetcher for Throttled<F> {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError> {
        {
            let mut last_request = self.last_request.lock().await;
            if let Some(last_request) = *last_request {
                let elapsed = last_request.elapsed();
                if elapsed < self.delay {
                    tokio::time::sleep(self.delay - elapsed).await;
                }
            }
            last_request.replace(Instant::now());
        }

        debug!("Fetch {}", url);
        self.inner.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticFetcher;

    #[tokio::test]
    async fn spaces_consecutive_requests() {
        let fetcher = Throttled::new(
            StaticFetcher::new().with_document("a", "<p>a</p>".to_string()),
            Duration::from_millis(40),
        );

        let started = Instant::now();
        for _ in 0..3 {
            fetcher.fetch("a").await.unwrap();
        }

        assert!(started.elapsed() >= Duration::from_millis(80));
        assert_eq!(fetcher.inner().hits("a"), 3);
    }

    #[tokio::test]
    async fn spacing_is_shared_between_concurrent_callers() {
        let fetcher = Throttled::new(StaticFetcher::new(), Duration::from_millis(40));

        let started = Instant::now();
        let (a, b, c) = tokio::join!(fetcher.fetch("x"), fetcher.fetch("y"), fetcher.fetch("z"));

        assert!(a.is_err() && b.is_err() && c.is_err());
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
