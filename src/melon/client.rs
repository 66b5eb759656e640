use crate::{
    config::Settings,
    error::{ProxyError, ProxyResult},
};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, REFERER},
    Client,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Anything able to produce the raw chart page.
#[async_trait]
pub trait ChartSource: Send + Sync {
    async fn fetch(&self) -> ProxyResult<String>;
}

pub struct Melon {
    http_client: Client,
    chart_url: String,
    attempts: u32,
}

impl Melon {
    pub fn new(
        chart_url: String,
        timeout: Duration,
        user_agent: &str,
        referer: &str,
        attempts: u32,
    ) -> ProxyResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer)
                .map_err(|e| ProxyError::Config(format!("invalid referer header: {e}")))?,
        );

        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| ProxyError::Config(format!("could not build http client: {e}")))?;

        Ok(Self {
            http_client,
            chart_url,
            attempts: attempts.max(1),
        })
    }

    pub fn from_settings(settings: &Settings) -> ProxyResult<Self> {
        Melon::new(
            settings.melon_chart_url.clone(),
            settings.fetch_timeout(),
            &settings.user_agent,
            &settings.melon_referer,
            settings.fetch_attempts,
        )
    }

    async fn get(&self) -> ProxyResult<String> {
        let response = self.http_client.get(&self.chart_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::FetchFailed(format!(
                "{} returned {}",
                self.chart_url, status
            )));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ChartSource for Melon {
    async fn fetch(&self) -> ProxyResult<String> {
        let mut attempt = 1;
        loop {
            match self.get().await {
                Ok(body) => {
                    debug!("Fetched {} bytes from {}", body.len(), self.chart_url);
                    return Ok(body);
                }
                Err(e) if attempt < self.attempts => {
                    warn!("Attempt {attempt}/{} to fetch chart failed. {e}", self.attempts);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
