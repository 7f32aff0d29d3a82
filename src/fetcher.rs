use anyhow::{Context, Result};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::filters::NormalizedQuery;
use crate::models::JobListing;
use crate::source::JobSource;

// The API returns no total count; a short page is the only end-of-data signal.
pub const PAGE_SIZE: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{0}")]
    Network(String),
}

/// Row offset for a 1-based page. Page 0 is treated as page 1.
pub fn page_offset(page: u32, page_size: u32) -> u32 {
    page.max(1).saturating_sub(1).saturating_mul(page_size)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub url: &'static str,
    pub host: &'static str,
    pub params: Vec<(String, String)>,
}

// --- Transport trait ---

pub trait Transport: Send + Sync {
    fn get(&self, request: &ListingRequest) -> Result<Vec<JobListing>, FetchError>;
}

pub trait JobFeed: Send + Sync {
    fn fetch(&self, query: &NormalizedQuery, page: u32) -> Result<Vec<JobListing>, FetchError>;
}

// --- RapidAPI transport ---

#[derive(Debug)]
pub struct HttpTransport {
    api_key: String,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("jobseek/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key: api_key.into(),
            client,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &ListingRequest) -> Result<Vec<JobListing>, FetchError> {
        let response = self
            .client
            .get(request.url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", request.host)
            .query(&request.params)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Network(format!(
                "Request failed with status code {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<Vec<JobListing>>()
            .map_err(|e| FetchError::Network(format!("Failed to parse listing response: {}", e)))
    }
}

// --- Paginated fetcher ---

pub struct Fetcher {
    source: JobSource,
    transport: Box<dyn Transport>,
    page_size: u32,
}

impl Fetcher {
    pub fn new(source: JobSource, transport: Box<dyn Transport>) -> Self {
        Self {
            source,
            transport,
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn request(&self, query: &NormalizedQuery, page: u32) -> ListingRequest {
        let mut params = vec![
            ("limit".to_string(), self.page_size.to_string()),
            ("offset".to_string(), page_offset(page, self.page_size).to_string()),
        ];
        params.extend(query.to_params());
        ListingRequest {
            url: self.source.endpoint(),
            host: self.source.host(),
            params,
        }
    }
}

impl JobFeed for Fetcher {
    fn fetch(&self, query: &NormalizedQuery, page: u32) -> Result<Vec<JobListing>, FetchError> {
        let request = self.request(query, page);
        debug!(
            source = self.source.display_name(),
            page,
            offset = page_offset(page, self.page_size),
            filters = %query.summary(),
            "fetching listings"
        );
        let result = self.transport.get(&request);
        match &result {
            Ok(jobs) => debug!(count = jobs.len(), "listing page received"),
            Err(e) => debug!(error = %e, "listing request failed"),
        }
        result
    }
}
