use std::time::Duration;

use super::{LookupError, LookupFuture, MetadataRegistry, WorkMetadata};
use crate::Config;

/// Date structures consulted for the publication year, in order.
/// Only the first one present in the record is used.
const DATE_KEYS: &[&str] = &["published-print", "published-online", "issued"];

/// CrossRef `/works/{doi}` lookups.
pub struct CrossRef {
    pub mailto: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
    client: reqwest::Client,
}

impl CrossRef {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &Config, client: reqwest::Client) -> Self {
        Self {
            mailto: config.mailto.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            client,
        }
    }

    pub fn work_url(&self, doi: &str) -> String {
        format!("{}/works/{}", self.api_base, urlencoding::encode(doi))
    }
}

impl MetadataRegistry for CrossRef {
    fn name(&self) -> &str {
        "CrossRef"
    }

    fn lookup<'a>(&'a self, doi: &'a str) -> LookupFuture<'a> {
        Box::pin(async move {
            let url = self.work_url(doi);
            let mut request = self
                .client
                .get(&url)
                .header("Accept", "application/json")
                .timeout(self.timeout);
            if let Some(ref email) = self.mailto {
                request =
                    request.header("User-Agent", format!("DOI-Verifier/1.0 (mailto:{})", email));
            }

            let resp = request
                .send()
                .await
                .map_err(|e| LookupError::from_transport(&e))?;
            read_work_response(resp).await
        })
    }
}

/// Map a registry response to metadata or a classified failure.
///
/// A 200 with an unreadable body still counts as resolved; the metadata
/// is simply empty.
pub async fn read_work_response(resp: reqwest::Response) -> Result<WorkMetadata, LookupError> {
    let status = resp.status().as_u16();
    if status != 200 {
        return Err(LookupError::from_status(status));
    }

    match resp.json::<serde_json::Value>().await {
        Ok(data) => Ok(parse_work(&data)),
        Err(e) => {
            tracing::debug!(error = %e, "unparseable CrossRef body");
            Ok(WorkMetadata::default())
        }
    }
}

/// Extract title, year and type from a `/works/{doi}` JSON document.
pub fn parse_work(data: &serde_json::Value) -> WorkMetadata {
    let work = &data["message"];

    let title = work["title"]
        .as_array()
        .and_then(|a| a.first())
        .and_then(|v| v.as_str())
        .map(String::from);

    let year = DATE_KEYS
        .iter()
        .find_map(|key| work.get(*key))
        .and_then(|date| date["date-parts"].get(0))
        .and_then(|parts| parts.get(0))
        .and_then(|y| y.as_u64())
        .filter(|&y| y != 0)
        .map(|y| y.to_string());

    let work_type = work["type"].as_str().map(String::from);

    WorkMetadata {
        title,
        year,
        work_type,
    }
}
