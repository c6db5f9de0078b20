pub mod cache;

pub use cache::{GeoCache, OriginLookup};

use crate::error::{Error, Result};
use async_trait::async_trait;
use mockall::automock;
use reqwest::StatusCode;
use serde::Deserialize;
use std::{net::IpAddr, time::Duration};
use tracing::{debug, warn};

/// Origin label used when a probe could not be resolved
pub const UNKNOWN_ORIGIN: &str = "N/A";

/// Resolves a probe's source address into a human readable origin.
///
/// Implementations make a single attempt per call. `Ok(None)` means the
/// service answered but had nothing usable for the address.
#[automock]
#[async_trait]
pub trait OriginLocator: Send + Sync {
    async fn locate(&self, address: IpAddr) -> Result<Option<String>>;
}

/// Locator used when live lookups are disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLocator;

#[async_trait]
impl OriginLocator for OfflineLocator {
    async fn locate(&self, _address: IpAddr) -> Result<Option<String>> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    region_code: Option<String>,
}

/// ipapi.co style locator: `GET {base_url}/{ip}/json/`
#[derive(Debug, Clone)]
pub struct IpApiLocator {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiLocator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, address: IpAddr) -> String {
        format!("{}/{}/json/", self.base_url, address)
    }
}

#[async_trait]
impl OriginLocator for IpApiLocator {
    async fn locate(&self, address: IpAddr) -> Result<Option<String>> {
        let url = self.url(address);
        debug!("Looking up origin of {} via {}", address, url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!("Geolocation rate limit reached while resolving {}", address);
            return Err(Error::GeolocationUnavailable("rate limited".to_string()));
        }

        let body: IpApiResponse = response.error_for_status()?.json().await?;
        if body.error {
            let reason = body.reason.unwrap_or_else(|| "unknown".to_string());
            if reason == "RateLimited" {
                warn!("Geolocation rate limit reached while resolving {}", address);
            }
            return Err(Error::GeolocationUnavailable(reason));
        }

        Ok(format_origin(body.city.as_deref(), body.region_code.as_deref()))
    }
}

/// "{city}, {region_code}", or whichever part is known
fn format_origin(city: Option<&str>, region_code: Option<&str>) -> Option<String> {
    match (city, region_code) {
        (Some(city), Some(region)) => Some(format!("{city}, {region}")),
        (Some(part), None) | (None, Some(part)) => Some(part.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_origin() {
        assert_eq!(
            format_origin(Some("Porto Alegre"), Some("RS")).as_deref(),
            Some("Porto Alegre, RS")
        );
        assert_eq!(format_origin(Some("Pelotas"), None).as_deref(), Some("Pelotas"));
        assert_eq!(format_origin(None, None), None);
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let locator = IpApiLocator::new("https://ipapi.co/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            locator.url("203.0.113.7".parse().unwrap()),
            "https://ipapi.co/203.0.113.7/json/"
        );
    }

    #[test]
    fn test_response_parsing() {
        let body: IpApiResponse =
            serde_json::from_str(r#"{"error": true, "reason": "RateLimited"}"#).unwrap();
        assert!(body.error);
        assert_eq!(body.reason.as_deref(), Some("RateLimited"));

        let body: IpApiResponse =
            serde_json::from_str(r#"{"ip": "1.1.1.1", "city": "Sydney", "region_code": "NSW"}"#)
                .unwrap();
        assert!(!body.error);
        assert_eq!(
            format_origin(body.city.as_deref(), body.region_code.as_deref()).as_deref(),
            Some("Sydney, NSW")
        );
    }

    #[tokio::test]
    async fn test_offline_locator_resolves_nothing() {
        let origin = OfflineLocator.locate("10.0.0.1".parse().unwrap()).await.unwrap();
        assert_eq!(origin, None);
    }
}
