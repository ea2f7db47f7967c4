/// Blocking HTTP adapters for the upstream feeds.
///
/// Each adapter GETs a configured URL and hands the JSON body to the
/// matching normalizer. `{station}` in a URL template is replaced with the
/// URL-encoded station id. A feed without a configured URL is reported as
/// unavailable on every call, which the scorer degrades to a zero factor.
///
/// These adapters sit outside the core; the scoring and monitoring code only
/// ever sees the traits in `ingest`.

use std::time::Duration;

use serde_json::Value;

use crate::config::FeedUrls;
use crate::ingest::normalize::{
    advisories_from_value, nowcast_from_value, station_levels_from_value, warnings_from_value,
};
use crate::ingest::{
    AdvisorySource, Nowcast, NowcastSource, StationLevel, WaterLevelSource, WeatherWarningSource,
};
use crate::model::{AdvisoryEntry, HazardError, WarningEntry};

/// Expands `{station}` in a feed URL template.
pub fn build_feed_url(template: &str, station_id: &str) -> String {
    template.replace("{station}", &urlencoding::encode(station_id))
}

/// One configured JSON endpoint.
#[derive(Clone)]
pub struct HttpFeed {
    name: &'static str,
    client: reqwest::blocking::Client,
    url: Option<String>,
}

impl HttpFeed {
    pub fn new(name: &'static str, client: reqwest::blocking::Client, url: Option<String>) -> Self {
        Self { name, client, url }
    }

    /// Fetches and decodes the feed body as JSON.
    pub fn fetch_json(&self, station_id: Option<&str>) -> Result<Value, HazardError> {
        let template = self
            .url
            .as_deref()
            .ok_or_else(|| HazardError::unavailable(self.name, "no feed URL configured"))?;
        let url = match station_id {
            Some(id) => build_feed_url(template, id),
            None => template.to_string(),
        };

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| HazardError::unavailable(self.name, e))?;

        if !response.status().is_success() {
            return Err(HazardError::unavailable(
                self.name,
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .json::<Value>()
            .map_err(|e| HazardError::unavailable(self.name, format!("invalid JSON: {}", e)))
    }
}

pub struct HttpWarningSource(pub HttpFeed);
pub struct HttpNowcastSource(pub HttpFeed);
pub struct HttpWaterLevelSource(pub HttpFeed);
pub struct HttpAdvisorySource(pub HttpFeed);

impl WeatherWarningSource for HttpWarningSource {
    fn get(&self, station_id: &str) -> Result<Vec<WarningEntry>, HazardError> {
        warnings_from_value(&self.0.fetch_json(Some(station_id))?)
    }
}

impl NowcastSource for HttpNowcastSource {
    fn get(&self) -> Result<Nowcast, HazardError> {
        nowcast_from_value(&self.0.fetch_json(None)?)
    }
}

impl WaterLevelSource for HttpWaterLevelSource {
    fn get(&self) -> Result<Vec<StationLevel>, HazardError> {
        station_levels_from_value(&self.0.fetch_json(None)?)
    }
}

impl AdvisorySource for HttpAdvisorySource {
    fn get(&self, station_id: &str) -> Result<Vec<AdvisoryEntry>, HazardError> {
        advisories_from_value(&self.0.fetch_json(Some(station_id))?)
    }
}

/// The four HTTP sources for a `[feeds]` section, sharing one client.
pub struct HttpSources {
    pub warnings: HttpWarningSource,
    pub nowcast: HttpNowcastSource,
    pub water_level: HttpWaterLevelSource,
    pub advisories: HttpAdvisorySource,
}

/// Builds HTTP sources whose requests give up at `timeout`.
pub fn http_sources(urls: &FeedUrls, timeout: Duration) -> Result<HttpSources, HazardError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| HazardError::Configuration(format!("failed to build HTTP client: {}", e)))?;

    Ok(HttpSources {
        warnings: HttpWarningSource(HttpFeed::new("warnings", client.clone(), urls.warnings.clone())),
        nowcast: HttpNowcastSource(HttpFeed::new("nowcast", client.clone(), urls.nowcast.clone())),
        water_level: HttpWaterLevelSource(HttpFeed::new(
            "water_level",
            client.clone(),
            urls.water_level.clone(),
        )),
        advisories: HttpAdvisorySource(HttpFeed::new("advisories", client, urls.advisories.clone())),
    })
}
