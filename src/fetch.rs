// =============================================================================
// fetch.rs — GETTING THE RANKINGS PAGE
// =============================================================================
//
// The rankings site takes its filters as positional-looking parameters:
//
//   x1  = year          x2  = season (Indoor / Outdoor)
//   x3  = country       x4  = gender (Men / Women, never M / W)
//   x7  = event         x10 = age group ("M50")
//
// One query in, one page of HTML out. No retries, no pagination, no cookies:
// a fetch either works or the query fails and the operator hears about it.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::FetchError;
use crate::models::Query;

/// Anything that can turn a query into a page of rankings markup.
pub trait RankingsSource {
    async fn fetch(&self, query: &Query) -> Result<String, FetchError>;
}

/// Build the upstream URL for one query.
pub fn query_url(base_url: &str, query: &Query) -> Result<Url, url::ParseError> {
    let year = query.year.to_string();
    let mut params: Vec<(&str, &str)> = vec![
        ("x1", year.as_str()),
        ("x2", query.season.as_str()),
    ];
    if let Some(country) = &query.country {
        params.push(("x3", country.as_str()));
    }
    params.push(("x4", query.gender.upstream_label()));
    params.push(("x7", query.event.as_str()));
    params.push(("x10", query.age_group.as_str()));

    Url::parse_with_params(base_url, &params)
}

/// The real thing: reqwest against the rankings site.
pub struct HttpRankingsClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRankingsClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Url::parse(&config.rankings_url)
            .with_context(|| format!("invalid rankings url '{}'", config.rankings_url))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.rankings_url.clone(),
        })
    }
}

impl RankingsSource for HttpRankingsClient {
    async fn fetch(&self, query: &Query) -> Result<String, FetchError> {
        let url = query_url(&self.base_url, query)?;
        debug!(url = %url, "fetching rankings page");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        debug!(url = %url, bytes = body.len(), "rankings page received");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Season};

    fn query(country: Option<&str>) -> Query {
        Query {
            season: Season::Indoor,
            gender: Gender::M,
            year: 2018,
            age_group: "M50".into(),
            event: "60".into(),
            country: country.map(str::to_string),
        }
    }

    #[test]
    fn test_world_query_url() {
        let url = query_url("https://www.mastersrankings.com/rankings/", &query(None)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.mastersrankings.com/rankings/?x1=2018&x2=Indoor&x4=Men&x7=60&x10=M50"
        );
    }

    #[test]
    fn test_country_query_url_adds_x3() {
        let url = query_url("https://example.org/r/", &query(Some("USA"))).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("x3".to_string(), "USA".to_string())));
        assert!(pairs.contains(&("x4".to_string(), "Men".to_string())));
    }

    #[test]
    fn test_bad_base_url_is_reported() {
        assert!(query_url("not a url", &query(None)).is_err());
    }
}
