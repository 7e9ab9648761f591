//! Per-path decision chain
//!
//! Gates run in a fixed order and the first one that fires decides the
//! response:
//!
//! 1. `blocked_ips`: client address matches the IP blocklist
//! 2. `blocked_areas`: resolved country or region matches the area blocklist
//! 3. the visitor's counter is incremented (only when 1 and 2 passed)
//! 4. `blocked_cookies`: the new count exceeds the threshold
//! 5. `allowed_uas`: the User-Agent matches none of the allowed patterns
//!
//! Requests blocked by gates 4 and 5 have therefore already been counted.

use aho_corasick::BuildError;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::matcher::PatternMatcher;
use crate::config::RouteConfig;
use crate::geo::{GeoLocator, Location};
use crate::storage::VisitCounter;
use crate::templates::{Template, TemplateError, TemplateStore};

#[derive(Debug, Error)]
pub enum RouteBuildError {
    #[error("route {url}: {source}")]
    Template {
        url: String,
        #[source]
        source: TemplateError,
    },
    #[error("route {url}: cannot compile {field} patterns: {source}")]
    Pattern {
        url: String,
        field: &'static str,
        #[source]
        source: BuildError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    BlockedIps,
    BlockedAreas,
    BlockedCookies,
    AllowedUas,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::BlockedIps => "blocked_ips",
            Gate::BlockedAreas => "blocked_areas",
            Gate::BlockedCookies => "blocked_cookies",
            Gate::AllowedUas => "allowed_uas",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    Blocked(Gate),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Allowed => f.write_str("allowed"),
            Outcome::Blocked(gate) => write!(f, "blocked by {}", gate.as_str()),
        }
    }
}

/// Request attributes the gates look at
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub client_ip: IpAddr,
    pub visitor: &'a str,
    pub user_agent: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub location: Location,
    /// Counter value after this request; `None` when blocked before counting
    pub visits: Option<i64>,
}

#[derive(Debug)]
pub struct Route {
    url: String,
    if_allowed: Arc<Template>,
    if_blocked: Arc<Template>,
    blocked_ips: Option<PatternMatcher>,
    blocked_areas: Option<PatternMatcher>,
    blocked_cookies: Option<i64>,
    allowed_uas: Option<PatternMatcher>,
}

impl Route {
    pub fn build(
        config: &RouteConfig,
        templates: &mut TemplateStore,
    ) -> Result<Self, RouteBuildError> {
        let load = |templates: &mut TemplateStore, name: &str| {
            templates
                .load(name)
                .map_err(|source| RouteBuildError::Template {
                    url: config.url.clone(),
                    source,
                })
        };
        let compile = |patterns: &Option<Vec<String>>, field: &'static str| {
            patterns
                .as_deref()
                .map(PatternMatcher::new)
                .transpose()
                .map_err(|source| RouteBuildError::Pattern {
                    url: config.url.clone(),
                    field,
                    source,
                })
        };

        Ok(Self {
            url: config.url.clone(),
            if_allowed: load(templates, &config.if_allowed)?,
            if_blocked: load(templates, &config.if_blocked)?,
            blocked_ips: compile(&config.blocked_ips, "blocked_ips")?,
            blocked_areas: compile(&config.blocked_areas, "blocked_areas")?,
            blocked_cookies: config.blocked_cookies.filter(|n| *n > 0),
            allowed_uas: compile(&config.allowed_uas, "allowed_uas")?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn blocked_ips(&self) -> Option<&PatternMatcher> {
        self.blocked_ips.as_ref()
    }

    pub fn blocked_areas(&self) -> Option<&PatternMatcher> {
        self.blocked_areas.as_ref()
    }

    pub fn blocked_cookies(&self) -> Option<i64> {
        self.blocked_cookies
    }

    pub fn allowed_uas(&self) -> Option<&PatternMatcher> {
        self.allowed_uas.as_ref()
    }

    pub fn template_for(&self, outcome: Outcome) -> &Template {
        match outcome {
            Outcome::Allowed => &self.if_allowed,
            Outcome::Blocked(_) => &self.if_blocked,
        }
    }

    /// Run the gate chain for one request and log the decision
    pub async fn evaluate(
        &self,
        visit: &Visit<'_>,
        counter: &dyn VisitCounter,
        geo: &dyn GeoLocator,
    ) -> Decision {
        let location = geo.lookup(visit.client_ip);
        let (outcome, visits) = self.run_gates(visit, &location, counter).await;

        info!(
            route = %self.url,
            client_ip = %visit.client_ip,
            country = %location.country,
            region = %location.region,
            visitor = visit.visitor,
            user_agent = visit.user_agent,
            visits = ?visits,
            template = self.template_for(outcome).name(),
            "{outcome}"
        );

        Decision {
            outcome,
            location,
            visits,
        }
    }

    async fn run_gates(
        &self,
        visit: &Visit<'_>,
        location: &Location,
        counter: &dyn VisitCounter,
    ) -> (Outcome, Option<i64>) {
        if let Some(ips) = &self.blocked_ips {
            if ips.is_match(&visit.client_ip.to_string()) {
                return (Outcome::Blocked(Gate::BlockedIps), None);
            }
        }

        if let Some(areas) = &self.blocked_areas {
            if areas.is_match(&location.country) || areas.is_match(&location.region) {
                return (Outcome::Blocked(Gate::BlockedAreas), None);
            }
        }

        let visits = match counter.get_and_increment(visit.visitor).await {
            Ok(visits) => visits,
            Err(err) => {
                warn!(
                    visitor = visit.visitor,
                    error = %err,
                    "visit counter unavailable, treating visitor as fresh"
                );
                1
            }
        };

        if let Some(threshold) = self.blocked_cookies {
            if visits > threshold {
                return (Outcome::Blocked(Gate::BlockedCookies), Some(visits));
            }
        }

        if let Some(uas) = &self.allowed_uas {
            if !uas.is_match(visit.user_agent) {
                return (Outcome::Blocked(Gate::AllowedUas), Some(visits));
            }
        }

        (Outcome::Allowed, Some(visits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisitorRecord;
    use crate::storage::{CounterError, CounterResult, SqliteStorage};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticGeo(HashMap<IpAddr, Location>);

    impl GeoLocator for StaticGeo {
        fn lookup(&self, ip: IpAddr) -> Location {
            self.0.get(&ip).cloned().unwrap_or_default()
        }
    }

    fn no_geo() -> StaticGeo {
        StaticGeo(HashMap::new())
    }

    struct BrokenCounter;

    #[async_trait]
    impl VisitCounter for BrokenCounter {
        async fn init(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_and_increment(&self, _visitor: &str) -> CounterResult<i64> {
            Err(CounterError::Other(anyhow::anyhow!("disk full")))
        }
        async fn get(&self, _visitor: &str) -> CounterResult<Option<i64>> {
            Ok(None)
        }
        async fn reset(&self, _visitor: &str) -> CounterResult<bool> {
            Ok(false)
        }
        async fn top(&self, _limit: i64) -> CounterResult<Vec<VisitorRecord>> {
            Ok(vec![])
        }
    }

    async fn counter() -> SqliteStorage {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        storage
    }

    fn route(config: RouteConfig) -> Route {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.html"), "allowed").unwrap();
        std::fs::write(dir.path().join("no.html"), "blocked").unwrap();
        let mut templates = TemplateStore::new(dir.path());
        Route::build(&config, &mut templates).unwrap()
    }

    fn base_config() -> RouteConfig {
        RouteConfig {
            url: "/landing".to_string(),
            if_allowed: "ok.html".to_string(),
            if_blocked: "no.html".to_string(),
            blocked_ips: None,
            blocked_areas: None,
            blocked_cookies: None,
            allowed_uas: None,
        }
    }

    fn list(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|s| s.to_string()).collect())
    }

    fn visit<'a>(ip: &str, visitor: &'a str, user_agent: &'a str) -> Visit<'a> {
        Visit {
            client_ip: ip.parse().unwrap(),
            visitor,
            user_agent,
        }
    }

    #[tokio::test]
    async fn test_unrestricted_route_allows_and_counts() {
        let route = route(base_config());
        let counter = counter().await;

        let decision = route
            .evaluate(&visit("5.6.7.8", "v1", "curl/7.0"), &counter, &no_geo())
            .await;

        assert_eq!(decision.outcome, Outcome::Allowed);
        assert_eq!(decision.visits, Some(1));
        assert_eq!(route.template_for(decision.outcome).render(), "allowed");
    }

    #[tokio::test]
    async fn test_ip_gate_blocks_before_counting() {
        let route = route(RouteConfig {
            blocked_ips: list(&["1.2.3.4"]),
            ..base_config()
        });
        let counter = counter().await;

        let blocked = route
            .evaluate(&visit("1.2.3.4", "v1", "Mozilla"), &counter, &no_geo())
            .await;
        assert_eq!(blocked.outcome, Outcome::Blocked(Gate::BlockedIps));
        assert_eq!(blocked.visits, None);
        assert_eq!(counter.get("v1").await.unwrap(), None);

        let allowed = route
            .evaluate(&visit("5.6.7.8", "v2", "Mozilla"), &counter, &no_geo())
            .await;
        assert_eq!(allowed.outcome, Outcome::Allowed);
    }

    #[tokio::test]
    async fn test_area_gate_matches_country_or_region() {
        let route = route(RouteConfig {
            blocked_areas: list(&["RU", "Bavaria"]),
            ..base_config()
        });
        let counter = counter().await;
        let geo = StaticGeo(HashMap::from([
            (
                "9.9.9.1".parse().unwrap(),
                Location {
                    country: "RU".to_string(),
                    region: "Moscow".to_string(),
                },
            ),
            (
                "9.9.9.2".parse().unwrap(),
                Location {
                    country: "DE".to_string(),
                    region: "Bavaria".to_string(),
                },
            ),
            (
                "9.9.9.3".parse().unwrap(),
                Location {
                    country: "FR".to_string(),
                    region: "Brittany".to_string(),
                },
            ),
        ]));

        for (ip, expected) in [
            ("9.9.9.1", Outcome::Blocked(Gate::BlockedAreas)),
            ("9.9.9.2", Outcome::Blocked(Gate::BlockedAreas)),
            ("9.9.9.3", Outcome::Allowed),
            // unresolvable address never trips the area gate
            ("9.9.9.4", Outcome::Allowed),
        ] {
            let decision = route.evaluate(&visit(ip, ip, ""), &counter, &geo).await;
            assert_eq!(decision.outcome, expected, "ip {ip}");
        }
        assert_eq!(counter.get("9.9.9.1").await.unwrap(), None);
        assert_eq!(counter.get("9.9.9.4").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_cookie_threshold_sequence() {
        let route = route(RouteConfig {
            blocked_cookies: Some(2),
            ..base_config()
        });
        let counter = counter().await;

        let mut seen = Vec::new();
        for _ in 0..3 {
            let decision = route
                .evaluate(&visit("5.6.7.8", "fresh", ""), &counter, &no_geo())
                .await;
            seen.push((decision.outcome, decision.visits));
        }

        assert_eq!(
            seen,
            vec![
                (Outcome::Allowed, Some(1)),
                (Outcome::Allowed, Some(2)),
                (Outcome::Blocked(Gate::BlockedCookies), Some(3)),
            ]
        );
    }

    #[tokio::test]
    async fn test_ua_gate_runs_after_counting() {
        let route = route(RouteConfig {
            allowed_uas: list(&["Mozilla"]),
            ..base_config()
        });
        let counter = counter().await;

        let bot = route
            .evaluate(&visit("5.6.7.8", "v1", "curl/7.0"), &counter, &no_geo())
            .await;
        assert_eq!(bot.outcome, Outcome::Blocked(Gate::AllowedUas));
        assert_eq!(bot.visits, Some(1));
        assert_eq!(counter.get("v1").await.unwrap(), Some(1));

        let browser = route
            .evaluate(
                &visit("5.6.7.8", "v1", "Mozilla/5.0 (Windows NT 10.0)"),
                &counter,
                &no_geo(),
            )
            .await;
        assert_eq!(browser.outcome, Outcome::Allowed);
        assert_eq!(browser.visits, Some(2));
    }

    #[tokio::test]
    async fn test_counter_failure_does_not_block() {
        let route = route(RouteConfig {
            blocked_cookies: Some(1),
            ..base_config()
        });

        let decision = route
            .evaluate(&visit("5.6.7.8", "v1", ""), &BrokenCounter, &no_geo())
            .await;
        assert_eq!(decision.outcome, Outcome::Allowed);
        assert_eq!(decision.visits, Some(1));
    }

    #[test]
    fn test_build_fails_on_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let mut templates = TemplateStore::new(dir.path());
        let err = Route::build(&base_config(), &mut templates).unwrap_err();
        assert!(matches!(err, RouteBuildError::Template { .. }));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Allowed.to_string(), "allowed");
        assert_eq!(
            Outcome::Blocked(Gate::AllowedUas).to_string(),
            "blocked by allowed_uas"
        );
    }
}
