use std::collections::HashMap;
use tracing::info;

use super::route::{Route, RouteBuildError};
use crate::config::RouteConfig;
use crate::templates::TemplateStore;

/// Paths under this prefix are static assets and never reach a route
pub const STATIC_PREFIX: &str = "/s/";

/// Result of looking up a request path
#[derive(Debug)]
pub enum Dispatch<'a> {
    /// Static asset path, relative to the static directory
    Static(&'a str),
    Route(&'a Route),
    NotFound,
}

/// Immutable path → route table, built once before serving
#[derive(Debug, Default)]
pub struct Router {
    routes: HashMap<String, Route>,
}

impl Router {
    /// Compile every route; a later block with the same url replaces an earlier one
    pub fn build(
        configs: &[RouteConfig],
        templates: &mut TemplateStore,
    ) -> Result<Self, RouteBuildError> {
        let mut routes = HashMap::with_capacity(configs.len());
        for config in configs {
            let route = Route::build(config, templates)?;
            info!(
                url = %config.url,
                if_allowed = %config.if_allowed,
                if_blocked = %config.if_blocked,
                blocked_ips = ?config.blocked_ips,
                blocked_areas = ?config.blocked_areas,
                blocked_cookies = ?config.blocked_cookies,
                allowed_uas = ?config.allowed_uas,
                "Add new route"
            );
            if routes.insert(config.url.clone(), route).is_some() {
                info!(url = %config.url, "route redefined, keeping the last definition");
            }
        }
        Ok(Self { routes })
    }

    pub fn dispatch<'a>(&'a self, path: &'a str) -> Dispatch<'a> {
        if let Some(asset) = path.strip_prefix(STATIC_PREFIX) {
            return Dispatch::Static(asset);
        }
        match self.routes.get(path) {
            Some(route) => Dispatch::Route(route),
            None => Dispatch::NotFound,
        }
    }

    pub fn get(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    /// Registered paths in sorted order
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
