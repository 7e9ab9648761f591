//! Route definition file loader
//!
//! The file is a sequence of `[location]` blocks holding `key=value` lines:
//!
//! ```text
//! [location]
//! url=/landing
//! if_allowed=landing.html
//! if_blocked=blank.html
//! blocked_ips=1.2.3.4, 10.0.0.
//! blocked_areas=CN,RU
//! blocked_cookies=5
//! allowed_uas=Mozilla
//! ```
//!
//! `url`, `if_allowed` and `if_blocked` are required in every block. The
//! other keys are optional and leave their gate unrestricted when absent.

use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Literal line opening a new block
pub const BLOCK_START: &str = "[location]";

/// One parsed `[location]` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteConfig {
    pub url: String,
    pub if_allowed: String,
    pub if_blocked: String,
    pub blocked_ips: Option<Vec<String>>,
    pub blocked_areas: Option<Vec<String>>,
    /// Visit threshold; `None` when unset or not positive
    pub blocked_cookies: Option<i64>,
    pub allowed_uas: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("block starting at line {line} is missing `{key}`")]
    MissingKey { line: usize, key: &'static str },
    #[error("line {line}: blocked_cookies must be an integer, got `{value}`")]
    InvalidThreshold { line: usize, value: String },
}

#[derive(Debug, Error)]
pub enum RouteConfigError {
    #[error("failed to read route file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid route configuration: {}", join_errors(.0))]
    InvalidBlocks(Vec<BlockError>),
}

fn join_errors(errors: &[BlockError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Read and parse a route definition file
pub fn load_routes(path: impl AsRef<Path>) -> Result<Vec<RouteConfig>, RouteConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| RouteConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_routes(&contents)
}

/// Parse route definitions.
///
/// Every malformed block is collected before failing so one run reports all
/// problems; no routes are returned unless all blocks are valid.
pub fn parse_routes(contents: &str) -> Result<Vec<RouteConfig>, RouteConfigError> {
    let mut routes = Vec::new();
    let mut errors = Vec::new();
    let mut current: Option<PendingBlock> = None;

    for (index, raw) in contents.lines().enumerate() {
        let lineno = index + 1;
        let line = raw.trim();

        if line == BLOCK_START {
            if let Some(block) = current.take() {
                block.finish(&mut routes, &mut errors);
            }
            current = Some(PendingBlock::new(lineno));
            continue;
        }

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(block) = current.as_mut() else {
            warn!(line = lineno, "ignoring line outside of a {BLOCK_START} block");
            continue;
        };

        let Some((key, value)) = line.split_once('=') else {
            warn!(line = lineno, content = line, "ignoring line without '='");
            continue;
        };
        block.set(key.trim(), value.trim(), lineno);
    }

    if let Some(block) = current.take() {
        block.finish(&mut routes, &mut errors);
    }

    if errors.is_empty() {
        Ok(routes)
    } else {
        Err(RouteConfigError::InvalidBlocks(errors))
    }
}

/// Block being accumulated; every field stays a raw value until the block closes
#[derive(Default)]
struct PendingBlock {
    start_line: usize,
    url: Option<String>,
    if_allowed: Option<String>,
    if_blocked: Option<String>,
    blocked_ips: Option<String>,
    blocked_areas: Option<String>,
    blocked_cookies: Option<(usize, String)>,
    allowed_uas: Option<String>,
}

impl PendingBlock {
    fn new(start_line: usize) -> Self {
        Self {
            start_line,
            ..Default::default()
        }
    }

    fn set(&mut self, key: &str, value: &str, lineno: usize) {
        let value = (!value.is_empty()).then(|| value.to_string());
        match key {
            "url" => self.url = value,
            "if_allowed" => self.if_allowed = value,
            "if_blocked" => self.if_blocked = value,
            "blocked_ips" => self.blocked_ips = value,
            "blocked_areas" => self.blocked_areas = value,
            "blocked_cookies" => self.blocked_cookies = value.map(|v| (lineno, v)),
            "allowed_uas" => self.allowed_uas = value,
            other => warn!(line = lineno, key = other, "ignoring unknown route key"),
        }
    }

    fn finish(self, routes: &mut Vec<RouteConfig>, errors: &mut Vec<BlockError>) {
        let line = self.start_line;
        let before = errors.len();

        let mut required = |value: Option<String>, key: &'static str| {
            if value.is_none() {
                errors.push(BlockError::MissingKey { line, key });
            }
            value.unwrap_or_default()
        };
        let url = required(self.url, "url");
        let if_allowed = required(self.if_allowed, "if_allowed");
        let if_blocked = required(self.if_blocked, "if_blocked");

        let blocked_cookies = match self.blocked_cookies {
            None => None,
            Some((line, value)) => match value.parse::<i64>() {
                Ok(n) if n > 0 => Some(n),
                Ok(_) => None,
                Err(_) => {
                    errors.push(BlockError::InvalidThreshold { line, value });
                    None
                }
            },
        };

        if errors.len() > before {
            return;
        }

        routes.push(RouteConfig {
            url,
            if_allowed,
            if_blocked,
            blocked_ips: split_list(self.blocked_ips),
            blocked_areas: split_list(self.blocked_areas),
            blocked_cookies,
            allowed_uas: split_list(self.allowed_uas),
        });
    }
}

/// Comma-separated list with items trimmed and empties dropped.
/// A list with no remaining items counts as unset.
fn split_list(value: Option<String>) -> Option<Vec<String>> {
    let items: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}
