//! Per-path access filter
//!
//! Requests are dispatched by exact path to a [`Route`], whose gate chain
//! decides between the route's allowed and blocked pages.

pub mod handlers;
pub mod identity;
pub mod ip_extractor;
pub mod matcher;
pub mod route;
pub mod router;
pub mod routes;
pub mod static_files;

pub use handlers::FilterState;
pub use identity::VisitorIdentity;
pub use matcher::PatternMatcher;
pub use route::{Decision, Gate, Outcome, Route, RouteBuildError, Visit};
pub use router::{Dispatch, Router, STATIC_PREFIX};
pub use routes::create_filter_router;
