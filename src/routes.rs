//! Route table and matcher.
//!
//! Routes are keyed like `"GET /weather"` or `"/premium/*"`. A key without a
//! method matches every method. A trailing `/*` turns the path into a
//! segment-aligned prefix: `/premium/*` matches `/premium/a` and `/premium/a/b`
//! but never `/premium` or `/premiumX`.
//!
//! Lookup order:
//! 1. exact paths (a method-specific entry beats an any-method one);
//! 2. wildcard prefixes, longest literal prefix first.
//!
//! A method mismatch is a plain non-match. The matcher never decides a status.

use crate::errors::{Result, X402Error};
use crate::network::Network;
use crate::price::PriceSpec;
use http::Method;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(expected) => expected == method,
        }
    }

    fn is_specific(&self) -> bool {
        matches!(self, MethodFilter::Only(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathPattern {
    /// Literal path, compared byte for byte.
    Exact(String),
    /// Literal prefix including its trailing `/`, e.g. `/premium/` for `/premium/*`.
    Prefix(String),
}

impl PathPattern {
    pub fn parse(path: &str) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(X402Error::InvalidRoute(format!(
                "{path}: path must start with '/'"
            )));
        }
        match path.strip_suffix('*') {
            Some(prefix) if prefix.ends_with('/') && !prefix.contains('*') => {
                Ok(PathPattern::Prefix(prefix.to_string()))
            }
            Some(_) => Err(X402Error::InvalidRoute(format!(
                "{path}: '*' is only allowed as a whole trailing segment"
            ))),
            None if path.contains('*') => Err(X402Error::InvalidRoute(format!(
                "{path}: '*' is only allowed as a whole trailing segment"
            ))),
            None => Ok(PathPattern::Exact(path.to_string())),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(literal) => literal == path,
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

/// A method filter plus a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePattern {
    pub method: MethodFilter,
    pub path: PathPattern,
}

impl RoutePattern {
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.accepts(method) && self.path.matches(path)
    }
}

impl FromStr for RoutePattern {
    type Err = X402Error;

    /// Parses `"GET /weather"`, `"/premium/*"` or `"POST /api/*"`.
    fn from_str(key: &str) -> Result<Self> {
        let mut parts = key.split_whitespace();
        let (method, path) = match (parts.next(), parts.next(), parts.next()) {
            (Some(path), None, None) => (MethodFilter::Any, path),
            (Some(method), Some(path), None) => {
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .map_err(|e| X402Error::InvalidRoute(format!("{key}: {e}")))?;
                (MethodFilter::Only(method), path)
            }
            _ => {
                return Err(X402Error::InvalidRoute(format!(
                    "'{key}': expected \"METHOD /path\" or \"/path\""
                )))
            }
        };
        Ok(RoutePattern {
            method,
            path: PathPattern::parse(path)?,
        })
    }
}

impl Display for RoutePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let MethodFilter::Only(method) = &self.method {
            write!(f, "{method} ")?;
        }
        match &self.path {
            PathPattern::Exact(path) => write!(f, "{path}"),
            PathPattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

/// Payment terms attached to a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub pattern: RoutePattern,
    pub price: PriceSpec,
    pub network: Network,
    /// Overrides the default `maxTimeoutSeconds`
    pub max_timeout_seconds: Option<u64>,
    pub description: Option<String>,
    pub mime_type: Option<String>,
}

impl RouteConfig {
    pub fn new(pattern: RoutePattern, price: PriceSpec, network: Network) -> Self {
        Self {
            pattern,
            price,
            network,
            max_timeout_seconds: None,
            description: None,
            mime_type: None,
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = Some(seconds);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Immutable set of priced routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteConfig>,
    /// Exact path -> indices into `routes`, method-specific entries first
    exact: HashMap<String, Vec<usize>>,
    /// Indices of wildcard routes, longest prefix first
    wildcard: Vec<usize>,
}

impl RouteTable {
    /// Builds the table, rejecting duplicate patterns.
    pub fn new(routes: Vec<RouteConfig>) -> Result<Self> {
        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        let mut wildcard = Vec::new();

        for (idx, route) in routes.iter().enumerate() {
            if routes[..idx].iter().any(|r| r.pattern == route.pattern) {
                return Err(X402Error::InvalidRoute(format!(
                    "{} is configured more than once",
                    route.pattern
                )));
            }
            match &route.pattern.path {
                PathPattern::Exact(path) => exact.entry(path.clone()).or_default().push(idx),
                PathPattern::Prefix(_) => wildcard.push(idx),
            }
        }

        let specificity = |idx: &usize| {
            let pattern = &routes[*idx].pattern;
            let prefix_len = match &pattern.path {
                PathPattern::Prefix(prefix) => prefix.len(),
                PathPattern::Exact(path) => path.len(),
            };
            (std::cmp::Reverse(prefix_len), !pattern.method.is_specific())
        };
        for indices in exact.values_mut() {
            indices.sort_by_key(specificity);
        }
        wildcard.sort_by_key(specificity);

        Ok(Self {
            routes,
            exact,
            wildcard,
        })
    }

    /// Finds the most specific route for a request, if any.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<&RouteConfig> {
        let exact = self
            .exact
            .get(path)
            .into_iter()
            .flatten()
            .map(|idx| &self.routes[*idx])
            .find(|route| route.pattern.method.accepts(method));
        if exact.is_some() {
            return exact;
        }
        self.wildcard
            .iter()
            .map(|idx| &self.routes[*idx])
            .find(|route| route.pattern.matches(method, path))
    }

    pub fn routes(&self) -> &[RouteConfig] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(key: &str, price: &str) -> RouteConfig {
        RouteConfig::new(
            key.parse().unwrap(),
            PriceSpec::dollar(price).unwrap(),
            Network::BaseSepolia,
        )
    }

    fn matched(table: &RouteTable, method: Method, path: &str) -> Option<String> {
        table
            .match_route(&method, path)
            .map(|r| r.pattern.to_string())
    }

    #[test]
    fn test_pattern_parsing() {
        let pattern: RoutePattern = "GET /weather".parse().unwrap();
        assert_eq!(pattern.method, MethodFilter::Only(Method::GET));
        assert_eq!(pattern.path, PathPattern::Exact("/weather".to_string()));

        let pattern: RoutePattern = "/premium/*".parse().unwrap();
        assert_eq!(pattern.method, MethodFilter::Any);
        assert_eq!(pattern.path, PathPattern::Prefix("/premium/".to_string()));

        let pattern: RoutePattern = "post /api/*".parse().unwrap();
        assert_eq!(pattern.method, MethodFilter::Only(Method::POST));
        assert_eq!(pattern.to_string(), "POST /api/*");
    }

    #[test]
    fn test_invalid_patterns() {
        assert!("weather".parse::<RoutePattern>().is_err());
        assert!("GET /premium*".parse::<RoutePattern>().is_err());
        assert!("GET /a/*/b".parse::<RoutePattern>().is_err());
        assert!("GET /a/**".parse::<RoutePattern>().is_err());
        assert!("GET /a extra".parse::<RoutePattern>().is_err());
        assert!("".parse::<RoutePattern>().is_err());
    }

    #[test]
    fn test_wildcard_is_segment_aligned() {
        let table = RouteTable::new(vec![route("GET /premium/*", "$0.01")]).unwrap();

        assert!(matched(&table, Method::GET, "/premium/content").is_some());
        assert!(matched(&table, Method::GET, "/premium/x/y").is_some());
        assert!(matched(&table, Method::GET, "/premiumX").is_none());
        assert!(matched(&table, Method::GET, "/premium").is_none());
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let table = RouteTable::new(vec![
            route("GET /premium/*", "$0.01"),
            route("GET /premium/free-sample", "$0.001"),
        ])
        .unwrap();

        assert_eq!(
            matched(&table, Method::GET, "/premium/free-sample").as_deref(),
            Some("GET /premium/free-sample")
        );
        assert_eq!(
            matched(&table, Method::GET, "/premium/other").as_deref(),
            Some("GET /premium/*")
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = RouteTable::new(vec![
            route("GET /api/*", "$0.01"),
            route("GET /api/v2/reports/*", "$0.05"),
            route("GET /api/v2/*", "$0.02"),
        ])
        .unwrap();

        assert_eq!(
            matched(&table, Method::GET, "/api/v2/reports/q1").as_deref(),
            Some("GET /api/v2/reports/*")
        );
        assert_eq!(
            matched(&table, Method::GET, "/api/v2/users").as_deref(),
            Some("GET /api/v2/*")
        );
        assert_eq!(
            matched(&table, Method::GET, "/api/v1/users").as_deref(),
            Some("GET /api/*")
        );
    }

    #[test]
    fn test_method_mismatch_is_no_match() {
        let table = RouteTable::new(vec![
            route("GET /weather", "$0.001"),
            route("GET /premium/*", "$0.01"),
        ])
        .unwrap();

        assert!(matched(&table, Method::POST, "/weather").is_none());
        assert!(matched(&table, Method::DELETE, "/premium/content").is_none());
    }

    #[test]
    fn test_method_specific_beats_any_method() {
        let table = RouteTable::new(vec![
            route("/reports/*", "$0.01"),
            route("POST /reports/*", "$0.10"),
        ])
        .unwrap();

        assert_eq!(
            matched(&table, Method::POST, "/reports/daily").as_deref(),
            Some("POST /reports/*")
        );
        assert_eq!(
            matched(&table, Method::GET, "/reports/daily").as_deref(),
            Some("/reports/*")
        );
    }

    #[test]
    fn test_wildcard_method_mismatch_falls_back_to_shorter_prefix() {
        let table = RouteTable::new(vec![
            route("GET /files/*", "$0.01"),
            route("POST /files/uploads/*", "$0.10"),
        ])
        .unwrap();

        assert_eq!(
            matched(&table, Method::GET, "/files/uploads/a.png").as_deref(),
            Some("GET /files/*")
        );
    }

    #[test]
    fn test_duplicate_patterns_rejected() {
        let result = RouteTable::new(vec![
            route("GET /weather", "$0.001"),
            route("get /weather", "$0.002"),
        ]);
        assert!(matches!(result, Err(X402Error::InvalidRoute(_))));
    }

    #[test]
    fn test_no_routes() {
        let table = RouteTable::new(vec![]).unwrap();
        assert!(table.is_empty());
        assert!(matched(&table, Method::GET, "/weather").is_none());
    }
}
