//! Router contract and the engine's merged route table.
//!
//! Plugins contribute externally reachable endpoints through a
//! [`PluginRouter`]: a list of route specs plus an optional path prefix.
//! The engine merges contributed routes into one [`RouteTable`], tagging
//! each route with the owning plugin's name so unloading removes exactly
//! that plugin's routes. The HTTP host dispatches unmatched requests
//! through the table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use wirehub_core::{AppError, AppResult};

/// HTTP method of a plugin route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl std::fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Token-group authentication requirement declared on a route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequirement {
    /// Accepted token groups; `None` accepts a token from any group.
    pub groups: Option<Vec<String>>,
    /// Credential name override; `None` uses the gateway's configured name.
    pub token_name: Option<String>,
}

impl TokenRequirement {
    /// Requires a token from any group.
    pub fn any_group() -> Self {
        Self::default()
    }

    /// Requires a token from one specific group.
    pub fn group(group: &str) -> Self {
        Self {
            groups: Some(vec![group.to_string()]),
            token_name: None,
        }
    }

    /// Requires a token from one of several groups.
    pub fn groups(groups: &[&str]) -> Self {
        Self {
            groups: Some(groups.iter().map(|g| g.to_string()).collect()),
            token_name: None,
        }
    }

    /// Overrides the credential name for this route.
    pub fn with_token_name(mut self, name: &str) -> Self {
        self.token_name = Some(name.to_string());
        self
    }
}

/// A request as seen by plugin route handlers and guards.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    /// Path parameters extracted by the route matcher.
    pub params: HashMap<String, String>,
    /// Query string parameters.
    pub query: HashMap<String, String>,
    /// Request headers (lowercased names).
    pub headers: HashMap<String, String>,
    /// Request cookies.
    pub cookies: HashMap<String, String>,
    /// JSON request body, if any.
    pub body: Option<serde_json::Value>,
}

impl RouteRequest {
    /// Looks up a credential by name.
    ///
    /// Precedence: query parameter, then header, then cookie.
    pub fn credential(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .or_else(|| self.headers.get(name))
            .or_else(|| self.cookies.get(name))
            .map(String::as_str)
    }
}

/// A prerequisite run before a route handler; rejection aborts the request.
#[async_trait]
pub trait RouteGuard: Send + Sync {
    /// Checks the request; an error response is returned to the client.
    async fn check(&self, request: &RouteRequest) -> AppResult<()>;
}

/// Boxed future returned by a route handler.
pub type RouteFuture = BoxFuture<'static, AppResult<serde_json::Value>>;

/// The bound callable of a route.
pub type RouteHandlerFn = Arc<dyn Fn(RouteRequest) -> RouteFuture + Send + Sync>;

/// One endpoint a plugin contributes.
#[derive(Clone)]
pub struct RouteSpec {
    /// HTTP method.
    pub method: RouteMethod,
    /// Path relative to the router prefix; `:name` segments capture params.
    pub path: String,
    /// Optional token requirement; the auth verifier is spliced in front of
    /// routes carrying one.
    pub token: Option<TokenRequirement>,
    /// The handler.
    handler: RouteHandlerFn,
}

impl RouteSpec {
    /// Creates a route spec from an async closure.
    pub fn new<F, Fut>(method: RouteMethod, path: &str, handler: F) -> Self
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        Self {
            method,
            path: path.to_string(),
            token: None,
            handler: Arc::new(move |request| Box::pin(handler(request))),
        }
    }

    /// Declares a token requirement on this route.
    pub fn require_token(mut self, requirement: TokenRequirement) -> Self {
        self.token = Some(requirement);
        self
    }
}

impl std::fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSpec")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("token", &self.token)
            .finish()
    }
}

/// The router object a plugin exposes to contribute endpoints.
#[derive(Debug, Clone, Default)]
pub struct PluginRouter {
    /// Path prefix; defaulted from the plugin's dotted name when empty.
    pub prefix: Option<String>,
    /// Contributed routes.
    pub routes: Vec<RouteSpec>,
}

impl PluginRouter {
    /// Creates an empty router with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty router with an explicit prefix.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            routes: Vec::new(),
        }
    }

    /// Adds a route.
    pub fn route(mut self, spec: RouteSpec) -> Self {
        self.routes.push(spec);
        self
    }
}

/// Simple path matcher supporting `:param` segments.
#[derive(Debug, Clone)]
struct PathMatcher {
    segments: Vec<PathSegment>,
}

#[derive(Debug, Clone)]
enum PathSegment {
    Literal(String),
    Param(String),
}

impl PathMatcher {
    fn new(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(name) = s.strip_prefix(':') {
                    PathSegment::Param(name.to_string())
                } else {
                    PathSegment::Literal(s.to_string())
                }
            })
            .collect();

        Self { segments }
    }

    fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();

        for (segment, part) in self.segments.iter().zip(parts.iter()) {
            match segment {
                PathSegment::Literal(expected) => {
                    if expected != part {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }

        Some(params)
    }
}

/// A route merged into the engine's table, tagged with its owning plugin.
#[derive(Clone)]
pub struct RegisteredRoute {
    /// Name of the plugin that owns this route.
    pub plugin: String,
    /// HTTP method.
    pub method: RouteMethod,
    /// Full path including the resolved prefix.
    pub full_path: String,
    /// Token requirement carried over from the route spec.
    pub token: Option<TokenRequirement>,
    /// Prerequisites run in order before the handler.
    guards: Vec<Arc<dyn RouteGuard>>,
    /// The handler.
    handler: RouteHandlerFn,
    /// Compiled path matcher.
    matcher: PathMatcher,
}

impl RegisteredRoute {
    /// Runs the guard chain, then the handler.
    pub async fn handle(&self, request: RouteRequest) -> AppResult<serde_json::Value> {
        for guard in &self.guards {
            guard.check(&request).await?;
        }
        (self.handler)(request).await
    }
}

impl std::fmt::Debug for RegisteredRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredRoute")
            .field("plugin", &self.plugin)
            .field("method", &self.method)
            .field("full_path", &self.full_path)
            .field("guards", &self.guards.len())
            .finish()
    }
}

/// All plugin-contributed routes, merged.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RegisteredRoute>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a plugin's routes under the given prefix.
    pub fn register(&mut self, plugin: &str, prefix: &str, specs: Vec<RouteSpec>) {
        for spec in specs {
            let full_path = format!("{}{}", prefix.trim_end_matches('/'), spec.path);
            let matcher = PathMatcher::new(&full_path);

            self.routes.push(RegisteredRoute {
                plugin: plugin.to_string(),
                method: spec.method,
                full_path,
                token: spec.token,
                guards: Vec::new(),
                handler: spec.handler,
                matcher,
            });
        }
    }

    /// Removes every route contributed by a plugin.
    pub fn unregister(&mut self, plugin: &str) {
        self.routes.retain(|r| r.plugin != plugin);
    }

    /// Finds the route matching a method and path.
    ///
    /// Returns the route and the extracted path parameters.
    pub fn match_route(
        &self,
        method: RouteMethod,
        path: &str,
    ) -> Option<(&RegisteredRoute, HashMap<String, String>)> {
        for route in &self.routes {
            if route.method == method
                && let Some(params) = route.matcher.match_path(path)
            {
                return Some((route, params));
            }
        }
        None
    }

    /// Splices a guard in front of every route with a token requirement.
    ///
    /// One-time wiring after all plugins load; the guard runs before any
    /// other prerequisite of the route.
    pub fn splice_guard<F>(&mut self, factory: F) -> usize
    where
        F: Fn(&TokenRequirement) -> Arc<dyn RouteGuard>,
    {
        let mut spliced = 0;
        for route in &mut self.routes {
            if let Some(requirement) = &route.token {
                route.guards.insert(0, factory(requirement));
                spliced += 1;
            }
        }
        spliced
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterates over all registered routes.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredRoute> {
        self.routes.iter()
    }
}
