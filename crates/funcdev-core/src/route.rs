//! Route descriptors, the route table, and path/verb inference.
//!
//! Every accepted module contributes exactly one [`RouteDescriptor`] keyed
//! by `(path, method)`. The table is built once per rebuild pass and never
//! mutated afterwards; the HTTP front swaps whole tables so in-flight
//! requests always see a consistent snapshot.

use std::fmt;
use std::sync::Arc;

use crate::module::CompiledModule;

/// The fixed set of HTTP verbs a function module may declare.
///
/// Anything outside this set is coerced to [`HttpMethod::Get`] with a
/// recorded warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Parse a verb string, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "patch" => Some(Self::Patch),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Parse a verb string, coercing unknown verbs to GET.
    ///
    /// Returns the method and whether coercion happened (so the caller can
    /// record a warning).
    pub fn parse_or_default(s: &str) -> (Self, bool) {
        match Self::parse(s) {
            Some(method) => (method, false),
            None => (Self::Get, true),
        }
    }

    /// Whether this verb conventionally carries a request payload.
    ///
    /// Handlers for these verbs receive a decoded body; all others receive
    /// `null`.
    pub fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl Default for HttpMethod {
    fn default() -> Self {
        Self::Get
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the route path for a module.
///
/// The explicit guest-declared path wins over the filename-derived default.
/// A file stem of `index` maps to the root path; everything is normalized
/// to a single leading slash.
pub fn derive_path(file_stem: &str, explicit: Option<&str>) -> String {
    let raw = explicit.unwrap_or(file_stem);
    let raw = if raw == "index" { "" } else { raw };

    if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    }
}

/// One servable endpoint: a path, a verb, and the loaded handler module.
#[derive(Clone)]
pub struct RouteDescriptor {
    /// Leading-slash-normalized route path.
    pub path: String,
    /// HTTP verb.
    pub method: HttpMethod,
    /// The compiled module exposing the handler.
    pub module: Arc<CompiledModule>,
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("module", &self.module.name())
            .finish()
    }
}

/// The ordered collection of all currently active endpoints.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteDescriptor>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// A duplicate `(path, method)` key replaces the earlier entry and
    /// returns it, so the caller can warn about the collision instead of
    /// silently shadowing.
    pub fn insert(&mut self, route: RouteDescriptor) -> Option<RouteDescriptor> {
        let existing = self
            .entries
            .iter()
            .position(|r| r.path == route.path && r.method == route.method);

        match existing {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx], route)),
            None => {
                self.entries.push(route);
                None
            }
        }
    }

    /// Exact `(path, method)` lookup.
    pub fn lookup(&self, path: &str, method: HttpMethod) -> Option<&RouteDescriptor> {
        self.entries
            .iter()
            .find(|r| r.path == path && r.method == method)
    }

    /// Whether any entry exists for the given path, under any verb.
    pub fn contains_path(&self, path: &str) -> bool {
        self.entries.iter().any(|r| r.path == path)
    }

    /// Iterate over the registered routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.entries.iter()
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
