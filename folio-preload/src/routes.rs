//! Named view components the preloader can warm.
//!
//! The route table belongs to the UI layer. The preloader only needs to look
//! a component up by name and, if it is loaded lazily, trigger the load ahead
//! of navigation.

use std::future::Future;
use std::sync::Arc;

use folio_core::FolioResult;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

/// Route warmed after a post view (the listing).
pub const HOME_ROUTE: &str = "home";
/// Route warmed after a listing view (the article page).
pub const POST_ROUTE: &str = "post";

/// Zero-argument loader of a lazily bundled component.
pub type ComponentLoader = Arc<dyn Fn() -> BoxFuture<'static, FolioResult<()>> + Send + Sync>;

/// A view component as registered in the route table.
#[derive(Clone)]
pub enum Component {
    /// Bundled with the application; nothing to warm.
    Eager,
    /// Loaded on first use.
    Lazy(ComponentLoader),
}

impl Component {
    /// Wrap an async loader.
    pub fn lazy<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FolioResult<()>> + Send + 'static,
    {
        Self::Lazy(Arc::new(move || loader().boxed()))
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eager => f.write_str("Eager"),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// One named route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub name: String,
    pub component: Component,
}

impl RouteEntry {
    pub fn new(name: impl Into<String>, component: Component) -> Self {
        Self {
            name: name.into(),
            component,
        }
    }
}

/// Name → component lookup supplied by the UI layer.
pub trait ComponentResolver: Send + Sync {
    /// All registered routes.
    fn routes(&self) -> Vec<RouteEntry>;

    /// Find a route by name. The first match wins.
    fn find(&self, name: &str) -> Option<RouteEntry> {
        self.routes().into_iter().find(|route| route.name == name)
    }
}

/// Owned list of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, name: impl Into<String>, component: Component) -> Self {
        self.routes.push(RouteEntry::new(name, component));
        self
    }

    pub fn with_eager(self, name: impl Into<String>) -> Self {
        self.with_route(name, Component::Eager)
    }

    pub fn with_lazy<F, Fut>(self, name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FolioResult<()>> + Send + 'static,
    {
        self.with_route(name, Component::lazy(loader))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl ComponentResolver for RouteTable {
    fn routes(&self) -> Vec<RouteEntry> {
        self.routes.clone()
    }

    fn find(&self, name: &str) -> Option<RouteEntry> {
        self.routes.iter().find(|route| route.name == name).cloned()
    }
}
