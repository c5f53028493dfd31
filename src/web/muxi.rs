use std::convert::Infallible;

use axum::Router;
use axum::extract::Request;
use axum::handler::Handler;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, Route, on};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use crate::error::InjectorError;
use crate::injector::{Builder, Injector, Populate};

/// Future returned by handlers built through the injector.
pub type HandlerFuture = BoxFuture<'static, crate::error::Result<Response>>;

/// Router whose handlers are produced by injector builders.
///
/// A handler builder takes its dependencies as parameters and returns the
/// request handler:
///
/// ```ignore
/// fn show_me(sessions: Arc<SessionManager>) -> impl FnOnce(RequestContext) -> HandlerFuture + Clone + Send + Sync + 'static {
///     move |ctx| async move { ... }.boxed()
/// }
///
/// let mux = Muxi::new(injector).get("/me", show_me)?;
/// ```
///
/// Builders run once, when the route is registered.
pub struct Muxi {
    router: Router,
    injector: Injector,
    prefix: String,
}

impl Muxi {
    pub fn new(injector: Injector) -> Self {
        Self {
            router: Router::new(),
            injector,
            prefix: String::new(),
        }
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Registration on a sub-mux only affects that sub-mux.
    pub fn injector_mut(&mut self) -> &mut Injector {
        &mut self.injector
    }

    /// A mux for routes under `prefix`, with its own copy of the injector.
    /// Mount it back with [`Muxi::merge`].
    pub fn sub_mux(&self, prefix: &str) -> Muxi {
        Muxi {
            router: Router::new(),
            injector: self.injector.clone(),
            prefix: join_paths(&self.prefix, prefix),
        }
    }

    /// Resolves `builder` and mounts its handler for `method` on `path`.
    pub fn handle<B, Args, T>(self, method: MethodFilter, path: &str, builder: B) -> Result<Self, InjectorError>
    where
        B: Builder<Args>,
        B::Output: Handler<T, ()>,
        T: 'static,
    {
        let handler = self.injector.resolve_handler(&builder)?;
        let path = join_paths(&self.prefix, path);
        tracing::debug!("Route registered: {:?} {}", method, path);

        Ok(Self {
            router: self.router.route(&path, on(method, handler)),
            ..self
        })
    }

    pub fn get<B, Args, T>(self, path: &str, builder: B) -> Result<Self, InjectorError>
    where
        B: Builder<Args>,
        B::Output: Handler<T, ()>,
        T: 'static,
    {
        self.handle(MethodFilter::GET, path, builder)
    }

    pub fn post<B, Args, T>(self, path: &str, builder: B) -> Result<Self, InjectorError>
    where
        B: Builder<Args>,
        B::Output: Handler<T, ()>,
        T: 'static,
    {
        self.handle(MethodFilter::POST, path, builder)
    }

    pub fn put<B, Args, T>(self, path: &str, builder: B) -> Result<Self, InjectorError>
    where
        B: Builder<Args>,
        B::Output: Handler<T, ()>,
        T: 'static,
    {
        self.handle(MethodFilter::PUT, path, builder)
    }

    pub fn patch<B, Args, T>(self, path: &str, builder: B) -> Result<Self, InjectorError>
    where
        B: Builder<Args>,
        B::Output: Handler<T, ()>,
        T: 'static,
    {
        self.handle(MethodFilter::PATCH, path, builder)
    }

    pub fn delete<B, Args, T>(self, path: &str, builder: B) -> Result<Self, InjectorError>
    where
        B: Builder<Args>,
        B::Output: Handler<T, ()>,
        T: 'static,
    {
        self.handle(MethodFilter::DELETE, path, builder)
    }

    pub fn head<B, Args, T>(self, path: &str, builder: B) -> Result<Self, InjectorError>
    where
        B: Builder<Args>,
        B::Output: Handler<T, ()>,
        T: 'static,
    {
        self.handle(MethodFilter::HEAD, path, builder)
    }

    pub fn options<B, Args, T>(self, path: &str, builder: B) -> Result<Self, InjectorError>
    where
        B: Builder<Args>,
        B::Output: Handler<T, ()>,
        T: 'static,
    {
        self.handle(MethodFilter::OPTIONS, path, builder)
    }

    /// Wraps the routes registered so far. Routes added later are not wrapped.
    pub fn route_layer<L>(self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        Self {
            router: self.router.route_layer(layer),
            ..self
        }
    }

    /// Wraps every route, including the fallback.
    pub fn layer<L>(self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        Self {
            router: self.router.layer(layer),
            ..self
        }
    }

    /// Mounts the routes of `other`, typically a [`Muxi::sub_mux`].
    pub fn merge(self, other: Muxi) -> Self {
        Self {
            router: self.router.merge(other.router),
            ..self
        }
    }

    pub fn run<B, Args>(&self, runner: B) -> Result<(), InjectorError>
    where
        B: Builder<Args, Output = ()>,
    {
        self.injector.run(runner)
    }

    pub fn populate_struct<P: Populate>(&self, target: &mut P) -> Result<(), InjectorError> {
        self.injector.populate_struct(target)
    }

    pub fn show_available_builders(&self) {
        self.injector.show_available_builders();
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

fn join_paths(prefix: &str, path: &str) -> String {
    let joined = format!(
        "/{}/{}",
        prefix.trim_matches('/'),
        path.trim_start_matches('/')
    );
    let mut normalized = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(c);
    }
    if normalized.len() > 1 && normalized.ends_with('/') && !path.ends_with('/') {
        normalized.pop();
    }
    normalized
}
