//! `ApiRouter`: builder that mounts the generic resource handlers for one model type.
//!
//! ```ignore
//! let books = ApiRouter::<Book>::new("books", repo)
//!     .get_one(&[])
//!     .get_many(vec![OrderBy::asc("title")], None, &[])
//!     .update(None, &[])
//!     .delete(&[require_admin.clone()])
//!     .authed(require_user)
//!     .build();
//! let app = Router::new().nest("/books", books);
//! ```

use crate::handlers::resource;
use crate::model::{BoxFuture, Model};
use crate::state::{FilterFn, Initializer, RequestContext, ResourceState};
use crate::store::{Filter, OrderBy, Repository};
use axum::extract::Request;
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::routing::{self, MethodRouter};
use axum::Router;
use std::future::Future;
use std::sync::Arc;

/// Request middleware usable per operation or router-wide.
pub type Middleware = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wrap an async `fn(Request, Next) -> Response` as a [`Middleware`].
pub fn middleware<F, Fut>(f: F) -> Middleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req, next| Box::pin(f(req, next)))
}

/// Wrap a closure as a collection filter refinement.
pub fn refine<F>(f: F) -> FilterFn
where
    F: Fn(&RequestContext, Filter) -> Filter + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Apply `mws` so that the first one listed runs first.
fn with_middlewares<S>(mut route: MethodRouter<S>, mws: &[Middleware]) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    for mw in mws.iter().rev().cloned() {
        route = route.layer(from_fn(move |req: Request, next: Next| (*mw)(req, next)));
    }
    route
}

fn merge<S>(slot: &mut Option<MethodRouter<S>>, route: MethodRouter<S>)
where
    S: Clone + Send + Sync + 'static,
{
    *slot = Some(match slot.take() {
        Some(existing) => existing.merge(route),
        None => route,
    });
}

pub struct ApiRouter<M: Model> {
    state: ResourceState<M>,
    root: Option<MethodRouter<ResourceState<M>>>,
    item: Option<MethodRouter<ResourceState<M>>>,
    auth: Vec<Middleware>,
    nested: Vec<(String, Router)>,
}

impl<M: Model> ApiRouter<M> {
    /// Router for resource `name` over `repo`. No operation is mounted until requested.
    pub fn new(name: &str, repo: Arc<dyn Repository>) -> Self {
        ApiRouter {
            state: ResourceState::new(name, repo),
            root: None,
            item: None,
            auth: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// `GET /:id`: the projection, or 404 `{message}` when absent.
    pub fn get_one(mut self, mws: &[Middleware]) -> Self {
        merge(&mut self.item, with_middlewares(routing::get(resource::get_one::<M>), mws));
        self
    }

    /// `GET /?page=N`: `{data, total}` filtered by path parameters and `refine`, sorted by `order`.
    pub fn get_many(mut self, order: Vec<OrderBy>, refine: Option<FilterFn>, mws: &[Middleware]) -> Self {
        self.state.order = Arc::new(order);
        self.state.refine = refine;
        merge(&mut self.root, with_middlewares(routing::get(resource::get_many::<M>), mws));
        self
    }

    /// `POST /`: update the record named by the body's `id`, or create one.
    pub fn update(mut self, initializer: Option<Arc<dyn Initializer>>, mws: &[Middleware]) -> Self {
        self.state.initializer = initializer;
        merge(&mut self.root, with_middlewares(routing::post(resource::upsert::<M>), mws));
        self
    }

    /// `DELETE /:id`: 201 with an empty body.
    pub fn delete(mut self, mws: &[Middleware]) -> Self {
        merge(&mut self.item, with_middlewares(routing::delete(resource::delete::<M>), mws));
        self
    }

    /// Run `mw` before every operation and sub-route of this router.
    pub fn authed(mut self, mw: Middleware) -> Self {
        self.auth.push(mw);
        self
    }

    /// Nest `router` at `path`. Its handlers see this router's path parameters too.
    /// `path` must not start with a parameter segment when `get_one`/`delete` are mounted.
    pub fn sub_route(mut self, path: &str, router: Router) -> Self {
        self.nested.push((path.to_string(), router));
        self
    }

    pub fn build(self) -> Router {
        let ApiRouter {
            state,
            root,
            item,
            auth,
            nested,
        } = self;
        tracing::debug!(target: "api_kit::router", resource = %state.name, "building router");
        let mut router: Router<ResourceState<M>> = Router::new();
        if let Some(root) = root {
            router = router.route("/", root);
        }
        if let Some(item) = item {
            router = router.route("/:id", item);
        }
        let mut router: Router = router.with_state(state);
        for (path, child) in nested {
            router = router.nest(&path, child);
        }
        for mw in auth.into_iter().rev() {
            router = router.layer(from_fn(move |req: Request, next: Next| (*mw)(req, next)));
        }
        router
    }
}
