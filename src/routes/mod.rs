//! Route builders.

pub mod api_router;
pub mod common;

pub use api_router::{middleware, refine, ApiRouter, Middleware};
pub use common::{common_routes, common_routes_with_ready};
