//! api-kit: generic REST-CRUD routers over a storage repository, plus client helpers
//! that page through, save and delete the records those routers serve.

pub mod client;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod model;
pub mod notify;
pub mod paging;
pub mod response;
pub mod routes;
pub mod sql;
pub mod state;
pub mod store;
pub mod telemetry;

pub use client::{ApiClient, ClientError, Collection, ErrorResponseHook, HeaderProvider, Identified, RecordStore};
pub use config::{Environment, ServerConfig};
pub use error::{AppError, ConfigError};
pub use middleware::{with_api_layers, TRACE_HEADER};
pub use model::{BeforeDelete, BeforeInsert, BeforeModify, Field, Model, ModelAdapter, TaskQueue, ValidationRule};
pub use notify::{EventEmitter, NotificationType, Notifier};
pub use paging::{PageDescriptor, PageResponse, PAGE_SIZE};
pub use routes::{common_routes, common_routes_with_ready, middleware as route_middleware, refine, ApiRouter, Middleware};
pub use state::{Initializer, RequestContext};
pub use store::{Filter, MemoryRepository, OrderBy, PgRepository, Record, Repository, ResourceSchema, StoreError};
pub use telemetry::init_tracing;
