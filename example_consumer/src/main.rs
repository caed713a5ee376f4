//! Example consumer: serves `/books` with api-kit.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Uses PostgreSQL when `DATABASE_URL` is set (table `public.books`), in-memory storage otherwise.

use api_kit::model::Format;
use api_kit::{
    common_routes_with_ready, init_tracing, route_middleware, with_api_layers, AppError, ApiRouter, BeforeDelete,
    Field, MemoryRepository, Model, OrderBy, PgRepository, Record, Repository, ResourceSchema, ServerConfig,
    ValidationRule,
};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

struct Book {
    rec: Record,
}

fn writable(name: &'static str) -> Field<Book> {
    Field::value(name, move |b: &Book| b.rec.get(name).cloned().unwrap_or(Value::Null)).writable(
        move |b, v| {
            b.rec.set(name, v);
            Ok(())
        },
    )
}

impl Model for Book {
    fn wrap(rec: Record) -> Result<Self, AppError> {
        Ok(Book { rec })
    }

    fn id(&self) -> String {
        self.rec.id()
    }

    fn to_record(&self) -> Record {
        self.rec.clone()
    }

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::value("id", |b: &Book| json!(b.rec.id())),
            writable("title").rule(ValidationRule::new().required().min_length(1).max_length(200)),
            writable("author"),
            writable("contact").rule(ValidationRule::new().format(Format::Email)),
            writable("archived"),
        ]
    }

    fn delete_guard(&self) -> Option<&dyn BeforeDelete> {
        Some(self)
    }
}

#[async_trait]
impl BeforeDelete for Book {
    async fn before_delete(&self) -> Result<bool, AppError> {
        Ok(self.rec.get("archived") != Some(&Value::Bool(true)))
    }
}

fn books_schema() -> ResourceSchema {
    ResourceSchema::new("books")
        .typed_column("id", "uuid")
        .column("title")
        .column("author")
        .column("contact")
        .typed_column("archived", "boolean")
        .unique("title")
}

async fn require_api_key(req: Request, next: Next) -> Response {
    let expected = std::env::var("API_KEY").ok();
    let given = req.headers().get("x-api-key").and_then(|v| v.to_str().ok());
    match (expected.as_deref(), given) {
        (None, _) => next.run(req).await,
        (Some(e), Some(g)) if e == g => next.run(req).await,
        _ => AppError::http(StatusCode::UNAUTHORIZED, "invalid api key").into_response(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    init_tracing(config.environment);

    let repo: Arc<dyn Repository> = match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            Arc::new(PgRepository::new(pool, books_schema()))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory storage");
            Arc::new(MemoryRepository::new(books_schema()))
        }
    };

    let books = ApiRouter::<Book>::new("books", repo.clone())
        .get_one(&[])
        .get_many(vec![OrderBy::asc("title")], None, &[])
        .update(None, &[route_middleware(require_api_key)])
        .delete(&[route_middleware(require_api_key)])
        .build();

    let app = Router::new()
        .merge(common_routes_with_ready(repo))
        .nest("/books", books);
    let app = with_api_layers(app, &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
