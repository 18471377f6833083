//! Demo CRUD endpoints exercising the resolver's read/write split.
//!
//! `list_items` is a read: it is handed the request's [`RequestContext`] and
//! the resolver decides primary vs. replica per its routing rules.
//! `create_item` is a write: it always goes to primary via
//! [`dbresolver::Resolver::exec`], bypassing routing entirely.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::middleware::request_context::context_of;
use crate::AppResolver;

#[derive(Debug, Serialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateItem {
    pub name: String,
}

/// `GET /api/v1/items` — routed per the incoming request's method/path,
/// per §4.4 of the routing contract.
pub async fn list_items(req: HttpRequest, resolver: web::Data<AppResolver>) -> impl Responder {
    let ctx = context_of(&req);
    let result = resolver
        .query(&ctx, |pool| async move {
            sqlx::query("SELECT id, name FROM items ORDER BY id")
                .fetch_all(&pool)
                .await
                .map_err(dbresolver::ResolverError::from)
        })
        .await;

    match result {
        Ok(rows) => {
            let items: Vec<Item> = rows
                .iter()
                .map(|row| Item {
                    id: row.get("id"),
                    name: row.get("name"),
                })
                .collect();
            HttpResponse::Ok().json(items)
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to list items");
            HttpResponse::ServiceUnavailable().body(err.to_string())
        }
    }
}

/// `POST /api/v1/items` — write-style operation, always primary.
pub async fn create_item(
    resolver: web::Data<AppResolver>,
    payload: web::Json<CreateItem>,
) -> impl Responder {
    let name = payload.into_inner().name;
    let result = resolver
        .exec(move |pool| async move {
            sqlx::query("INSERT INTO items (name) VALUES ($1) RETURNING id")
                .bind(&name)
                .fetch_one(&pool)
                .await
                .map(|row| row.get::<i64, _>("id"))
                .map_err(dbresolver::ResolverError::from)
        })
        .await;

    match result {
        Ok(id) => HttpResponse::Created().json(serde_json::json!({ "id": id })),
        Err(err) => {
            tracing::error!(error = %err, "failed to create item");
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}
