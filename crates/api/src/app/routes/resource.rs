//! Handlers shared by every entity collection.
//!
//! CRUD, list and count handlers are generic over [`Resource`] and mounted
//! directly; relationship helpers take the relation name and are wrapped by
//! small per-entity handlers in the collection modules.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use hotelbook_core::Entity;

use crate::app::dto::{self, CountResponse, FindManyQuery, MetaQuery, RelationBody};
use crate::app::errors;
use crate::app::services::{AppServices, Service};

/// An entity exposed as an HTTP collection under `/api/{COLLECTION}`.
pub trait Resource: Entity + Serialize {
    const COLLECTION: &'static str;

    fn service(services: &AppServices) -> &Service<Self>;
}

/// Relationship-set mutation requested by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationOp {
    Connect,
    Disconnect,
    Replace,
}

pub async fn create<R>(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<R::Create>,
) -> Response
where
    R: Resource,
    R::Create: DeserializeOwned,
{
    match R::service(&services).create(body).await {
        Ok(entity) => {
            let location = format!("/api/{}/{}", R::COLLECTION, entity.id());
            (StatusCode::CREATED, [(header::LOCATION, location)], Json(entity)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list<R>(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<FindManyQuery>,
) -> Response
where
    R: Resource,
    R::Where: DeserializeOwned,
{
    let args = match query.into_args::<R::Where>() {
        Ok(args) => args,
        Err(resp) => return resp,
    };
    match R::service(&services).find_many(&args).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn meta<R>(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<MetaQuery>,
) -> Response
where
    R: Resource,
    R::Where: DeserializeOwned,
{
    let filter = match dto::parse_where::<R::Where>(query.where_.as_deref()) {
        Ok(filter) => filter,
        Err(resp) => return resp,
    };
    match R::service(&services).meta(filter.as_ref()).await {
        Ok(count) => (StatusCode::OK, Json(CountResponse { count })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get<R: Resource>(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let id = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match R::service(&services).get(&id).await {
        Ok(entity) => (StatusCode::OK, Json(entity)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update<R>(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<R::Update>,
) -> Response
where
    R: Resource,
    R::Update: DeserializeOwned,
{
    let id = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match R::service(&services).update(&id, body).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete<R: Resource>(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let id = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match R::service(&services).delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn mutate_relation<R: Resource>(
    services: &AppServices,
    id: &str,
    relation: &'static str,
    op: RelationOp,
    body: RelationBody,
) -> Response {
    let id = match dto::parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let ids = dto::relation_ids(body);
    let service = R::service(services);
    let result = match op {
        RelationOp::Connect => service.connect(&id, relation, &ids).await,
        RelationOp::Disconnect => service.disconnect(&id, relation, &ids).await,
        RelationOp::Replace => service.replace_all(&id, relation, &ids).await,
    };
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Members of a has-many relation of `R`, which are `T` rows.
pub async fn list_related<R, T>(
    services: &AppServices,
    id: &str,
    relation: &'static str,
    query: FindManyQuery,
) -> Response
where
    R: Resource,
    T: Resource,
    T::Where: DeserializeOwned,
{
    let id = match dto::parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let args = match query.into_args::<T::Where>() {
        Ok(args) => args,
        Err(resp) => return resp,
    };
    match R::service(services).find_related::<T>(&id, relation, &args).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// The `T` row a belongs-to relation of `R` points at.
pub async fn get_related<R: Resource, T: Resource>(
    services: &AppServices,
    id: &str,
    relation: &'static str,
) -> Response {
    let id = match dto::parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match R::service(services).get_related::<T>(&id, relation).await {
        Ok(entity) => (StatusCode::OK, Json(entity)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
