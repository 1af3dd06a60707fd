use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::Response,
    routing::{get, post},
    Json, Router,
};

use hotelbook_hotels::Hotel;
use hotelbook_rooms::Room;

use crate::app::dto::{FindManyQuery, RelationBody};
use crate::app::routes::resource::{self, RelationOp, Resource};
use crate::app::services::{AppServices, Service};

impl Resource for Hotel {
    const COLLECTION: &'static str = "hotels";

    fn service(services: &AppServices) -> &Service<Self> {
        &services.hotels
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(resource::create::<Hotel>).get(resource::list::<Hotel>))
        .route("/meta", post(resource::meta::<Hotel>))
        .route(
            "/:id",
            get(resource::get::<Hotel>)
                .patch(resource::update::<Hotel>)
                .delete(resource::delete::<Hotel>),
        )
        .route(
            "/:id/rooms",
            get(find_rooms)
                .post(connect_rooms)
                .delete(disconnect_rooms)
                .patch(replace_rooms),
        )
}

pub async fn find_rooms(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<FindManyQuery>,
) -> Response {
    resource::list_related::<Hotel, Room>(&services, &id, "rooms", query).await
}

pub async fn connect_rooms(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RelationBody>,
) -> Response {
    resource::mutate_relation::<Hotel>(&services, &id, "rooms", RelationOp::Connect, body).await
}

pub async fn disconnect_rooms(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RelationBody>,
) -> Response {
    resource::mutate_relation::<Hotel>(&services, &id, "rooms", RelationOp::Disconnect, body).await
}

pub async fn replace_rooms(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RelationBody>,
) -> Response {
    resource::mutate_relation::<Hotel>(&services, &id, "rooms", RelationOp::Replace, body).await
}
