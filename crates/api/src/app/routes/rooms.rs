use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::Response,
    routing::{get, post},
    Json, Router,
};

use hotelbook_bookings::Booking;
use hotelbook_hotels::Hotel;
use hotelbook_rooms::Room;

use crate::app::dto::{FindManyQuery, RelationBody};
use crate::app::routes::resource::{self, RelationOp, Resource};
use crate::app::services::{AppServices, Service};

impl Resource for Room {
    const COLLECTION: &'static str = "rooms";

    fn service(services: &AppServices) -> &Service<Self> {
        &services.rooms
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(resource::create::<Room>).get(resource::list::<Room>))
        .route("/meta", post(resource::meta::<Room>))
        .route(
            "/:id",
            get(resource::get::<Room>)
                .patch(resource::update::<Room>)
                .delete(resource::delete::<Room>),
        )
        .route("/:id/hotel", get(get_hotel))
        .route(
            "/:id/bookings",
            get(find_bookings)
                .post(connect_bookings)
                .delete(disconnect_bookings)
                .patch(replace_bookings),
        )
}

pub async fn get_hotel(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    resource::get_related::<Room, Hotel>(&services, &id, "hotel").await
}

pub async fn find_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<FindManyQuery>,
) -> Response {
    resource::list_related::<Room, Booking>(&services, &id, "bookings", query).await
}

pub async fn connect_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RelationBody>,
) -> Response {
    resource::mutate_relation::<Room>(&services, &id, "bookings", RelationOp::Connect, body).await
}

pub async fn disconnect_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RelationBody>,
) -> Response {
    resource::mutate_relation::<Room>(&services, &id, "bookings", RelationOp::Disconnect, body).await
}

pub async fn replace_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RelationBody>,
) -> Response {
    resource::mutate_relation::<Room>(&services, &id, "bookings", RelationOp::Replace, body).await
}
