use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::Response,
    routing::{get, post},
    Json, Router,
};

use hotelbook_bookings::Booking;
use hotelbook_customers::Customer;

use crate::app::dto::{FindManyQuery, RelationBody};
use crate::app::routes::resource::{self, RelationOp, Resource};
use crate::app::services::{AppServices, Service};

impl Resource for Customer {
    const COLLECTION: &'static str = "customers";

    fn service(services: &AppServices) -> &Service<Self> {
        &services.customers
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(resource::create::<Customer>).get(resource::list::<Customer>))
        .route("/meta", post(resource::meta::<Customer>))
        .route(
            "/:id",
            get(resource::get::<Customer>)
                .patch(resource::update::<Customer>)
                .delete(resource::delete::<Customer>),
        )
        .route(
            "/:id/bookings",
            get(find_bookings)
                .post(connect_bookings)
                .delete(disconnect_bookings)
                .patch(replace_bookings),
        )
}

pub async fn find_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<FindManyQuery>,
) -> Response {
    resource::list_related::<Customer, Booking>(&services, &id, "bookings", query).await
}

pub async fn connect_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RelationBody>,
) -> Response {
    resource::mutate_relation::<Customer>(&services, &id, "bookings", RelationOp::Connect, body).await
}

pub async fn disconnect_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RelationBody>,
) -> Response {
    resource::mutate_relation::<Customer>(&services, &id, "bookings", RelationOp::Disconnect, body)
        .await
}

pub async fn replace_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RelationBody>,
) -> Response {
    resource::mutate_relation::<Customer>(&services, &id, "bookings", RelationOp::Replace, body).await
}
