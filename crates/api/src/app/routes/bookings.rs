use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::Response,
    routing::{get, post},
    Router,
};

use hotelbook_bookings::Booking;
use hotelbook_customers::Customer;
use hotelbook_rooms::Room;

use crate::app::routes::resource::{self, Resource};
use crate::app::services::{AppServices, Service};

impl Resource for Booking {
    const COLLECTION: &'static str = "bookings";

    fn service(services: &AppServices) -> &Service<Self> {
        &services.bookings
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(resource::create::<Booking>).get(resource::list::<Booking>))
        .route("/meta", post(resource::meta::<Booking>))
        .route(
            "/:id",
            get(resource::get::<Booking>)
                .patch(resource::update::<Booking>)
                .delete(resource::delete::<Booking>),
        )
        .route("/:id/room", get(get_room))
        .route("/:id/customer", get(get_customer))
}

pub async fn get_room(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    resource::get_related::<Booking, Room>(&services, &id, "room").await
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    resource::get_related::<Booking, Customer>(&services, &id, "customer").await
}
