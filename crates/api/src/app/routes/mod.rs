use axum::Router;

pub mod bookings;
pub mod customers;
pub mod hotels;
pub mod resource;
pub mod rooms;
pub mod system;

/// Router for the entity collections, mounted under `/api`.
pub fn router() -> Router {
    Router::new()
        .nest("/hotels", hotels::router())
        .nest("/rooms", rooms::router())
        .nest("/bookings", bookings::router())
        .nest("/customers", customers::router())
}
