//! Store selection and the per-entity services shared by all handlers.

use std::sync::Arc;

use hotelbook_bookings::Booking;
use hotelbook_core::PageLimits;
use hotelbook_customers::Customer;
use hotelbook_hotels::Hotel;
use hotelbook_infra::{CATALOG, EntityService, InMemoryStore, Store};
use hotelbook_rooms::Room;

use crate::config::ApiConfig;

pub type Service<E> = EntityService<E, Arc<dyn Store>>;

pub struct AppServices {
    pub hotels: Service<Hotel>,
    pub rooms: Service<Room>,
    pub bookings: Service<Booking>,
    pub customers: Service<Customer>,
}

impl AppServices {
    pub fn new(store: Arc<dyn Store>, limits: PageLimits) -> Self {
        Self {
            hotels: EntityService::new(store.clone(), limits),
            rooms: EntityService::new(store.clone(), limits),
            bookings: EntityService::new(store.clone(), limits),
            customers: EntityService::new(store, limits),
        }
    }

    pub fn in_memory(limits: PageLimits) -> Self {
        Self::new(Arc::new(InMemoryStore::new(&CATALOG)), limits)
    }

    /// Pick the store for this process: Postgres when built with the
    /// `postgres` feature and `DATABASE_URL` is set, in-memory otherwise.
    pub async fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        #[cfg(feature = "postgres")]
        if let Some(url) = &config.database_url {
            return Self::postgres(url, config.limits).await;
        }

        #[cfg(not(feature = "postgres"))]
        if config.database_url.is_some() {
            tracing::warn!("DATABASE_URL is set but the postgres feature is disabled; using in-memory store");
        }

        tracing::info!("using in-memory store");
        Ok(Self::in_memory(config.limits))
    }

    #[cfg(feature = "postgres")]
    pub async fn postgres(url: &str, limits: PageLimits) -> anyhow::Result<Self> {
        use anyhow::Context;
        use hotelbook_infra::store::PostgresStore;

        let pool = sqlx::PgPool::connect(url)
            .await
            .context("failed to connect to postgres")?;
        let store = PostgresStore::new(pool, &CATALOG);
        store.bootstrap().await.context("schema bootstrap failed")?;
        tracing::info!("using postgres store");
        Ok(Self::new(Arc::new(store), limits))
    }
}
