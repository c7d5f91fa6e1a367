//! PostgreSQL implementation of the storage traits.
//!
//! Filters and sparse patches are expressed as static SQL with nullable
//! parameters (`$1::text IS NULL OR …`, `CASE WHEN $present THEN $value …`),
//! so no statement text is assembled from request data.

mod applications;
mod chat;
mod preparation;
mod research;

use sqlx::PgPool;

/// Storage backend over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
