//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! cw-cli migrate
//! ```
//!
//! # Migration Files
//!
//! Storefront migrations live in `crates/storefront/migrations/`:
//! ```text
//! migrations/
//! ├── 20261019000001_create_catalog.sql
//! ├── 20261019000002_create_carts.sql
//! ├── 20261019000003_create_addresses.sql
//! └── 20261019000004_create_orders.sql
//! ```

use super::{CommandError, connect};

/// Run storefront database migrations.
pub async fn storefront() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
