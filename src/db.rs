use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            ..Default::default()
        }
    }
}

/// Establishes a connection pool to the database with custom configuration
///
/// # Errors
/// Returns `ServiceError::DatabaseError` if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("storefront_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        ServiceError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Runs the embedded migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    debug!("Checking database connection");
    let start = std::time::Instant::now();

    let result = pool.ping().await.map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            gauge!(
                "storefront_db.connection_latency",
                elapsed.as_millis() as f64
            );
        }
        Err(e) => {
            error!(
                "Database connection check failed after {:?}: {}",
                elapsed, e
            );
            counter!("storefront_db.connection_failures", 1);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_pool(dir: &tempfile::TempDir) -> DbPool {
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("db-test.sqlite").display()
        );
        establish_connection_with_config(&DbConfig {
            url,
            max_connections: 2,
            ..Default::default()
        })
        .await
        .expect("sqlite pool")
    }

    #[tokio::test]
    async fn migrations_run_and_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pool = temp_pool(&dir).await;

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
        check_connection(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn migrated_money_columns_store_decimals() {
        use crate::entities::product;
        use crate::services::commerce::product_catalog_service::UnitPricingInput;
        use crate::services::commerce::{CreateProductInput, ProductCatalogService};
        use rust_decimal_macros::dec;
        use sea_orm::EntityTrait;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let pool = temp_pool(&dir).await;
        run_migrations(&pool).await.unwrap();

        let pool = Arc::new(pool);
        let catalog = ProductCatalogService::new(pool.clone(), Default::default(), "http://localhost");
        let created = catalog
            .create_product(CreateProductInput {
                name: "Gula Aren".into(),
                sku: "GA-1".into(),
                slug: None,
                units: vec![UnitPricingInput::new("PCS", dec!(12000.5), dec!(12500.5))],
                stock: 3,
                supplier: None,
                categories: "Sembako".into(),
                price: None,
                weight: dec!(250.5),
                short_description: None,
                description: None,
                status: 1,
            })
            .await
            .unwrap();

        let stored = product::Entity::find_by_id(created.id)
            .one(&*pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.retail_price_1, dec!(12500.5));
        assert_eq!(stored.bulk_price_1, dec!(12000.5));
        assert_eq!(stored.weight, dec!(250.5));
    }

    #[test]
    fn app_config_tuning_is_applied() {
        let mut cfg = AppConfig::new(
            "sqlite://x.db".into(),
            "127.0.0.1".into(),
            9000,
            "development".into(),
        );
        cfg.db_max_connections = 3;
        cfg.db_idle_timeout_secs = 5;

        let db_cfg = DbConfig::from(&cfg);
        assert_eq!(db_cfg.max_connections, 3);
        assert_eq!(db_cfg.idle_timeout, Duration::from_secs(5));
        assert_eq!(db_cfg.url, "sqlite://x.db");
    }
}
