use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::env;
use std::time::Duration;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

const DEFAULT_POOL_SIZE: u32 = 10;

// pool for the blocking diesel work behind the handlers and the sweep;
// DATABASE_POOL_SIZE caps it, unset means the default
pub fn create_db_connection_pool() -> Pool<ConnectionManager<PgConnection>> {
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool_size = env::var("DATABASE_POOL_SIZE")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(DEFAULT_POOL_SIZE);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(pool_size)
        .connection_timeout(Duration::from_secs(10))
        .test_on_check_out(true)
        .build(manager)
        .expect("Failed to create db connection pool.")
}

pub fn run_migrations(pool: &Pool<ConnectionManager<PgConnection>>) {
    pool.get()
        .unwrap()
        .run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");
}
