pub use sea_orm_migration::prelude::*;

mod m20261001_000001_sessions;
mod m20261001_000002_live_name_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_sessions::Migration),
            Box::new(m20261001_000002_live_name_index::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm_migration::sea_orm::{ConnectOptions, Database};

    #[tokio::test]
    async fn test_up_down_up() {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1);
        let db = Database::connect(opts).await.unwrap();
        let manager = SchemaManager::new(&db);

        Migrator::up(&db, None).await.unwrap();
        assert!(manager.has_table("sessions").await.unwrap());
        assert!(manager.has_index("sessions", "uq_sessions_live_name").await.unwrap());

        Migrator::down(&db, None).await.unwrap();
        assert!(!manager.has_table("sessions").await.unwrap());

        Migrator::up(&db, None).await.unwrap();
        assert!(manager.has_table("sessions").await.unwrap());
    }
}
