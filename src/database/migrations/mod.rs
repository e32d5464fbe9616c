//! SeaORM migrations for the job store
//!
//! The schema is database-agnostic and runs on SQLite, PostgreSQL and MySQL.

use sea_orm_migration::prelude::*;

pub mod m20251017_000001_create_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20251017_000001_create_jobs::Migration)]
    }
}
