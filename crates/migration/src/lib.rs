pub use sea_orm_migration::prelude::*;

mod m20260110_000001_org_core;
mod m20260110_000002_documents;
mod m20260110_000003_processes_leave;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260110_000001_org_core::Migration),
            Box::new(m20260110_000002_documents::Migration),
            Box::new(m20260110_000003_processes_leave::Migration),
        ]
    }
}
