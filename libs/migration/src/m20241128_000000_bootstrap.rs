use sea_orm_migration::prelude::*;

/// Trigger function both tables use to keep `updated_at` current on every write.
/// Installed by both migrators, so every statement here is re-runnable. Rolling it
/// back fails while another service's table still has a trigger on it.
const UP: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS util",
    r#"
    CREATE OR REPLACE FUNCTION util.touch_updated_at()
    RETURNS TRIGGER AS $$
    BEGIN
        NEW.updated_at = NOW();
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql
    "#,
];

const DOWN: &[&str] = &[
    "DROP FUNCTION IF EXISTS util.touch_updated_at()",
    "DROP SCHEMA IF EXISTS util",
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for sql in UP {
            manager.get_connection().execute_unprepared(sql).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for sql in DOWN {
            manager.get_connection().execute_unprepared(sql).await?;
        }
        Ok(())
    }
}
