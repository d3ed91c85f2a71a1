use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Create components table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS components (
            component_id TEXT PRIMARY KEY,
            repository TEXT NOT NULL,
            name TEXT NOT NULL,
            component_type TEXT NOT NULL,
            primary_file TEXT NOT NULL,
            files_json TEXT NOT NULL DEFAULT '[]',
            language TEXT NOT NULL,
            api_signature TEXT NOT NULL DEFAULT '',
            imports_json TEXT NOT NULL DEFAULT '[]',
            keywords_json TEXT NOT NULL DEFAULT '[]',
            description TEXT,
            lines_of_code INTEGER NOT NULL,
            cyclomatic_complexity INTEGER,
            public_methods_json TEXT NOT NULL DEFAULT '[]',
            first_seen INTEGER NOT NULL,
            sync_status TEXT NOT NULL DEFAULT 'unknown',
            signature TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create component_vectors table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS component_vectors (
            component_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dimension INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            last_updated INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create component_provenance table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS component_provenance (
            component_id TEXT PRIMARY KEY,
            signature TEXT NOT NULL,
            component_name TEXT NOT NULL,
            component_type TEXT NOT NULL,
            origin_repository TEXT NOT NULL,
            first_seen INTEGER NOT NULL,
            locations_json TEXT NOT NULL DEFAULT '[]',
            consolidation_status TEXT NOT NULL DEFAULT 'unconsolidated'
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_components_repository ON components(repository)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_components_signature ON components(signature)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_provenance_signature ON component_provenance(signature)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
