//! Database statistics.
//!
//! `atlas stats` summarizes what is tracked: components, vector coverage,
//! provenance families, and a per-repository breakdown.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use component_atlas_core::store::Store;

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryStats {
    pub repository: String,
    pub components: i64,
    pub embedded: i64,
    /// Earliest `first_seen`, Unix seconds.
    pub oldest: Option<i64>,
}

pub async fn repository_stats(pool: &SqlitePool) -> Result<Vec<RepositoryStats>> {
    let rows = sqlx::query(
        r#"
        SELECT
            c.repository,
            COUNT(*) AS component_count,
            COUNT(v.component_id) AS embedded_count,
            MIN(c.first_seen) AS oldest
        FROM components c
        LEFT JOIN component_vectors v ON v.component_id = c.component_id
        GROUP BY c.repository
        ORDER BY component_count DESC, c.repository ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| RepositoryStats {
            repository: row.get("repository"),
            components: row.get("component_count"),
            embedded: row.get("embedded_count"),
            oldest: row.get("oldest"),
        })
        .collect())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = db::open_store(config).await?;
    let pool = store.pool();

    let total_components: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM components")
        .fetch_one(pool)
        .await?;
    let total_embedded: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM component_vectors v JOIN components c ON c.component_id = v.component_id",
    )
    .fetch_one(pool)
    .await?;
    let provenance = store.list_provenance().await?;
    let duplicated = provenance.iter().filter(|p| p.is_duplicated()).count();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Component Atlas — Database Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Components:  {}", total_components);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        total_components,
        if total_components > 0 {
            (total_embedded * 100) / total_components
        } else {
            0
        }
    );
    println!("  Families:    {} ({} duplicated)", provenance.len(), duplicated);

    let per_repo = repository_stats(pool).await?;
    if !per_repo.is_empty() {
        println!();
        println!("  By repository:");
        println!(
            "  {:<32} {:>10} {:>10}   {}",
            "REPOSITORY", "COMPONENTS", "EMBEDDED", "OLDEST"
        );
        println!("  {}", "-".repeat(72));
        for s in &per_repo {
            let oldest = s.oldest.map(format_ts).unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<32} {:>10} {:>10}   {}",
                s.repository, s.components, s.embedded, oldest
            );
        }
    }
    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn timestamps_render_as_dates() {
        assert_eq!(format_ts(0), "1970-01-01");
    }
}
