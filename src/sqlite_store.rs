//! SQLite-backed [`Store`] implementation.
//!
//! List-valued component fields are stored as JSON text columns; vectors
//! are little-endian `f32` BLOBs. Timestamps are Unix seconds.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use component_atlas_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use component_atlas_core::models::{
    Component, ComponentLocation, ComponentProvenance, ComponentVector,
};
use component_atlas_core::signature::signature;
use component_atlas_core::store::{Store, StoredVector, VectorCandidate};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_ts(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).with_context(|| format!("timestamp out of range: {}", ts))
}

fn json_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw).with_context(|| format!("malformed {} column", column))
}

fn component_from_row(row: &SqliteRow) -> Result<Component> {
    let component_type: String = row.get("component_type");
    let sync_status: String = row.get("sync_status");
    let lines_of_code: i64 = row.get("lines_of_code");
    let cyclomatic_complexity: Option<i64> = row.get("cyclomatic_complexity");

    Ok(Component {
        component_id: row.get("component_id"),
        name: row.get("name"),
        component_type: component_type.parse()?,
        repository: row.get("repository"),
        files: json_list(row, "files_json")?,
        language: row.get("language"),
        api_signature: row.get("api_signature"),
        imports: json_list(row, "imports_json")?,
        keywords: json_list(row, "keywords_json")?,
        description: row.get("description"),
        lines_of_code: lines_of_code as u32,
        cyclomatic_complexity: cyclomatic_complexity.map(|c| c as u32),
        public_methods: json_list(row, "public_methods_json")?,
        first_seen: from_ts(row.get("first_seen"))?,
        sync_status: sync_status.parse()?,
    })
}

const COMPONENT_COLUMNS: &str = "component_id, repository, name, component_type, files_json, \
    language, api_signature, imports_json, keywords_json, description, lines_of_code, \
    cyclomatic_complexity, public_methods_json, first_seen, sync_status";

#[async_trait]
impl Store for SqliteStore {
    async fn replace_repository_components(
        &self,
        repository: &str,
        components: &[Component],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let previous: HashMap<String, i64> =
            sqlx::query("SELECT component_id, first_seen FROM components WHERE repository = ?")
                .bind(repository)
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|row| (row.get("component_id"), row.get("first_seen")))
                .collect();

        sqlx::query("DELETE FROM components WHERE repository = ?")
            .bind(repository)
            .execute(&mut *tx)
            .await?;

        for c in components {
            let mut first_seen = c.first_seen.timestamp();
            if let Some(old) = previous.get(&c.component_id) {
                first_seen = first_seen.min(*old);
            }
            sqlx::query(
                r#"
                INSERT INTO components (component_id, repository, name, component_type,
                                        primary_file, files_json, language, api_signature,
                                        imports_json, keywords_json, description, lines_of_code,
                                        cyclomatic_complexity, public_methods_json, first_seen,
                                        sync_status, signature)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(component_id) DO UPDATE SET
                    repository = excluded.repository,
                    name = excluded.name,
                    component_type = excluded.component_type,
                    primary_file = excluded.primary_file,
                    files_json = excluded.files_json,
                    language = excluded.language,
                    api_signature = excluded.api_signature,
                    imports_json = excluded.imports_json,
                    keywords_json = excluded.keywords_json,
                    description = excluded.description,
                    lines_of_code = excluded.lines_of_code,
                    cyclomatic_complexity = excluded.cyclomatic_complexity,
                    public_methods_json = excluded.public_methods_json,
                    first_seen = excluded.first_seen,
                    sync_status = excluded.sync_status,
                    signature = excluded.signature
                "#,
            )
            .bind(&c.component_id)
            .bind(repository)
            .bind(&c.name)
            .bind(c.component_type.as_str())
            .bind(c.primary_file())
            .bind(serde_json::to_string(&c.files)?)
            .bind(&c.language)
            .bind(&c.api_signature)
            .bind(serde_json::to_string(&c.imports)?)
            .bind(serde_json::to_string(&c.keywords)?)
            .bind(&c.description)
            .bind(c.lines_of_code as i64)
            .bind(c.cyclomatic_complexity.map(|v| v as i64))
            .bind(serde_json::to_string(&c.public_methods)?)
            .bind(first_seen)
            .bind(c.sync_status.as_str())
            .bind(signature(c))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_component(&self, component_id: &str) -> Result<Option<Component>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM components WHERE component_id = ?",
            COMPONENT_COLUMNS
        ))
        .bind(component_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(component_from_row).transpose()
    }

    async fn list_components(&self, repository: Option<&str>) -> Result<Vec<Component>> {
        let rows = match repository {
            Some(repo) => {
                sqlx::query(&format!(
                    "SELECT {} FROM components WHERE repository = ? ORDER BY repository, primary_file",
                    COMPONENT_COLUMNS
                ))
                .bind(repo)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM components ORDER BY repository, primary_file",
                    COMPONENT_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(component_from_row).collect()
    }

    async fn get_vector(&self, component_id: &str) -> Result<Option<StoredVector>> {
        let row = sqlx::query(
            "SELECT component_id, model, dimension, embedding, last_updated FROM component_vectors WHERE component_id = ?",
        )
        .bind(component_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let blob: Vec<u8> = row.get("embedding");
        let dimension: i64 = row.get("dimension");
        let id: String = row.get("component_id");
        Ok(Some(StoredVector {
            info: ComponentVector {
                vector_id: id.clone(),
                component_id: id,
                dimension: dimension as usize,
                model: row.get("model"),
                last_updated: from_ts(row.get("last_updated"))?,
            },
            vector: blob_to_vec(&blob),
        }))
    }

    async fn upsert_vector(
        &self,
        component_id: &str,
        vector: &[f32],
        model: &str,
    ) -> Result<ComponentVector> {
        let now = Utc::now();
        let blob = vec_to_blob(vector);

        sqlx::query(
            r#"
            INSERT INTO component_vectors (component_id, model, dimension, embedding, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(component_id) DO UPDATE SET
                model = excluded.model,
                dimension = excluded.dimension,
                embedding = excluded.embedding,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(component_id)
        .bind(model)
        .bind(vector.len() as i64)
        .bind(&blob)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(ComponentVector {
            vector_id: component_id.to_string(),
            component_id: component_id.to_string(),
            dimension: vector.len(),
            model: model.to_string(),
            last_updated: from_ts(now.timestamp())?,
        })
    }

    async fn components_without_vectors(&self, limit: Option<usize>) -> Result<Vec<Component>> {
        let columns = COMPONENT_COLUMNS
            .split(", ")
            .map(|c| format!("c.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM components c
            LEFT JOIN component_vectors cv ON cv.component_id = c.component_id
            WHERE cv.component_id IS NULL
            ORDER BY c.repository, c.primary_file
            LIMIT ?
            "#,
            columns
        ))
        .bind(limit.map(|l| l as i64).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(component_from_row).collect()
    }

    async fn clear_vectors(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM component_vectors")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        exclude_component_id: &str,
        min_similarity: f64,
    ) -> Result<Vec<VectorCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT cv.component_id, cv.embedding, c.repository, c.first_seen
            FROM component_vectors cv
            JOIN components c ON c.component_id = cv.component_id
            WHERE cv.component_id != ?
            "#,
        )
        .bind(exclude_component_id)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::new();
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let similarity = cosine_similarity(query_vec, &blob_to_vec(&blob));
            if similarity < min_similarity {
                continue;
            }
            candidates.push(VectorCandidate {
                component_id: row.get("component_id"),
                repository: row.get("repository"),
                first_seen: from_ts(row.get("first_seen"))?,
                similarity,
            });
        }

        Ok(candidates)
    }

    async fn replace_provenance(&self, entries: &[ComponentProvenance]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM component_provenance")
            .execute(&mut *tx)
            .await?;

        for p in entries {
            sqlx::query(
                r#"
                INSERT INTO component_provenance (component_id, signature, component_name,
                                                  component_type, origin_repository, first_seen,
                                                  locations_json, consolidation_status)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&p.component_id)
            .bind(&p.signature)
            .bind(&p.component_name)
            .bind(p.component_type.as_str())
            .bind(&p.origin_repository)
            .bind(p.first_seen.timestamp())
            .bind(serde_json::to_string(&p.locations)?)
            .bind(p.consolidation_status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_provenance(&self) -> Result<Vec<ComponentProvenance>> {
        let rows = sqlx::query(
            r#"
            SELECT component_id, signature, component_name, component_type, origin_repository,
                   first_seen, locations_json, consolidation_status
            FROM component_provenance
            ORDER BY component_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let component_type: String = row.get("component_type");
                let status: String = row.get("consolidation_status");
                let locations_json: String = row.get("locations_json");
                let locations: Vec<ComponentLocation> = serde_json::from_str(&locations_json)
                    .context("malformed locations_json column")?;
                Ok(ComponentProvenance {
                    component_id: row.get("component_id"),
                    signature: row.get("signature"),
                    component_name: row.get("component_name"),
                    component_type: component_type.parse()?,
                    origin_repository: row.get("origin_repository"),
                    first_seen: from_ts(row.get("first_seen"))?,
                    locations,
                    consolidation_status: status.parse()?,
                })
            })
            .collect()
    }
}
