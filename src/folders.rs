//! Folder tree with stable vector namespaces.
//!
//! Folders are deduplicated by `(parent_id, name)`; a folder's namespace is
//! assigned once at creation and never changes, since index entries written
//! under it would orphan otherwise.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::Folder;

/// Namespace used for documents that live outside any folder.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Find or create a folder under `parent_id`. Returns the folder and
/// whether it was newly created.
pub async fn ensure_folder(
    pool: &SqlitePool,
    parent_id: Option<&str>,
    name: &str,
) -> Result<(Folder, bool)> {
    if let Some(folder) = find_folder(pool, parent_id, name).await? {
        return Ok((folder, false));
    }

    let folder = Folder {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        parent_id: parent_id.map(|s| s.to_string()),
        namespace: Uuid::new_v4().to_string(),
    };

    let result = sqlx::query(
        "INSERT INTO folders (id, name, parent_id, namespace, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&folder.id)
    .bind(&folder.name)
    .bind(&folder.parent_id)
    .bind(&folder.namespace)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok((folder, true)),
        // A concurrent ingest created the same (parent, name) first.
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = find_folder(pool, parent_id, name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("folder vanished after unique violation"))?;
            Ok((existing, false))
        }
        Err(e) => Err(e.into()),
    }
}

async fn find_folder(
    pool: &SqlitePool,
    parent_id: Option<&str>,
    name: &str,
) -> Result<Option<Folder>> {
    let row = sqlx::query(
        "SELECT id, name, parent_id, namespace FROM folders WHERE name = ? AND parent_id IS ?",
    )
    .bind(name)
    .bind(parent_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Folder {
        id: row.get("id"),
        name: row.get("name"),
        parent_id: row.get("parent_id"),
        namespace: row.get("namespace"),
    }))
}

/// Find or create the folder at the end of a directory path, creating
/// intermediate folders as needed. Returns the leaf folder id and the
/// names of folders created along the way.
pub async fn ensure_path(
    pool: &SqlitePool,
    root: Option<&str>,
    components: &[&str],
) -> Result<(Option<String>, Vec<String>)> {
    let mut parent = root.map(|s| s.to_string());
    let mut created = Vec::new();

    for component in components {
        let (folder, was_created) = ensure_folder(pool, parent.as_deref(), component).await?;
        if was_created {
            created.push(folder.name.clone());
        }
        parent = Some(folder.id);
    }

    Ok((parent, created))
}

/// The vector namespace for a folder, or [`DEFAULT_NAMESPACE`] when the
/// document lives outside any folder.
pub async fn namespace_for(pool: &SqlitePool, folder_id: Option<&str>) -> Result<String> {
    match folder_id {
        None => Ok(DEFAULT_NAMESPACE.to_string()),
        Some(id) => {
            let namespace: Option<String> =
                sqlx::query_scalar("SELECT namespace FROM folders WHERE id = ?")
                    .bind(id)
                    .fetch_optional(pool)
                    .await?;
            namespace.ok_or_else(|| anyhow::anyhow!("unknown folder: {}", id))
        }
    }
}

/// Every namespace a query can reach: all folder namespaces plus the
/// default.
pub async fn all_namespaces(pool: &SqlitePool) -> Result<Vec<String>> {
    let mut namespaces: Vec<String> = sqlx::query_scalar("SELECT namespace FROM folders")
        .fetch_all(pool)
        .await?;
    namespaces.push(DEFAULT_NAMESPACE.to_string());
    Ok(namespaces)
}
