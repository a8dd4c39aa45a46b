//! SQLite implementation of the card index.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use cardlens_core::fingerprint::Fingerprint;
use cardlens_core::index::{CardIndex, IndexError, IndexedFingerprint, ReferenceCard};

/// SQLite-backed card index.
///
/// Card rows live in the database; image bytes live as files named by their
/// `image` column in a sibling directory. Inserts are atomic across both: the
/// image is written ahead under a `.part` name, the row is inserted inside a
/// transaction, the part file is renamed into place, and only then is the
/// transaction committed. Readers never observe one half without the other.
#[derive(Clone)]
pub struct SqliteCardIndex {
    pool: SqlitePool,
    images_dir: PathBuf,
}

impl SqliteCardIndex {
    /// Open the index, creating the database file, schema, and image
    /// directory as needed.
    pub async fn open(db_path: &Path, images_dir: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(images_dir)?;

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| IndexError::Migration(e.to_string()))?;

        tracing::info!(db = %db_path.display(), "card index opened");

        Ok(Self {
            pool,
            images_dir: images_dir.to_path_buf(),
        })
    }

    /// Path of a stored reference image.
    pub fn image_path(&self, image: &str) -> PathBuf {
        self.images_dir.join(image)
    }
}

#[async_trait]
impl CardIndex for SqliteCardIndex {
    async fn exists_by_print_id(&self, print_id: &str) -> Result<bool, IndexError> {
        let row: Option<i64> =
            sqlx::query_scalar("SELECT id FROM cards WHERE print_id = ?1 LIMIT 1")
                .bind(print_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IndexError::Query(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn exists_by_image(&self, image: &str) -> Result<bool, IndexError> {
        let row: Option<i64> = sqlx::query_scalar("SELECT id FROM cards WHERE image = ?1 LIMIT 1")
            .bind(image)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexError::Query(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn insert(&self, card: &ReferenceCard, image_bytes: &[u8]) -> Result<(), IndexError> {
        let final_path = self.images_dir.join(&card.image);
        let part_path = self.images_dir.join(format!("{}.part", card.image));

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Query(e.to_string()))?;

        sqlx::query(
            "INSERT INTO cards (print_id, name, pitch, raw_data, image, fingerprint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&card.print_id)
        .bind(&card.name)
        .bind(&card.pitch)
        .bind(card.raw_data.to_string())
        .bind(&card.image)
        .bind(card.fingerprint.to_hex())
        .execute(&mut *tx)
        .await
        .map_err(|e| IndexError::Query(e.to_string()))?;

        // The row is still invisible; land the image bytes before committing.
        if let Err(e) =
            std::fs::write(&part_path, image_bytes).and_then(|()| std::fs::rename(&part_path, &final_path))
        {
            let _ = std::fs::remove_file(&part_path);
            return Err(IndexError::Io(e));
        }

        if let Err(e) = tx.commit().await {
            let _ = std::fs::remove_file(&final_path);
            return Err(IndexError::Query(e.to_string()));
        }

        tracing::debug!(print_id = %card.print_id, image = %card.image, "card inserted");
        Ok(())
    }

    async fn list_fingerprints(&self) -> Result<Vec<IndexedFingerprint>, IndexError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT image, fingerprint FROM cards ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| IndexError::Query(e.to_string()))?;

        rows.into_iter()
            .map(|(image, hex)| {
                Fingerprint::from_hex(&hex)
                    .map(|fingerprint| IndexedFingerprint { image, fingerprint })
                    .map_err(|e| IndexError::InvalidRecord(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn card(print_id: &str, image: &str) -> ReferenceCard {
        ReferenceCard {
            print_id: print_id.to_string(),
            name: format!("Card {print_id}"),
            pitch: Some("1".to_string()),
            raw_data: serde_json::json!({"print_id": print_id, "name": format!("Card {print_id}")}),
            image: image.to_string(),
            fingerprint: Fingerprint::new([0xAB, 0xCD, 1, 2, 3, 4, 5, 6]),
        }
    }

    async fn open_index(tmp: &TempDir) -> SqliteCardIndex {
        SqliteCardIndex::open(&tmp.path().join("cards.db"), &tmp.path().join("cards"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_persists_row_and_image() {
        let tmp = TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        index.insert(&card("p1", "p1.webp"), b"imagebytes").await.unwrap();

        assert!(index.exists_by_print_id("p1").await.unwrap());
        assert!(index.exists_by_image("p1.webp").await.unwrap());
        assert!(!index.exists_by_print_id("p2").await.unwrap());

        let listed = index.list_fingerprints().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].image, "p1.webp");
        assert_eq!(listed[0].fingerprint.to_hex(), "abcd010203040506");

        assert_eq!(std::fs::read(index.image_path("p1.webp")).unwrap(), b"imagebytes");
        assert!(!index.image_path("p1.webp.part").exists());
    }

    #[tokio::test]
    async fn duplicate_print_id_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        index.insert(&card("p1", "p1.webp"), b"a").await.unwrap();
        let err = index.insert(&card("p1", "other.webp"), b"b").await;

        assert!(matches!(err, Err(IndexError::Query(_))));
        assert_eq!(index.list_fingerprints().await.unwrap().len(), 1);
        // The rejected insert left no image file behind.
        assert!(!index.image_path("other.webp").exists());
    }

    #[tokio::test]
    async fn failed_image_write_leaves_no_visible_row() {
        let tmp = TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        // An image name pointing into a nonexistent subdirectory makes the
        // byte write fail after the (uncommitted) row insert.
        let err = index.insert(&card("p1", "missing/p1.webp"), b"a").await;

        assert!(matches!(err, Err(IndexError::Io(_))));
        assert!(!index.exists_by_print_id("p1").await.unwrap());
        assert!(!index.exists_by_image("missing/p1.webp").await.unwrap());
        assert!(index.list_fingerprints().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopen_preserves_rows() {
        let tmp = TempDir::new().unwrap();
        {
            let index = open_index(&tmp).await;
            index.insert(&card("p1", "p1.webp"), b"a").await.unwrap();
        }

        let reopened = open_index(&tmp).await;
        assert!(reopened.exists_by_print_id("p1").await.unwrap());
        assert_eq!(reopened.list_fingerprints().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_all_land() {
        let tmp = TempDir::new().unwrap();
        let index = std::sync::Arc::new(open_index(&tmp).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let index = std::sync::Arc::clone(&index);
            handles.push(tokio::spawn(async move {
                index
                    .insert(&card(&format!("p{i}"), &format!("p{i}.webp")), b"bytes")
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(index.list_fingerprints().await.unwrap().len(), 8);
    }
}
