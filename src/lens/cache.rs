use crate::error::FacetLensError;
use crate::lens::types::SessionFacet;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const MAX_PLAIN_KEY_LEN: usize = 128;

/// On-disk facet store, one JSON file per session identifier. Entries never
/// expire; only [`FacetCache::clear`] removes them.
#[derive(Debug, Clone)]
pub struct FacetCache {
    dir: PathBuf,
}

fn is_plain_key(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_PLAIN_KEY_LEN
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn entry_file_name(id: &str) -> String {
    if is_plain_key(id) {
        format!("{id}.json")
    } else {
        format!("sha256-{:x}.json", Sha256::digest(id.as_bytes()))
    }
}

impl FacetCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(entry_file_name(id))
    }

    /// Look up a facet. Missing, unreadable and corrupt entries are all misses.
    pub async fn read(&self, id: &str) -> Option<SessionFacet> {
        let path = self.entry_path(id);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(session_id = id, path = %path.display(), error = %err, "facet cache entry unreadable");
                return None;
            }
        };

        match serde_json::from_str::<SessionFacet>(&raw) {
            Ok(mut facet) => {
                facet.session_id = id.to_string();
                Some(facet)
            }
            Err(err) => {
                tracing::warn!(session_id = id, path = %path.display(), error = %err, "facet cache entry corrupt");
                None
            }
        }
    }

    /// Persist a facet. The entry is written beside its final name and then
    /// renamed so readers never observe a partial file.
    pub async fn write(&self, id: &str, facet: &SessionFacet) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.entry_path(id);
        let tmp = path.with_extension(format!("json.tmp-{}", std::process::id()));
        let data = serde_json::to_string_pretty(facet)?;
        fs::write(&tmp, format!("{data}\n"))
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to move {} into place", path.display()))?;
        Ok(())
    }

    /// Remove every entry. Returns how many facet files were dropped.
    pub async fn clear(&self) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(FacetLensError::CacheIo(format!(
                    "failed to read {}: {err}",
                    self.dir.display()
                ))
                .into());
            }
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                removed += 1;
            }
        }

        fs::remove_dir_all(&self.dir).await.map_err(|err| {
            FacetLensError::CacheIo(format!("failed to clear {}: {err}", self.dir.display()))
        })?;
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return 0;
        };
        let mut count = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::{FacetCache, entry_file_name};
    use crate::lens::types::SessionFacet;
    use tempfile::tempdir;

    fn facet(id: &str) -> SessionFacet {
        SessionFacet::from_model_json(id, r#"{"goal": "refactor cache"}"#).expect("facet")
    }

    #[test]
    fn unsafe_identifiers_are_hashed() {
        assert_eq!(entry_file_name("abc-123"), "abc-123.json");
        let hashed = entry_file_name("../../etc/passwd");
        assert!(hashed.starts_with("sha256-"));
        assert!(!hashed.contains('/'));
        assert!(entry_file_name(".hidden").starts_with("sha256-"));
    }

    #[tokio::test]
    async fn write_then_read_returns_the_facet() {
        let tmp = tempdir().expect("tempdir");
        let cache = FacetCache::new(tmp.path().join("facets"));

        assert!(cache.read("s1").await.is_none());
        cache.write("s1", &facet("s1")).await.expect("write");
        assert_eq!(cache.read("s1").await, Some(facet("s1")));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let tmp = tempdir().expect("tempdir");
        let cache = FacetCache::new(tmp.path());
        std::fs::write(cache.entry_path("broken"), "{not json").expect("write corrupt entry");
        assert!(cache.read("broken").await.is_none());
    }

    #[tokio::test]
    async fn read_forces_owning_identifier() {
        let tmp = tempdir().expect("tempdir");
        let cache = FacetCache::new(tmp.path());
        std::fs::write(
            cache.entry_path("owner"),
            r#"{"sessionId": "someone-else", "goal": "x"}"#,
        )
        .expect("write entry");
        let got = cache.read("owner").await.expect("hit");
        assert_eq!(got.session_id, "owner");
    }

    #[tokio::test]
    async fn clear_removes_every_entry() {
        let tmp = tempdir().expect("tempdir");
        let cache = FacetCache::new(tmp.path().join("facets"));
        cache.write("a", &facet("a")).await.expect("write a");
        cache.write("b", &facet("b")).await.expect("write b");

        assert_eq!(cache.clear().await.expect("clear"), 2);
        assert!(cache.read("a").await.is_none());
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.clear().await.expect("clear twice"), 0);
    }
}
