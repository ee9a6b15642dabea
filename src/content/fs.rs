//! Filesystem-backed content store.
//!
//! Layout: `<root>/<owner lowercase hex>/<area>/<file name>`. Only regular
//! files directly inside an area directory are visible. Symlinks and
//! subdirectories are ignored, and so are hidden files.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::GateResult;
use crate::identity::Address;
use crate::validation::{validate_file_name, Area, FileName};

use super::store::not_found;
use super::{ContentDescriptor, ContentReader, ContentStore};

/// Serves content from a directory tree.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn area_dir(&self, owner: &Address, area: &Area) -> PathBuf {
        self.root.join(owner.to_lower_hex()).join(area.as_str())
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn list(&self, owner: &Address, area: &Area) -> GateResult<Vec<ContentDescriptor>> {
        let dir = self.area_dir(owner, area);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Area directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(dir = %dir.display(), "Skipping non UTF-8 file name");
                continue;
            };

            // Names that could never be fetched are not advertised.
            if validate_file_name(name).is_err() {
                continue;
            }

            items.push(ContentDescriptor::for_file(name));
        }

        items.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(items)
    }

    async fn read(
        &self,
        owner: &Address,
        area: &Area,
        file_name: &FileName,
    ) -> GateResult<ContentReader> {
        let path = self.area_dir(owner, area).join(file_name.as_str());

        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found(area, file_name)),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(not_found(area, file_name));
        }

        let file = tokio::fs::File::open(&path).await?;
        Ok(ContentReader {
            descriptor: ContentDescriptor::for_file(file_name.as_str()),
            length: Some(metadata.len()),
            reader: Box::pin(file),
        })
    }
}
