//! In-memory content store.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::GateResult;
use crate::identity::Address;
use crate::validation::{Area, FileName};

use super::store::not_found;
use super::{ContentDescriptor, ContentReader, ContentStore};

type AreaKey = (Address, Area);

/// Content held in a map, for tests and embedding.
#[derive(Default)]
pub struct MemoryContentStore {
    areas: RwLock<BTreeMap<AreaKey, BTreeMap<String, Bytes>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an item.
    pub fn insert(&self, owner: Address, area: Area, file_name: &FileName, data: impl Into<Bytes>) {
        let mut areas = self.areas.write().unwrap_or_else(|e| e.into_inner());
        areas
            .entry((owner, area))
            .or_default()
            .insert(file_name.as_str().to_string(), data.into());
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn list(&self, owner: &Address, area: &Area) -> GateResult<Vec<ContentDescriptor>> {
        let areas = self.areas.read().unwrap_or_else(|e| e.into_inner());
        Ok(areas
            .get(&(*owner, area.clone()))
            .map(|files| files.keys().map(|name| ContentDescriptor::for_file(name)).collect())
            .unwrap_or_default())
    }

    async fn read(
        &self,
        owner: &Address,
        area: &Area,
        file_name: &FileName,
    ) -> GateResult<ContentReader> {
        let data = {
            let areas = self.areas.read().unwrap_or_else(|e| e.into_inner());
            areas
                .get(&(*owner, area.clone()))
                .and_then(|files| files.get(file_name.as_str()))
                .cloned()
        };
        let data = data.ok_or_else(|| not_found(area, file_name))?;

        Ok(ContentReader {
            descriptor: ContentDescriptor::for_file(file_name.as_str()),
            length: Some(data.len() as u64),
            reader: Box::pin(Cursor::new(data)),
        })
    }
}
