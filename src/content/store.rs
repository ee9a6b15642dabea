//! Content store capability.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::{ContentErrorKind, GateError, GateResult};
use crate::identity::Address;
use crate::validation::{Area, FileName};

use super::guess_mime_type;

/// One entry of an area listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDescriptor {
    pub file_name: String,
    pub mime_type: String,
}

impl ContentDescriptor {
    /// Descriptor with the MIME type guessed from the name.
    pub fn for_file(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            mime_type: guess_mime_type(file_name).to_string(),
        }
    }
}

/// An opened content item.
pub struct ContentReader {
    pub descriptor: ContentDescriptor,
    /// Size in bytes, when the store knows it up front.
    pub length: Option<u64>,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl fmt::Debug for ContentReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentReader")
            .field("descriptor", &self.descriptor)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Backing storage for gated content, laid out by owner then area.
///
/// Stores perform no authorization of their own. They are only reached
/// through the content gateway.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Items in `area` of `owner`, sorted by file name.
    async fn list(&self, owner: &Address, area: &Area) -> GateResult<Vec<ContentDescriptor>>;

    /// Open one item for streaming.
    async fn read(&self, owner: &Address, area: &Area, file_name: &FileName)
        -> GateResult<ContentReader>;
}

pub(crate) fn not_found(area: &Area, file_name: &FileName) -> GateError {
    GateError::Content {
        kind: ContentErrorKind::NotFound {
            what: format!("{}/{}", area, file_name),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_wire_form() {
        let descriptor = ContentDescriptor::for_file("clip.mp4");
        let json = serde_json::to_string(&descriptor).unwrap();
        assert_eq!(json, r#"{"fileName":"clip.mp4","mimeType":"video/mp4"}"#);
    }
}
