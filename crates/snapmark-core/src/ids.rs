use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a photo at capture time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Name of a marker as known to the marker library and the detection
/// subsystem. Markers registered from photos are named after their
/// [`ImageId`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(String);

impl MarkerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<ImageId> for MarkerId {
    fn from(id: ImageId) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for MarkerId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_image_ids_are_distinct() {
        let ids: HashSet<ImageId> = (0..256).map(|_| ImageId::generate()).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn marker_id_uses_image_id_text() {
        let image = ImageId::generate();
        let marker = MarkerId::from(image);
        assert_eq!(marker.as_str(), image.to_string());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let marker = MarkerId::new("poster");
        assert_eq!(serde_json::to_string(&marker).unwrap(), "\"poster\"");
    }
}
