//! Local machine image catalog
//!
//! Image lookups are answered from `.fleetscale/images.json`, a snapshot of
//! the provider's image listing. Each pass picks the newest image matching
//! the query, so refreshing the snapshot moves the fleet to a newer image.

use chrono::{DateTime, Utc};
use fleetscale_cloud::{ImageQuery, MachineImage, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

pub const CATALOG_FILE: &str = "images.json";

/// One entry of the image listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogImage {
    pub image_id: String,
    pub name: String,
    pub owner: String,
    pub creation_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageCatalog {
    images: Vec<CatalogImage>,
}

impl ImageCatalog {
    pub fn new(images: Vec<CatalogImage>) -> Self {
        Self { images }
    }

    /// Load a catalog file. A missing file yields an empty catalog.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Image catalog {} not found, using empty catalog", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        let catalog: ImageCatalog = serde_json::from_str(&content)?;
        tracing::debug!(
            "Loaded {} images from {}",
            catalog.images.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Newest image whose name matches the query pattern and whose owner is
    /// one of the requested owners
    pub fn find(&self, query: &ImageQuery) -> Option<MachineImage> {
        let pattern = glob::Pattern::new(&query.name).ok();
        let name_matches = |name: &str| match &pattern {
            Some(p) => p.matches(name),
            None => name == query.name,
        };

        self.images
            .iter()
            .filter(|image| query.owners.is_empty() || query.owners.contains(&image.owner))
            .filter(|image| name_matches(&image.name))
            .max_by_key(|image| image.creation_date)
            .map(|image| MachineImage {
                image_id: image.image_id.clone(),
                name: Some(image.name.clone()),
            })
    }
}
