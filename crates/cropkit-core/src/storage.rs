//! Naming and storing exported images.
//!
//! Artifacts are stored under `images/{directory}/{id}` where `id` is a
//! random v4 UUID. The object store itself sits behind [`BlobStore`];
//! [`MemoryStore`] is an in-process implementation.
//!
//! Deleting an image that is already gone is not an error. Stores signal that
//! case with the structured [`StoreError::NotFound`] kind.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::fmt::Hyphenated;
use uuid::{Builder, Uuid};

use crate::encode::OutputArtifact;

/// Cover photos allowed per page.
pub const MAX_COVER_PHOTOS: usize = 5;

const ROOT: &str = "images";

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// No object exists at the path.
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("At most {limit} images are allowed in {directory}")]
    LimitReached { directory: String, limit: usize },

    #[error("Invalid image id: {0}")]
    InvalidId(String),

    /// The platform random source failed.
    #[error("Could not generate an image id: {0}")]
    Random(String),
}

/// Random identifier of a stored image (RFC 4122 version 4).
///
/// Always written and parsed in the hyphenated form used in object paths.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageId(Uuid);

impl ImageId {
    /// Generate a fresh id from the platform's secure random source.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Random` if no entropy is available.
    pub fn generate() -> Result<Self, StoreError> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes).map_err(|e| StoreError::Random(e.to_string()))?;
        Ok(Self::from_random_bytes(bytes))
    }

    /// Build a v4 id from 16 random bytes.
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        Self(Builder::from_random_bytes(bytes).into_uuid())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageId({})", self)
    }
}

impl FromStr for ImageId {
    type Err = StoreError;

    /// Parses the hyphenated form, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Hyphenated::LENGTH {
            return Err(StoreError::InvalidId(s.to_string()));
        }
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|_| StoreError::InvalidId(s.to_string()))
    }
}

impl From<Uuid> for ImageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl TryFrom<String> for ImageId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ImageId> for String {
    fn from(id: ImageId) -> Self {
        id.to_string()
    }
}

/// Location of one image in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub directory: String,
    pub id: ImageId,
}

impl ImageKey {
    pub fn new(directory: impl Into<String>, id: ImageId) -> Self {
        Self {
            directory: directory.into(),
            id,
        }
    }

    pub fn path(&self) -> String {
        format!("{}/{}", directory_path(&self.directory), self.id)
    }
}

/// Directory holding the cover photos of `page`.
pub fn cover_photo_directory(page: &str) -> String {
    format!("coverphotos/{}", page)
}

fn directory_path(directory: &str) -> String {
    format!("{}/{}", ROOT, directory.trim_matches('/'))
}

/// A record that may carry one stored image.
pub trait Illustrated {
    fn image(&self) -> Option<ImageId>;

    fn set_image(&mut self, image: Option<ImageId>);
}

/// What an edit dialog did to a record's image.
#[derive(Debug, Clone, Copy)]
pub enum ImageEdit<'a> {
    /// Leave the stored image as it is.
    Keep,
    /// Store a newly cropped image, reusing the record's id if it has one.
    Replace(&'a OutputArtifact),
    /// Drop the image from the record and the store.
    Remove,
}

/// Minimal object-store interface.
pub trait BlobStore {
    /// Create or overwrite the object at `path`.
    fn put(&mut self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StoreError>;

    /// Remove the object at `path`; `StoreError::NotFound` if absent.
    fn delete(&mut self, path: &str) -> Result<(), StoreError>;

    /// Full paths of the objects directly under `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory [`BlobStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: BTreeMap<String, StoredObject>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&StoredObject> {
        self.objects.get(path)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl BlobStore for MemoryStore {
    fn put(&mut self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StoreError> {
        self.objects.insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<(), StoreError> {
        self.objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        Ok(self
            .objects
            .keys()
            .filter(|path| {
                path.strip_prefix(&dir)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect())
    }
}

/// Image operations on top of a [`BlobStore`].
#[derive(Debug, Clone, Default)]
pub struct ImageRepository<S> {
    store: S,
}

impl<S: BlobStore> ImageRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Store `artifact` under a new random id.
    ///
    /// # Errors
    ///
    /// Propagates id generation and backend failures.
    pub fn post_image(
        &mut self,
        directory: &str,
        artifact: &OutputArtifact,
    ) -> Result<ImageKey, StoreError> {
        let key = ImageKey::new(directory, ImageId::generate()?);
        self.store.put(&key.path(), artifact.bytes(), artifact.mime_type())?;
        log::debug!("stored {} ({} bytes)", key.path(), artifact.len());
        Ok(key)
    }

    /// Overwrite the image stored under `id`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn update_image(
        &mut self,
        directory: &str,
        id: ImageId,
        artifact: &OutputArtifact,
    ) -> Result<ImageKey, StoreError> {
        let key = ImageKey::new(directory, id);
        self.store.put(&key.path(), artifact.bytes(), artifact.mime_type())?;
        Ok(key)
    }

    /// Remove an image. A missing image counts as removed.
    ///
    /// # Errors
    ///
    /// Every store error except `NotFound`.
    pub fn delete_image(&mut self, directory: &str, id: ImageId) -> Result<(), StoreError> {
        let path = ImageKey::new(directory, id).path();
        match self.store.delete(&path) {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                log::debug!("{} already absent", path);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Ids of the images in `directory`. Objects with foreign names are skipped.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn list_images(&self, directory: &str) -> Result<Vec<ImageId>, StoreError> {
        let paths = self.store.list(&directory_path(directory))?;
        Ok(paths
            .iter()
            .filter_map(|path| {
                let name = path.rsplit('/').next().unwrap_or(path);
                match name.parse() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        log::warn!("skipping unexpected object {}", path);
                        None
                    }
                }
            })
            .collect())
    }

    /// Apply an edit to the image of `record`.
    ///
    /// A replacement overwrites the existing object so the record keeps its
    /// id; a record without an image gets a new one. The record is only
    /// changed once the store succeeded.
    ///
    /// # Errors
    ///
    /// Propagates backend failures; a missing object on removal is ignored.
    pub fn edit_record_image<R: Illustrated>(
        &mut self,
        directory: &str,
        record: &mut R,
        edit: ImageEdit<'_>,
    ) -> Result<(), StoreError> {
        match (edit, record.image()) {
            (ImageEdit::Keep, _) | (ImageEdit::Remove, None) => {}
            (ImageEdit::Replace(artifact), Some(id)) => {
                self.update_image(directory, id, artifact)?;
            }
            (ImageEdit::Replace(artifact), None) => {
                let key = self.post_image(directory, artifact)?;
                record.set_image(Some(key.id));
            }
            (ImageEdit::Remove, Some(id)) => {
                self.delete_image(directory, id)?;
                record.set_image(None);
            }
        }
        Ok(())
    }

    /// Delete the image of a record that is being removed.
    ///
    /// # Errors
    ///
    /// Same as [`delete_image`](Self::delete_image).
    pub fn release_record_image<R: Illustrated>(
        &mut self,
        directory: &str,
        record: &R,
    ) -> Result<(), StoreError> {
        match record.image() {
            Some(id) => self.delete_image(directory, id),
            None => Ok(()),
        }
    }

    /// Add a cover photo to `page`, up to [`MAX_COVER_PHOTOS`].
    ///
    /// # Errors
    ///
    /// `StoreError::LimitReached` when the page is full.
    pub fn post_cover_photo(
        &mut self,
        page: &str,
        artifact: &OutputArtifact,
    ) -> Result<ImageKey, StoreError> {
        let directory = cover_photo_directory(page);
        let existing = self.list_images(&directory)?.len();
        if existing >= MAX_COVER_PHOTOS {
            return Err(StoreError::LimitReached {
                directory,
                limit: MAX_COVER_PHOTOS,
            });
        }
        self.post_image(&directory, artifact)
    }
}
