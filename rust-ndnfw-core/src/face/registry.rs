//! Registry of active faces.

use super::Face;
use rust_ndnfw_common::{
    types::{FaceId, LowerLayerHandle},
    Error, Result,
};
use std::sync::Arc;

/// A registered face and its id.
#[derive(Clone)]
pub struct FaceRecord {
    pub id: FaceId,
    pub face: Arc<dyn Face>,
}

impl FaceRecord {
    pub fn is_up(&self) -> bool {
        self.face.is_up()
    }
}

/// The set of faces a node is attached to.
///
/// Lookups are linear; the registry is not on the per-packet hot path
/// except for `get`, and nodes have few faces.
#[derive(Default)]
pub struct FaceRegistry {
    faces: Vec<FaceRecord>,
    next_id: u32,
}

impl FaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `face` under the next sequential id.
    pub fn add(&mut self, face: Arc<dyn Face>) -> Result<FaceId> {
        if let Some(existing) = self.id_of(&face) {
            return Err(Error::DuplicateFace(existing));
        }

        let id = FaceId(self.next_id);
        self.next_id += 1;
        self.faces.push(FaceRecord { id, face });
        Ok(id)
    }

    /// Removes the face with the given id and returns its record.
    pub fn remove(&mut self, id: FaceId) -> Result<FaceRecord> {
        let index = self
            .faces
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| Error::UnknownFace(id.to_string()))?;
        Ok(self.faces.remove(index))
    }

    /// Id of `face` if it is registered (identity, not equality).
    pub fn id_of(&self, face: &Arc<dyn Face>) -> Option<FaceId> {
        self.faces
            .iter()
            .find(|record| Arc::ptr_eq(&record.face, face))
            .map(|record| record.id)
    }

    pub fn get(&self, id: FaceId) -> Option<&Arc<dyn Face>> {
        self.faces
            .iter()
            .find(|record| record.id == id)
            .map(|record| &record.face)
    }

    pub fn get_by_lower_layer_handle(&self, handle: &LowerLayerHandle) -> Option<&FaceRecord> {
        self.faces
            .iter()
            .find(|record| record.face.lower_layer_handle().as_ref() == Some(handle))
    }

    /// True if the face is registered and up.
    pub fn is_up(&self, id: FaceId) -> bool {
        self.get(id).map(|face| face.is_up()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FaceRecord> {
        self.faces.iter()
    }
}
