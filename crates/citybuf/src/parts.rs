//! Sub-object bookkeeping for picking inside a concatenated mesh.
//!
//! A city block is drawn as one mesh made of many buildings. `Submeshes`
//! remembers which face range came from which building, gives each building
//! an integer id and maps ids back to the building's uuid.

use crate::error::{Result, WrapError};
use crate::geometry::Mesh;
use std::collections::HashMap;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submesh {
    /// Half-open face range inside the concatenated mesh.
    pub faces: Range<usize>,
    pub id: u32,
    pub uuid: String,
}

impl Submesh {
    /// Index of the last face, `None` for a part without faces.
    #[inline]
    pub fn last_face(&self) -> Option<usize> {
        (!self.faces.is_empty()).then(|| self.faces.end - 1)
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submeshes {
    parts: Vec<Submesh>,
    by_id: HashMap<u32, usize>,
    by_uuid: HashMap<String, usize>,
}

impl Submeshes {
    /// Parts for `meshes` in concatenation order, ids `0..meshes.len()`.
    pub fn new<S: AsRef<str>>(meshes: &[Mesh], uuids: &[S]) -> Result<Self> {
        let counts: Vec<usize> = meshes.iter().map(|m| m.faces.len()).collect();
        Self::from_face_counts(&counts, uuids)
    }

    /// Same as [`new`](Self::new) when only the face counts are known.
    pub fn from_face_counts<S: AsRef<str>>(face_counts: &[usize], uuids: &[S]) -> Result<Self> {
        if face_counts.len() != uuids.len() {
            return Err(WrapError::MismatchedInput {
                meshes: face_counts.len(),
                uuids: uuids.len(),
            });
        }

        let mut out = Submeshes::default();
        let mut start = 0usize;

        for (i, (&count, uuid)) in face_counts.iter().zip(uuids).enumerate() {
            let uuid = uuid.as_ref().to_owned();
            if out.by_uuid.contains_key(&uuid) {
                return Err(WrapError::DuplicateUuid { uuid });
            }

            let id = u32::try_from(i).map_err(|_| WrapError::IdOverflow)?;
            out.by_id.insert(id, i);
            out.by_uuid.insert(uuid.clone(), i);
            out.parts.push(Submesh {
                faces: start..start + count,
                id,
                uuid,
            });

            start += count;
        }

        Ok(out)
    }

    /// Shift every id by `k` so several collections can share one id space.
    pub fn offset_ids(&mut self, k: u32) -> Result<()> {
        // Check everything first so a failure leaves the ids untouched.
        if let Some(max) = self.max_id() {
            max.checked_add(k).ok_or(WrapError::IdOverflow)?;
        }

        for part in &mut self.parts {
            part.id += k;
        }
        self.by_id = self
            .parts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();

        Ok(())
    }

    /// One id per face of the concatenated mesh.
    pub fn face_ids(&self) -> Vec<u32> {
        let mut ids = Vec::with_capacity(self.face_count());
        for part in &self.parts {
            ids.extend(std::iter::repeat(part.id).take(part.face_count()));
        }
        ids
    }

    #[inline]
    pub fn id_exists(&self, id: u32) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn uuid_of(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(|&i| self.parts[i].uuid.as_str())
    }

    pub fn id_of(&self, uuid: &str) -> Option<u32> {
        self.by_uuid.get(uuid).map(|&i| self.parts[i].id)
    }

    pub fn get(&self, id: u32) -> Option<&Submesh> {
        self.by_id.get(&id).map(|&i| &self.parts[i])
    }

    pub fn first_id(&self) -> Option<u32> {
        self.parts.first().map(|p| p.id)
    }

    pub fn max_id(&self) -> Option<u32> {
        self.parts.last().map(|p| p.id)
    }

    /// Total faces covered by all parts.
    pub fn face_count(&self) -> usize {
        self.parts.last().map_or(0, |p| p.faces.end)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Submesh> {
        self.parts.iter()
    }
}
