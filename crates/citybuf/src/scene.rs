//! Scene aggregation: global bounding box, one recentring pass, picking.

use crate::bounds::BoundingBox;
use crate::error::{Result, WrapError};
use crate::fields::Fields;
use crate::geometry::{Geometry, Mesh};
use crate::parts::Submeshes;
use crate::wrapper::{check_ids, MeshWrapper, WrapConfig, Wrapper};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// An object that could not be wrapped or recentred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub object: String,
    pub error: String,
}

/// Totals over the scene, including what had to be left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneReport {
    pub objects: usize,
    pub vertices: usize,
    pub indices: usize,
    /// Degenerate faces, segments and points dropped across all objects.
    pub skipped: usize,
    pub failed: Vec<Failure>,
}

/// What a picking id points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pick<'a> {
    pub object: &'a str,
    /// Source uuid when the object was assembled from parts.
    pub uuid: Option<&'a str>,
}

/// Collection of wrappers sharing one bounding box and one picking id space.
#[derive(Debug, Clone)]
pub struct Scene {
    name: String,
    config: WrapConfig,
    objects: Vec<Wrapper>,
    next_id: u32,
    bounds: Option<BoundingBox>,
    failed: Vec<Failure>,
}

impl Scene {
    pub fn new(name: &str, config: WrapConfig) -> Self {
        Self {
            name: name.to_owned(),
            next_id: config.first_id,
            config,
            objects: Vec::new(),
            bounds: None,
            failed: Vec::new(),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.bounds.is_some() {
            return Err(WrapError::AlreadyPreprocessed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, object: &str, err: &WrapError) {
        warn!("{}: dropping {object}: {err}", self.name);
        self.failed.push(Failure {
            object: object.to_owned(),
            error: err.to_string(),
        });
    }

    fn record<T>(&mut self, object: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.fail(object, err);
        }
        result
    }

    /// Wrap `geometry` with the next free picking ids and add it.
    ///
    /// A failure is returned and also kept for the report; the scene stays
    /// usable.
    pub fn add(&mut self, name: &str, geometry: &Geometry, data: Option<&Fields>) -> Result<()> {
        self.ensure_open()?;

        let config = self.config.with_first_id(self.next_id);
        let wrapped = Wrapper::build(name, geometry, &config, data);
        let wrapper = self.record(name, wrapped)?;
        self.push(wrapper)
    }

    /// Concatenate `meshes` into one pickable object, one part per mesh.
    ///
    /// Part ids are offset into the scene's id space, so `pick` resolves a
    /// face id back to the matching entry of `uuids`.
    pub fn add_parts<S: AsRef<str>>(
        &mut self,
        name: &str,
        meshes: &[Mesh],
        uuids: &[S],
        data: Option<&Fields>,
    ) -> Result<()> {
        self.ensure_open()?;

        let next_id = self.next_id;
        let config = self.config.with_first_id(next_id);
        let wrapped = Submeshes::new(meshes, uuids).and_then(|mut parts| {
            parts.offset_ids(next_id)?;
            let merged = Mesh::concatenate(meshes);
            MeshWrapper::new(name, &merged, &config, data, Some(&parts))
        });

        let wrapper = self.record(name, wrapped)?;
        self.push(wrapper.into())
    }

    /// Add an already built wrapper. Its ids are reserved as they are.
    ///
    /// Fails with `IdConflict` when its id range overlaps an object already
    /// in the scene.
    pub fn push(&mut self, wrapper: Wrapper) -> Result<()> {
        self.ensure_open()?;

        let reserved = self.reserve_ids(&wrapper);
        self.record(wrapper.name(), reserved)?;
        self.objects.push(wrapper);

        Ok(())
    }

    fn reserve_ids(&mut self, wrapper: &Wrapper) -> Result<()> {
        let (first_id, count) = (wrapper.first_id(), wrapper.id_count());
        check_ids(first_id, count)?;
        if count == 0 {
            return Ok(());
        }

        let end = first_id + count;
        let taken = self.objects.iter().any(|o| {
            o.id_count() > 0 && first_id < o.first_id() + o.id_count() && o.first_id() < end
        });
        if taken {
            return Err(WrapError::IdConflict {
                name: wrapper.name().to_owned(),
                first_id,
                end,
            });
        }

        self.next_id = self.next_id.max(end);
        Ok(())
    }

    /// Compute the global box and recentre every object once.
    ///
    /// The box spans only objects that are still in source coordinates;
    /// objects recentred elsewhere are removed and reported, as are objects
    /// whose recentring fails. Calling this twice returns
    /// `AlreadyPreprocessed`.
    pub fn preprocess(&mut self) -> Result<SceneReport> {
        self.ensure_open()?;

        let (fresh, stale): (Vec<Wrapper>, Vec<Wrapper>) = std::mem::take(&mut self.objects)
            .into_iter()
            .partition(|w| !w.is_preprocessed());
        for w in &stale {
            let err = WrapError::AlreadyPreprocessed {
                name: w.name().to_owned(),
            };
            self.fail(w.name(), &err);
        }
        self.objects = fresh;

        let global = BoundingBox::from_point_sets(
            &self.name,
            self.objects.iter().map(|w| w.vertex_positions()),
        )?;

        let objects = std::mem::take(&mut self.objects);
        for mut wrapper in objects {
            let result = wrapper.preprocess_drawing(&global);
            if self.record(wrapper.name(), result).is_ok() {
                self.objects.push(wrapper);
            }
        }

        info!(
            "{}: {} objects recentred, extent {:.1} x {:.1} x {:.1}",
            self.name,
            self.objects.len(),
            global.xdom,
            global.ydom,
            global.zdom
        );

        self.bounds = Some(global);
        Ok(self.report())
    }

    pub fn report(&self) -> SceneReport {
        SceneReport {
            objects: self.objects.len(),
            vertices: self.objects.iter().map(Wrapper::vertex_count).sum(),
            indices: self.objects.iter().map(|w| w.indices().len()).sum(),
            skipped: self.objects.iter().map(Wrapper::skipped).sum(),
            failed: self.failed.clone(),
        }
    }

    /// Resolve a picking id read back from the id buffer.
    pub fn pick(&self, id: u32) -> Option<Pick<'_>> {
        self.objects.iter().find_map(|w| {
            let first = w.first_id();
            if id < first || id - first >= w.id_count() {
                return None;
            }

            let uuid = match w {
                Wrapper::Mesh(mesh) => mesh.parts().and_then(|p| p.uuid_of(id)),
                _ => None,
            };

            Some(Pick {
                object: w.name(),
                uuid,
            })
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn config(&self) -> &WrapConfig {
        &self.config
    }

    /// Global bounding box, set by `preprocess`.
    #[inline]
    pub fn bounds(&self) -> Option<&BoundingBox> {
        self.bounds.as_ref()
    }

    pub fn objects(&self) -> &[Wrapper] {
        &self.objects
    }

    pub fn get(&self, name: &str) -> Option<&Wrapper> {
        self.objects.iter().find(|w| w.name() == name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
