//! Named scalar fields attached to a geometry, and their validation.

use log::{debug, warn};

/// Insertion-ordered `name -> values` mapping handed to the wrappers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Vec<f32>)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field; an existing name is replaced where it stands.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f32>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((name, values)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<f32>)> for Fields {
    fn from_iter<I: IntoIterator<Item = (S, Vec<f32>)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (name, values) in iter {
            fields.insert(name, values);
        }
        fields
    }
}

/// What one value of a field is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Vertex,
    Face,
    Line,
}

/// A field whose length matched one of the accepted granularities.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedField {
    pub name: String,
    pub values: Vec<f32>,
    pub granularity: Granularity,
}

impl ResolvedField {
    /// Value for a record built from source vertex `vertex`, belonging to
    /// face or line `element`.
    #[inline]
    pub fn sample(&self, vertex: usize, element: usize) -> f32 {
        match self.granularity {
            Granularity::Vertex => self.values[vertex],
            Granularity::Face | Granularity::Line => self.values[element],
        }
    }
}

/// Names of the fallback fields, in insertion order.
pub const DEFAULT_FIELDS: [&str; 3] = ["vertex_x", "vertex_y", "vertex_z"];

/// Field shown first when the caller supplied no usable data.
pub const DEFAULT_ACTIVE_FIELD: &str = "vertex_z";

/// Fields kept for one geometry plus the one to colour by initially.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldSet {
    pub fields: Vec<ResolvedField>,
    pub active: String,
    pub defaulted: bool,
}

impl FieldSet {
    pub fn has_face_data(&self) -> bool {
        self.fields.iter().any(|f| f.granularity == Granularity::Face)
    }
}

/// Validate `data` against the element counts of one geometry.
///
/// `accepted` is tried in order, so the first granularity whose count
/// matches wins (a mesh with as many faces as vertices reads its data as
/// per-vertex). Mismatching fields are logged and dropped. When nothing
/// survives, the raw coordinate axes of `positions` become the fields.
pub(crate) fn resolve(
    object: &str,
    data: Option<&Fields>,
    accepted: &[(Granularity, usize)],
    positions: &[[f64; 3]],
) -> FieldSet {
    let mut fields = Vec::new();

    if let Some(data) = data {
        for (name, values) in data.iter() {
            let matched = accepted
                .iter()
                .find(|(_, count)| *count == values.len())
                .map(|(g, _)| *g);

            match matched {
                Some(granularity) => {
                    debug!("{object}: field {name:?} attached per {granularity:?}");
                    fields.push(ResolvedField {
                        name: name.to_owned(),
                        values: values.to_vec(),
                        granularity,
                    });
                }
                None => {
                    warn!(
                        "{object}: field {name:?} has {} values, expected one of {:?}; skipped",
                        values.len(),
                        accepted
                    );
                }
            }
        }
    }

    if let Some(first) = fields.first() {
        let active = first.name.clone();
        return FieldSet {
            fields,
            active,
            defaulted: false,
        };
    }

    if data.is_some_and(|d| !d.is_empty()) {
        warn!("{object}: no usable data field, falling back to vertex coordinates");
    }

    FieldSet {
        fields: coordinate_fields(positions),
        active: DEFAULT_ACTIVE_FIELD.to_owned(),
        defaulted: true,
    }
}

fn coordinate_fields(positions: &[[f64; 3]]) -> Vec<ResolvedField> {
    DEFAULT_FIELDS
        .iter()
        .enumerate()
        .map(|(axis, name)| ResolvedField {
            name: (*name).to_owned(),
            values: positions.iter().map(|p| p[axis] as f32).collect(),
            granularity: Granularity::Vertex,
        })
        .collect()
}
