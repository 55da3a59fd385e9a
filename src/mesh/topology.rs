use crate::error::{ElasticError, ElasticResult};

/// A linear simplex: `d+1` global point indices
///
/// Vertex 0 is the base vertex of the shape matrix; edges run from it to
/// vertices 1..=d.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplexElement {
    pub nodes: Vec<usize>,
}

impl SimplexElement {
    pub fn new(nodes: Vec<usize>) -> Self {
        Self { nodes }
    }

    pub fn num_vertices(&self) -> usize {
        self.nodes.len()
    }

    /// Edges of the shape matrix as (base, tip) local vertex pairs
    pub fn shape_edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (1..self.nodes.len()).map(|k| (0, k))
    }
}

/// Connectivity of a simplicial mesh
#[derive(Debug, Clone)]
pub struct SimplexMesh {
    dimension: usize,
    num_points: usize,
    pub elements: Vec<SimplexElement>,
    /// Per point: (element, local vertex) pairs that reference it
    incident: Vec<Vec<(usize, usize)>>,
}

impl SimplexMesh {
    /// Build a mesh from a flat `(d+1)·Ne` index sequence
    ///
    /// # Arguments
    /// * `dimension` - Spatial dimension d
    /// * `num_points` - Number of points the indices refer to
    /// * `indices` - Element vertex indices grouped per element
    pub fn from_flat(dimension: usize, num_points: usize, indices: &[usize]) -> ElasticResult<Self> {
        if dimension == 0 {
            return Err(ElasticError::InvalidConfiguration(
                "mesh dimension must be at least 1".to_string(),
            ));
        }

        let verts = dimension + 1;
        if indices.len() % verts != 0 {
            return Err(ElasticError::InvalidConfiguration(format!(
                "mesh has {} indices, not a multiple of {}",
                indices.len(),
                verts
            )));
        }

        let mut elements = Vec::with_capacity(indices.len() / verts);
        for (e, chunk) in indices.chunks(verts).enumerate() {
            if let Some(&bad) = chunk.iter().find(|&&i| i >= num_points) {
                return Err(ElasticError::InvalidConfiguration(format!(
                    "element {} references point {} (npt = {})",
                    e, bad, num_points
                )));
            }
            for a in 0..verts {
                if chunk[a + 1..].contains(&chunk[a]) {
                    return Err(ElasticError::InvalidConfiguration(format!(
                        "element {} repeats point {}",
                        e, chunk[a]
                    )));
                }
            }
            elements.push(SimplexElement::new(chunk.to_vec()));
        }

        let incident = Self::build_incidence(num_points, &elements);

        Ok(Self {
            dimension,
            num_points,
            elements,
            incident,
        })
    }

    fn build_incidence(num_points: usize, elements: &[SimplexElement]) -> Vec<Vec<(usize, usize)>> {
        let mut incident = vec![Vec::new(); num_points];
        for (e, elem) in elements.iter().enumerate() {
            for (local, &node) in elem.nodes.iter().enumerate() {
                incident[node].push((e, local));
            }
        }
        incident
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Vertices per element (d+1)
    pub fn vertices_per_element(&self) -> usize {
        self.dimension + 1
    }

    /// Elements incident to a point, with the point's local vertex slot
    pub fn incident_elements(&self, point: usize) -> &[(usize, usize)] {
        &self.incident[point]
    }

    /// Points not referenced by any element
    pub fn orphan_points(&self) -> Vec<usize> {
        self.incident
            .iter()
            .enumerate()
            .filter(|(_, inc)| inc.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Element vertex tuples, for export
    pub fn faces(&self) -> Vec<Vec<usize>> {
        self.elements.iter().map(|e| e.nodes.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat_triangles() {
        // Two triangles sharing the diagonal of a unit square
        let mesh = SimplexMesh::from_flat(2, 4, &[0, 1, 2, 1, 3, 2]).unwrap();

        assert_eq!(mesh.num_elements(), 2);
        assert_eq!(mesh.vertices_per_element(), 3);
        assert_eq!(mesh.elements[1].nodes, vec![1, 3, 2]);

        let edges: Vec<_> = mesh.elements[0].shape_edges().collect();
        assert_eq!(edges, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_incident_elements() {
        let mesh = SimplexMesh::from_flat(2, 5, &[0, 1, 2, 1, 3, 2]).unwrap();

        assert_eq!(mesh.incident_elements(0), &[(0, 0)]);
        assert_eq!(mesh.incident_elements(1), &[(0, 1), (1, 0)]);
        assert_eq!(mesh.incident_elements(2), &[(0, 2), (1, 2)]);
        assert_eq!(mesh.orphan_points(), vec![4]);
    }

    #[test]
    fn test_rejects_bad_lengths_and_indices() {
        assert!(matches!(
            SimplexMesh::from_flat(2, 4, &[0, 1, 2, 3]),
            Err(ElasticError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SimplexMesh::from_flat(2, 3, &[0, 1, 3]),
            Err(ElasticError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SimplexMesh::from_flat(2, 3, &[0, 1, 1]),
            Err(ElasticError::InvalidConfiguration(_))
        ));
    }
}
