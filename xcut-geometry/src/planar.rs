//! Face extraction for planar straight-line graphs.
//!
//! Given vertices in a plane and segments connecting them, the graph partitions the
//! plane into faces. The kernel uses this to split element sides along cut lines and to
//! assemble the part of a cutter side that lies inside an element.
use crate::Orientation;
use itertools::Itertools;
use nalgebra::{Point2, RealField};
use numeric_literals::replace_float_literals;
use std::collections::{BTreeMap, BTreeSet};

/// Signed area of the polygon, positive for counter-clockwise loops.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn signed_area<T: RealField>(polygon: impl IntoIterator<Item = Point2<T>>) -> T {
    let polygon: Vec<_> = polygon.into_iter().collect();
    let mut area = 0.0;
    for (a, b) in polygon.iter().chain(polygon.first()).tuple_windows() {
        area += a.x.clone() * b.y.clone() - b.x.clone() * a.y.clone();
    }
    area * 0.5
}

pub fn orientation<T: RealField>(polygon: impl IntoIterator<Item = Point2<T>>) -> Orientation {
    if signed_area(polygon) >= T::zero() {
        Orientation::Counterclockwise
    } else {
        Orientation::Clockwise
    }
}

/// Removes dangling segments, i.e. segments that end in a vertex of degree one.
///
/// Dangling segments cannot bound a face. The removal is repeated until every remaining
/// vertex has degree zero or at least two.
pub fn prune_dangling(adjacency: &mut BTreeMap<usize, BTreeSet<usize>>) {
    let mut queue: Vec<usize> = adjacency
        .iter()
        .filter(|(_, neighbors)| neighbors.len() == 1)
        .map(|(v, _)| *v)
        .collect();

    while let Some(v) = queue.pop() {
        let Some(neighbors) = adjacency.get_mut(&v) else {
            continue;
        };
        if neighbors.len() != 1 {
            continue;
        }
        let w = *neighbors.iter().next().unwrap();
        neighbors.clear();
        if let Some(w_neighbors) = adjacency.get_mut(&w) {
            w_neighbors.remove(&v);
            if w_neighbors.len() == 1 {
                queue.push(w);
            }
        }
    }

    adjacency.retain(|_, neighbors| !neighbors.is_empty());
}

/// Extracts the bounded faces of the planar graph given by `vertices` and `segments`.
///
/// Each face is returned as a loop of vertex indices in counter-clockwise order. Faces whose
/// area does not exceed `min_area` (and the unbounded outer face) are discarded. Segments
/// are undirected and duplicates are ignored. Segments must not cross each other except at
/// shared vertices.
pub fn extract_faces<T: RealField>(vertices: &[Point2<T>], segments: &[[usize; 2]], min_area: T) -> Vec<Vec<usize>> {
    let mut adjacency: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for &[a, b] in segments {
        if a != b {
            adjacency.entry(a).or_default().insert(b);
            adjacency.entry(b).or_default().insert(a);
        }
    }
    prune_dangling(&mut adjacency);

    // Neighbors sorted counter-clockwise by angle around each vertex
    let sorted_neighbors: BTreeMap<usize, Vec<usize>> = adjacency
        .iter()
        .map(|(&v, neighbors)| {
            let origin = &vertices[v];
            let angle = |w: &usize| {
                let d = &vertices[*w] - origin;
                d.y.clone().atan2(d.x.clone())
            };
            let sorted = neighbors
                .iter()
                .copied()
                .sorted_by(|a, b| {
                    angle(a)
                        .partial_cmp(&angle(b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .collect();
            (v, sorted)
        })
        .collect();

    let mut visited = BTreeSet::new();
    let mut faces = Vec::new();

    for (&u, neighbors) in &sorted_neighbors {
        for &v in neighbors {
            if visited.contains(&(u, v)) {
                continue;
            }

            let mut face = Vec::new();
            let (mut from, mut to) = (u, v);
            loop {
                if !visited.insert((from, to)) {
                    break;
                }
                face.push(from);
                let around = &sorted_neighbors[&to];
                let back = around
                    .iter()
                    .position(|w| *w == from)
                    .expect("Adjacency is symmetric");
                // The next edge clockwise from the reverse edge keeps the face on the left
                let next = around[(back + around.len() - 1) % around.len()];
                from = to;
                to = next;
            }

            let area = signed_area(face.iter().map(|i| vertices[*i].clone()));
            if area > min_area {
                faces.push(face);
            }
        }
    }

    faces
}
