//! # Barnes–Hut Octree
//!
//! Arena-backed octree used to approximate gravitational acceleration on
//! every particle of a [`Galaxy`](crate::simulation::states::Galaxy) in
//! `O(N log N)` instead of the `O(N²)` all-pairs sum.
//!
//! ## Core Concepts
//!
//! - Space is a cube centered on `center` with half-extent `half_size`.
//! - A node is either a leaf holding at most one particle, or an internal
//!   node with up to 8 child octants (absent octants are empty space).
//! - Every node keeps the total mass of its subtree and a running
//!   mass-weighted position sum. Both are updated on the way down during
//!   insertion; [`Octree::finalize`] turns the weighted sum into a center of
//!   mass in a single pass.
//! - Far-away nodes are treated as a single point mass at their center of
//!   mass when `half_size / dist < theta`.
//!
//! Nodes live contiguously in a `Vec` and refer to each other by index, so a
//! finalized tree is plain read-only data and can be shared across worker
//! threads during the query phase.
//!
//! A tree lives for exactly one force evaluation: particle positions change
//! every step, so it is rebuilt from scratch rather than updated.

use crate::error::{Result, SimError};
use crate::simulation::states::{NVec3, Particle};

/// Below this half-size a cell is no longer subdivided; co-located particles
/// are merged into the existing leaf by mass accumulation.
pub const MIN_HALF_SIZE: f64 = 1e-5;

/// Half-size of the root cell in normalized units. [`Octree::build`] grows
/// the root past this when particles have escaped it.
pub const ROOT_HALF_SIZE: f64 = 2.0;

/// A single cubic cell of the octree.
///
/// `mass` is valid as soon as insertion finishes. `com` is only valid after
/// [`Octree::finalize`]; before that it holds whatever the last finalize left.
#[derive(Debug, Clone)]
pub struct OctreeNode {
    pub center: NVec3,
    pub half_size: f64,
    pub mass: f64,
    pub com: NVec3,
    weighted: NVec3,                  // running sum of m * x over the subtree
    pub children: [Option<usize>; 8], // indices into Octree::nodes
    pub occupant: Option<usize>,      // Some(i) if this leaf holds particle i
}

impl OctreeNode {
    fn empty(center: NVec3, half_size: f64) -> Self {
        Self {
            center,
            half_size,
            mass: 0.0,
            com: NVec3::zeros(),
            weighted: NVec3::zeros(),
            children: [None; 8],
            occupant: None,
        }
    }

    /// A node without children. Empty leaves have `occupant == None`.
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }

    /// Closed-cube containment test
    pub fn contains(&self, p: &NVec3) -> bool {
        (p - self.center).amax() <= self.half_size
    }

    fn accumulate(&mut self, p: &Particle) {
        self.mass += p.m;
        self.weighted += p.m * p.x;
    }
}

/// Per-query constants threaded through the recursive walk.
struct Query {
    index: usize, // particle the acceleration is for (self-skip)
    pos: NVec3,
    theta: f64,
    g: f64,
    eps2: f64,
}

/// A complete octree over a particle slice.
///
/// The tree never owns particles: leaves store indices into the slice passed
/// to [`Octree::insert`] / [`Octree::build`], and the same slice must be used
/// for queries.
#[derive(Debug, Clone)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    root: usize,
    finalized: bool,
}

impl Octree {
    /// Create an empty tree whose root covers the cube `center ± half_size`.
    pub fn new(center: NVec3, half_size: f64) -> Self {
        Self {
            nodes: vec![OctreeNode::empty(center, half_size)],
            root: 0,
            finalized: true,
        }
    }

    /// Build and finalize a tree over every particle in `particles`.
    ///
    /// The root is centered at the origin with half-size
    /// `max(ROOT_HALF_SIZE, largest |coordinate|)`, so any finite particle
    /// set fits. Particles that escaped the nominal region grow the root
    /// instead of being dropped.
    ///
    /// # Errors
    /// [`SimError::NonFinite`] if a particle position is NaN or infinite.
    pub fn build(particles: &[Particle]) -> Result<Self> {
        let half_size = particles
            .iter()
            .map(|p| p.x.amax())
            .filter(|c| c.is_finite())
            .fold(ROOT_HALF_SIZE, f64::max);

        let mut tree = Octree::new(NVec3::zeros(), half_size);
        for i in 0..particles.len() {
            tree.insert(i, particles)?;
        }
        tree.finalize();

        log::trace!(
            "octree: {} particles, {} nodes, root half-size {:.3}",
            particles.len(),
            tree.node_count(),
            half_size
        );
        Ok(tree)
    }

    /// Insert particle `index` of `particles` into the tree.
    ///
    /// Walks down from the root, adding the particle's mass and weighted
    /// position to every node on the path:
    ///
    /// - An empty leaf takes the particle as its occupant.
    /// - An occupied leaf is split: its occupant moves into the matching
    ///   child octant and the walk continues with the new particle. Child
    ///   octants are allocated on first use.
    /// - An occupied leaf smaller than [`MIN_HALF_SIZE`] absorbs the new
    ///   particle's mass without splitting, so coincident points cannot
    ///   recurse forever.
    ///
    /// Invalidates the centers of mass until the next [`Octree::finalize`].
    ///
    /// # Errors
    /// - [`SimError::NonFinite`] for a NaN/infinite position.
    /// - [`SimError::OutOfBounds`] if the particle is outside the root cube.
    pub fn insert(&mut self, index: usize, particles: &[Particle]) -> Result<()> {
        let p = &particles[index];
        if !p.x.iter().all(|c| c.is_finite()) {
            return Err(SimError::NonFinite(index));
        }
        if !self.nodes[self.root].contains(&p.x) {
            return Err(SimError::OutOfBounds(index));
        }
        self.finalized = false;

        let mut node_idx = self.root;
        loop {
            // Snapshot by value so no borrow of self.nodes is live below
            let (is_leaf, occupant, half_size) = {
                let node = &self.nodes[node_idx];
                (node.is_leaf(), node.occupant, node.half_size)
            };

            if is_leaf {
                match occupant {
                    None => {
                        let node = &mut self.nodes[node_idx];
                        node.occupant = Some(index);
                        node.accumulate(p);
                        return Ok(());
                    }
                    Some(_) if half_size < MIN_HALF_SIZE => {
                        self.nodes[node_idx].accumulate(p);
                        return Ok(());
                    }
                    Some(existing) => {
                        // Split: move the previous occupant one level down.
                        // Its mass is already counted in this node.
                        self.nodes[node_idx].occupant = None;
                        let prev = &particles[existing];
                        let child = self.child_for(node_idx, &prev.x);
                        let child_node = &mut self.nodes[child];
                        child_node.occupant = Some(existing);
                        child_node.accumulate(prev);
                    }
                }
            }

            self.nodes[node_idx].accumulate(p);
            node_idx = self.child_for(node_idx, &p.x);
        }
    }

    /// Turn every node's weighted position sum into its center of mass.
    ///
    /// Nodes with zero mass are skipped. The weighted sums themselves are
    /// left untouched, so calling this again without new insertions leaves
    /// every `com` bit-for-bit unchanged.
    pub fn finalize(&mut self) {
        for node in self.nodes.iter_mut() {
            if node.mass > 0.0 {
                node.com = node.weighted / node.mass;
            }
        }
        self.finalized = true;
    }

    /// Barnes–Hut acceleration on particle `index` due to the whole tree.
    ///
    /// For each visited node:
    ///
    /// - zero mass: no contribution
    /// - the leaf holding `index` itself: no contribution (self-exclusion)
    /// - otherwise, with `d = com - x` and `dist = sqrt(|d|² + eps²)`, a leaf
    ///   or a node with `half_size / dist < theta` contributes
    ///   `G * mass * d / dist³`; any other node is opened and its children
    ///   are summed.
    ///
    /// `theta = 0` opens every internal node and reproduces the direct sum.
    /// The tree must be finalized.
    pub fn compute_force_on(
        &self,
        index: usize,
        particles: &[Particle],
        theta: f64,
        g: f64,
        eps: f64,
    ) -> NVec3 {
        let query = self.query(index, particles, theta, g, eps);
        let mut acc = NVec3::zeros();
        let mut interactions = 0;
        self.walk(self.root, &query, &mut acc, &mut interactions);
        acc
    }

    /// Number of point-mass evaluations [`Octree::compute_force_on`] performs
    /// for particle `index` with the same arguments. A proxy for query cost.
    pub fn interactions_for(
        &self,
        index: usize,
        particles: &[Particle],
        theta: f64,
        g: f64,
        eps: f64,
    ) -> usize {
        let query = self.query(index, particles, theta, g, eps);
        let mut acc = NVec3::zeros();
        let mut interactions = 0;
        self.walk(self.root, &query, &mut acc, &mut interactions);
        interactions
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> &OctreeNode {
        &self.nodes[self.root]
    }

    pub fn node(&self, idx: usize) -> Option<&OctreeNode> {
        self.nodes.get(idx)
    }

    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    pub fn total_mass(&self) -> f64 {
        self.root().mass
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    // helpers ==============================================================================

    fn query(&self, index: usize, particles: &[Particle], theta: f64, g: f64, eps: f64) -> Query {
        debug_assert!(self.finalized, "octree queried before finalize()");
        Query {
            index,
            pos: particles[index].x,
            theta,
            g,
            eps2: eps * eps,
        }
    }

    /// Arena index of the child octant of `node_idx` containing `p`,
    /// allocating the child if it does not exist yet.
    fn child_for(&mut self, node_idx: usize, p: &NVec3) -> usize {
        let center = self.nodes[node_idx].center;
        let half_size = self.nodes[node_idx].half_size;
        let octant = octant_for_point(p, &center);

        if let Some(child) = self.nodes[node_idx].children[octant] {
            return child;
        }

        let child = self.nodes.len();
        self.nodes.push(OctreeNode::empty(
            child_center(&center, half_size, octant),
            0.5 * half_size,
        ));
        self.nodes[node_idx].children[octant] = Some(child);
        child
    }

    fn walk(&self, node_idx: usize, q: &Query, acc: &mut NVec3, interactions: &mut usize) {
        let node = &self.nodes[node_idx];

        if node.mass == 0.0 {
            return;
        }

        let leaf = node.is_leaf();
        if leaf && node.occupant == Some(q.index) {
            return; // don't self-interact
        }

        let r = node.com - q.pos;
        let dist = (r.norm_squared() + q.eps2).sqrt();

        if leaf || node.half_size / dist < q.theta {
            *acc += q.g * node.mass / (dist * dist * dist) * r;
            *interactions += 1;
            return;
        }

        for &child in node.children.iter().flatten() {
            self.walk(child, q, acc, interactions);
        }
    }
}

// helpers ===========================================================================

/// Octant index of `p` relative to a cell center.
///
/// - Bit 0 (value 1): x > center.x
/// - Bit 1 (value 2): y > center.y
/// - Bit 2 (value 4): z > center.z
///
/// Points exactly on a split plane go to the lower octant.
fn octant_for_point(p: &NVec3, center: &NVec3) -> usize {
    let mut idx = 0;

    if p.x > center.x { idx |= 1; } // bit 0
    if p.y > center.y { idx |= 2; } // bit 1
    if p.z > center.z { idx |= 4; } // bit 2

    idx
}

/// Center of child `octant` of a cell, using the same bit layout as
/// [`octant_for_point`]. Children have half the parent's half-size.
fn child_center(center: &NVec3, half_size: f64, octant: usize) -> NVec3 {
    let quarter = 0.5 * half_size;
    let offset = |bit: usize| if octant & bit != 0 { quarter } else { -quarter };
    center + NVec3::new(offset(1), offset(2), offset(4))
}
