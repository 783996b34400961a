// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Topology repair: node merging, closure checks and open-mesh stitching

use super::mesh::{share_edge, Edge, EdgeId, NodeId, TMesh, TriId};
use super::node_octree::NodeOctree;
use super::robust_predicates::dist_squared;
use crate::config::TrimConfig;
use tracing::{debug, instrument};

impl TMesh {
    /// Merge nodes closer than `merge_tol` (squared distance) onto the
    /// lowest id among them, drop triangles that collapse, compact the node
    /// arena and rebuild node -> triangle references. Node ids are
    /// renumbered in order. Returns the number of nodes merged away.
    #[instrument(skip_all, fields(mesh = %self.info.name))]
    pub fn match_nodes(&mut self, cfg: &TrimConfig) -> usize {
        let n = self.nodes.len();
        let tree = NodeOctree::build(self, cfg.node_leaf_size, cfg.merge_tol);

        for i in 0..n {
            let p = self.nodes[i].pnt;
            let mut list: Vec<NodeId> = tree
                .leaves_containing(&p)
                .into_iter()
                .flatten()
                .copied()
                .filter(|m| dist_squared(&p, &self.nodes[m.0].pnt) < cfg.merge_tol)
                .collect();
            list.sort_unstable();
            list.dedup();
            self.nodes[i].merge_list = list;
        }

        // Representatives resolve in id order, so chains collapse onto the
        // lowest id
        let mut rep: Vec<usize> = (0..n).collect();
        for i in 0..n {
            let low = self.nodes[i]
                .merge_list
                .iter()
                .map(|m| m.0)
                .min()
                .map_or(i, |m| m.min(i));
            rep[i] = if low == i { i } else { rep[low] };
        }

        let mut isect = vec![false; n];
        for i in 0..n {
            if self.nodes[i].isect {
                isect[rep[i]] = true;
            }
        }

        let before = self.tris.len();
        for tri in &mut self.tris {
            tri.n = tri.n.map(|id| NodeId(rep[id.0]));
        }
        self.tris
            .retain(|t| t.n[0] != t.n[1] && t.n[0] != t.n[2] && t.n[1] != t.n[2]);
        let dropped = before - self.tris.len();

        let mut used = vec![false; n];
        for tri in &self.tris {
            for id in tri.n {
                used[id.0] = true;
            }
        }

        let mut remap = vec![usize::MAX; n];
        let old = std::mem::take(&mut self.nodes);
        for (i, mut node) in old.into_iter().enumerate() {
            if !used[i] {
                continue;
            }
            remap[i] = self.nodes.len();
            node.id = self.nodes.len();
            node.isect = isect[i];
            node.merge_list.clear();
            node.tris.clear();
            node.edges.clear();
            self.nodes.push(node);
        }
        for tri in &mut self.tris {
            tri.n = tri.n.map(|id| NodeId(remap[id.0]));
            tri.e = [None; 3];
        }

        self.edges.clear();
        self.non_closed.clear();
        self.invalidate_tree();
        self.rebuild_node_tris();

        let merged = (0..n).filter(|&i| rep[i] != i).count();
        debug!(merged, dropped, nodes = self.nodes.len(), "nodes matched");
        merged
    }

    /// Rebuild edges from node -> triangle adjacency and flag every triangle
    /// that ends up with fewer than three edges. Such triangles are listed
    /// in `non_closed`; returns how many there are.
    pub fn check_valid(&mut self) -> usize {
        self.edges.clear();
        for node in &mut self.nodes {
            node.edges.clear();
        }
        for tri in &mut self.tris {
            tri.e = [None; 3];
        }
        self.rebuild_node_tris();

        for n in 0..self.nodes.len() {
            let tris = self.nodes[n].tris.clone();
            for (k, &t0) in tris.iter().enumerate() {
                for &t1 in &tris[k + 1..] {
                    self.find_edge(NodeId(n), t0, t1);
                }
            }
        }

        self.non_closed.clear();
        for id in self.tri_ids() {
            if self.tri(id).num_edges() < 3 {
                self.tri_mut(id).invalid = true;
                self.non_closed.push(id);
            }
        }
        self.non_closed.len()
    }

    /// Merge coincident nodes, then [`Self::check_valid`]
    #[instrument(skip_all, fields(mesh = %self.info.name))]
    pub fn check_if_closed(&mut self, cfg: &TrimConfig) -> usize {
        self.match_nodes(cfg);
        let open = self.check_valid();
        debug!(open, "closure checked");
        open
    }

    fn other_two(&self, tri: TriId, node: NodeId) -> [NodeId; 2] {
        let n = self.tri(tri).n;
        if n[0] == node {
            [n[1], n[2]]
        } else if n[1] == node {
            [n[0], n[2]]
        } else {
            [n[0], n[1]]
        }
    }

    /// If `t0` and `t1` share a second node besides `node`, record the edge
    fn find_edge(&mut self, node: NodeId, t0: TriId, t1: TriId) {
        let a = self.other_two(t0, node);
        let b = self.other_two(t1, node);
        if b.contains(&a[0]) {
            self.add_edge(t0, t1, node, a[0]);
        } else if b.contains(&a[1]) {
            self.add_edge(t0, t1, node, a[1]);
        }
    }

    fn add_edge(&mut self, t0: TriId, t1: TriId, n0: NodeId, n1: NodeId) {
        let already = self.tri(t0).e.iter().flatten().any(|e| {
            let edge = &self.edges[e.0];
            edge.tri0 == Some(t1) || edge.tri1 == Some(t1)
        });
        if already {
            return;
        }

        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            n0,
            n1,
            tri0: Some(t0),
            tri1: Some(t1),
        });
        for t in [t0, t1] {
            if let Some(slot) = self.tri_mut(t).e.iter_mut().find(|e| e.is_none()) {
                *slot = Some(id);
            }
        }
        self.nodes[n0.0].edges.push(id);
        self.nodes[n1.0].edges.push(id);
    }

    /// Drop triangles with an edge shorter than `degenerate_edge_len`
    pub fn remove_degenerate(&mut self, cfg: &TrimConfig) -> usize {
        let min_sq = cfg.degenerate_edge_len * cfg.degenerate_edge_len;
        let nodes = &self.nodes;
        let before = self.tris.len();
        self.tris.retain(|t| {
            let p = t.n.map(|n| nodes[n.0].pnt);
            dist_squared(&p[0], &p[1]) >= min_sq
                && dist_squared(&p[1], &p[2]) >= min_sq
                && dist_squared(&p[2], &p[0]) >= min_sq
        });
        let removed = before - self.tris.len();
        if removed > 0 {
            self.edges.clear();
            self.non_closed.clear();
            for tri in &mut self.tris {
                tri.e = [None; 3];
            }
            self.invalidate_tree();
            self.rebuild_node_tris();
        }
        removed
    }
}

/// Stitch open mesh `b` onto open mesh `a`. Every open triangle of `a` must
/// share an edge with some open triangle of `b`; on success `b` is copied
/// into `a`, `a` is re-checked and `b` is marked for deletion.
#[instrument(skip_all, fields(a = %a.info.name, b = %b.info.name))]
pub fn merge_non_closed(a: &mut TMesh, b: &mut TMesh, cfg: &TrimConfig) -> bool {
    if a.delete_me || b.delete_me || a.non_closed.is_empty() {
        return false;
    }

    let open_a = a.non_closed.clone();
    let open_b = b.non_closed.clone();
    let mut match_flag = false;
    for &ta in &open_a {
        match_flag = open_b
            .iter()
            .any(|&tb| share_edge(a, ta, b, tb, cfg.share_edge_tol));
        if !match_flag {
            break;
        }
    }

    if !match_flag {
        return false;
    }

    a.merge_from(b);
    for &t in &open_a {
        a.tri_mut(t).invalid = false;
    }
    a.non_closed.clear();
    let still_open = a.check_if_closed(cfg);
    b.delete_me = true;

    debug!(still_open, tris = a.num_tris(), "open meshes merged");
    true
}
