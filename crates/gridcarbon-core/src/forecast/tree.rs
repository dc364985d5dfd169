// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of GridCarbon.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Second-order regression trees grown greedily on exact split candidates.
//!
//! Missing feature values are routed along a per-split default direction,
//! chosen while searching for the split as whichever side yields more gain.

/// Column-major feature storage with a per-feature presorted row order.
#[derive(Debug, Clone)]
pub(crate) struct FeatureMatrix {
    columns: Vec<Vec<Option<f64>>>,
    sorted: Vec<Vec<usize>>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Non-finite cells are treated as missing.
    pub(crate) fn new(columns: Vec<Vec<Option<f64>>>, n_rows: usize) -> Self {
        let columns: Vec<Vec<Option<f64>>> = columns
            .into_iter()
            .map(|col| col.into_iter().map(|v| v.filter(|x| x.is_finite())).collect())
            .collect();

        let sorted = columns
            .iter()
            .map(|col| {
                let mut rows: Vec<usize> = (0..n_rows).filter(|&r| col[r].is_some()).collect();
                rows.sort_by(|&a, &b| {
                    col[a]
                        .unwrap_or_default()
                        .total_cmp(&col[b].unwrap_or_default())
                });
                rows
            })
            .collect();

        Self {
            columns,
            sorted,
            n_rows,
        }
    }

    pub(crate) fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub(crate) fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn value(&self, feature: usize, row: usize) -> Option<f64> {
        self.columns[feature][row]
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub lambda: f64,
    pub min_child_weight: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        missing_left: bool,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    missing_left: bool,
    gain: f64,
}

/// Gains at or below this are float noise, not structure.
const MIN_SPLIT_GAIN: f64 = 1e-12;

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

struct Grower<'a> {
    matrix: &'a FeatureMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    params: TreeParams,
    in_node: Vec<bool>,
    nodes: Vec<Node>,
}

impl Grower<'_> {
    fn grow(&mut self, rows: &[usize], depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.hess[r]).sum();

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: -g / (h + self.params.lambda) * self.params.learning_rate,
        });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return id;
        }
        let Some(split) = self.best_split(rows, g, h) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&r| match self.matrix.value(split.feature, r) {
                Some(v) => v < split.threshold,
                None => split.missing_left,
            });
        if left_rows.is_empty() || right_rows.is_empty() {
            return id;
        }

        let left = self.grow(&left_rows, depth + 1);
        let right = self.grow(&right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            missing_left: split.missing_left,
            left,
            right,
        };
        id
    }

    fn best_split(&mut self, rows: &[usize], g: f64, h: f64) -> Option<Split> {
        let TreeParams {
            lambda,
            min_child_weight,
            ..
        } = self.params;
        let parent = score(g, h, lambda);

        for &r in rows {
            self.in_node[r] = true;
        }

        let mut best: Option<Split> = None;
        for feature in 0..self.matrix.n_features() {
            let (mut g_missing, mut h_missing) = (0.0, 0.0);
            for &r in rows {
                if self.matrix.value(feature, r).is_none() {
                    g_missing += self.grad[r];
                    h_missing += self.hess[r];
                }
            }

            let present: Vec<(usize, f64)> = self.matrix.sorted[feature]
                .iter()
                .filter(|&&r| self.in_node[r])
                .filter_map(|&r| self.matrix.value(feature, r).map(|v| (r, v)))
                .collect();

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for pair in present.windows(2) {
                let (row, value) = pair[0];
                let (_, next_value) = pair[1];
                g_left += self.grad[row];
                h_left += self.hess[row];
                if next_value <= value {
                    continue;
                }

                let mid = value + (next_value - value) / 2.0;
                let threshold = if mid > value { mid } else { next_value };

                for missing_left in [false, true] {
                    let (lg, lh) = if missing_left {
                        (g_left + g_missing, h_left + h_missing)
                    } else {
                        (g_left, h_left)
                    };
                    let (rg, rh) = (g - lg, h - lh);
                    if lh < min_child_weight || rh < min_child_weight {
                        continue;
                    }
                    let gain = 0.5 * (score(lg, lh, lambda) + score(rg, rh, lambda) - parent);
                    if gain > best.map_or(MIN_SPLIT_GAIN, |b| b.gain) {
                        best = Some(Split {
                            feature,
                            threshold,
                            missing_left,
                            gain,
                        });
                    }
                }
            }
        }

        for &r in rows {
            self.in_node[r] = false;
        }
        best
    }
}

impl RegressionTree {
    /// Fit one tree to the given gradients over the selected rows.
    pub(crate) fn fit(
        matrix: &FeatureMatrix,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        params: TreeParams,
    ) -> Self {
        let mut grower = Grower {
            matrix,
            grad,
            hess,
            params,
            in_node: vec![false; matrix.n_rows()],
            nodes: Vec::new(),
        };
        grower.grow(rows, 0);
        Self {
            nodes: grower.nodes,
        }
    }

    /// Evaluate the tree for one row; `value_of` yields the row's feature values.
    pub(crate) fn predict<F>(&self, value_of: F) -> f64
    where
        F: Fn(usize) -> Option<f64>,
    {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    missing_left,
                    left,
                    right,
                } => {
                    idx = match value_of(*feature).filter(|v| v.is_finite()) {
                        Some(v) if v < *threshold => *left,
                        Some(_) => *right,
                        None if *missing_left => *left,
                        None => *right,
                    };
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}
