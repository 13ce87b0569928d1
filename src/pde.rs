//! Uniform grids and the discrete Laplacian.
//!
//! The Laplacian uses the standard second-order stencil
//! `$(u_{i-1} - 2u_i + u_{i+1})/h^2$` on every row, boundary rows included.
//! Boundary rows are never used as residuals; only interior nodes are.
use nalgebra::DVector;
use sprs::{CsMat, TriMat};

use crate::network::Network;
use crate::{Error, Result};

/// Relative tolerance when checking that explicit nodes are equally spaced.
const SPACING_TOL: f64 = 1e-9;

/// A uniform grid on an interval or a rectangle.
///
/// Nodes of a 2-D grid are numbered row by row with `x` varying fastest, so
/// node `(ix, iy)` has index `iy * nx + ix`.
#[derive(Clone, Debug, PartialEq)]
pub enum Grid {
    Line { nodes: Vec<f64> },
    Plane { x: Vec<f64>, y: Vec<f64> },
}

fn uniform_axis(a: f64, b: f64, n: usize) -> Result<Vec<f64>> {
    if n < 3 {
        return Err(Error::GridTooSmall(n));
    }
    if !(a.is_finite() && b.is_finite() && a < b) {
        return Err(Error::EmptyDomain { a, b });
    }
    let step = (b - a) / (n - 1) as f64;
    let mut nodes: Vec<f64> = (0..n).map(|i| a + step * i as f64).collect();
    nodes[n - 1] = b;
    Ok(nodes)
}

fn spacing(nodes: &[f64]) -> f64 {
    nodes[1] - nodes[0]
}

impl Grid {
    /// `n` equally spaced nodes on `$[a, b]$`, both ends included.
    pub fn uniform(a: f64, b: f64, n: usize) -> Result<Self> {
        Ok(Grid::Line {
            nodes: uniform_axis(a, b, n)?,
        })
    }

    /// Tensor grid of `nx × ny` nodes on `$[a_x, b_x]\times[a_y, b_y]$`.
    pub fn uniform_2d(x: (f64, f64, usize), y: (f64, f64, usize)) -> Result<Self> {
        Ok(Grid::Plane {
            x: uniform_axis(x.0, x.1, x.2)?,
            y: uniform_axis(y.0, y.1, y.2)?,
        })
    }

    /// 1-D grid from explicit nodes, which must be increasing and equally spaced.
    pub fn from_nodes(nodes: Vec<f64>) -> Result<Self> {
        if nodes.len() < 3 {
            return Err(Error::GridTooSmall(nodes.len()));
        }
        let h = spacing(&nodes);
        if !(h > 0.) {
            return Err(Error::EmptyDomain {
                a: nodes[0],
                b: nodes[nodes.len() - 1],
            });
        }
        let uniform = nodes
            .windows(2)
            .all(|w| ((w[1] - w[0]) - h).abs() <= SPACING_TOL * h.abs().max(1.));
        if !uniform {
            return Err(Error::NonUniformGrid);
        }
        Ok(Grid::Line { nodes })
    }

    pub fn dimension(&self) -> usize {
        match self {
            Grid::Line { .. } => 1,
            Grid::Plane { .. } => 2,
        }
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        match self {
            Grid::Line { nodes } => nodes.len(),
            Grid::Plane { x, y } => x.len() * y.len(),
        }
    }

    /// Always `false`, a valid grid has at least three nodes per axis.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates of node `index`.
    pub fn point(&self, index: usize) -> Vec<f64> {
        match self {
            Grid::Line { nodes } => vec![nodes[index]],
            Grid::Plane { x, y } => vec![x[index % x.len()], y[index / x.len()]],
        }
    }

    pub fn points(&self) -> Vec<Vec<f64>> {
        (0..self.len()).map(|i| self.point(i)).collect()
    }

    /// Whether `other` has the same nodes up to rounding.
    pub fn same_nodes(&self, other: &Grid) -> bool {
        let close = |a: &[f64], b: &[f64]| {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(p, q)| (p - q).abs() <= SPACING_TOL * p.abs().max(q.abs()).max(1.))
        };
        match (self, other) {
            (Grid::Line { nodes: a }, Grid::Line { nodes: b }) => close(a, b),
            (Grid::Plane { x: ax, y: ay }, Grid::Plane { x: bx, y: by }) => {
                close(ax, bx) && close(ay, by)
            }
            _ => false,
        }
    }

    fn is_boundary(&self, index: usize) -> bool {
        match self {
            Grid::Line { nodes } => index == 0 || index == nodes.len() - 1,
            Grid::Plane { x, y } => {
                let nx = x.len();
                let (ix, iy) = (index % nx, index / nx);
                ix == 0 || iy == 0 || ix == nx - 1 || iy == y.len() - 1
            }
        }
    }

    /// Indices of the interior nodes in increasing order.
    pub fn interior(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| !self.is_boundary(i)).collect()
    }

    /// Indices of the boundary nodes in increasing order.
    ///
    /// For a 1-D grid these are the two end points.
    pub fn boundary(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.is_boundary(i)).collect()
    }

    /// Sample `f` at every node.
    pub fn sample<S>(&self, f: S) -> DVector<f64>
    where
        S: Fn(&[f64]) -> f64,
    {
        DVector::from_iterator(self.len(), (0..self.len()).map(|i| f(&self.point(i))))
    }

    /// Assemble the discrete Laplacian in CSR format.
    pub fn laplacian(&self) -> CsMat<f64> {
        match self {
            Grid::Line { nodes } => {
                let n = nodes.len();
                let inv_h2 = spacing(nodes).powi(-2);
                let mut tri = TriMat::with_capacity((n, n), 3 * n);
                for i in 0..n {
                    tri.add_triplet(i, i, -2. * inv_h2);
                    if i > 0 {
                        tri.add_triplet(i, i - 1, inv_h2);
                    }
                    if i + 1 < n {
                        tri.add_triplet(i, i + 1, inv_h2);
                    }
                }
                tri.to_csr()
            }
            Grid::Plane { x, y } => {
                let (nx, ny) = (x.len(), y.len());
                let n = nx * ny;
                let inv_hx2 = spacing(x).powi(-2);
                let inv_hy2 = spacing(y).powi(-2);
                let mut tri = TriMat::with_capacity((n, n), 5 * n);
                for iy in 0..ny {
                    for ix in 0..nx {
                        let i = iy * nx + ix;
                        tri.add_triplet(i, i, -2. * inv_hx2 - 2. * inv_hy2);
                        if ix > 0 {
                            tri.add_triplet(i, i - 1, inv_hx2);
                        }
                        if ix + 1 < nx {
                            tri.add_triplet(i, i + 1, inv_hx2);
                        }
                        if iy > 0 {
                            tri.add_triplet(i, i - nx, inv_hy2);
                        }
                        if iy + 1 < ny {
                            tri.add_triplet(i, i + nx, inv_hy2);
                        }
                    }
                }
                tri.to_csr()
            }
        }
    }
}

/// Sparse matrix-vector product `$\mathbf{L}\vec u$`.
///
/// Fails if `u` does not have one entry per column of `l`.
pub fn apply_operator(l: &CsMat<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
    if u.len() != l.cols() {
        return Err(Error::ShapeMismatch {
            expected: l.cols(),
            actual: u.len(),
        });
    }
    let mut out = DVector::zeros(l.rows());
    for (row, values) in l.outer_iterator().enumerate() {
        out[row] = values.iter().map(|(col, &value)| value * u[col]).sum();
    }
    Ok(out)
}

/// The operator `$-\Delta u = f$` discretized on a fixed grid.
///
/// The Laplacian is assembled once on construction.
#[derive(Clone, Debug)]
pub struct Poisson {
    grid: Grid,
    laplacian: CsMat<f64>,
}

impl Poisson {
    pub fn new(grid: Grid) -> Self {
        let laplacian = grid.laplacian();
        Self { grid, laplacian }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn laplacian(&self) -> &CsMat<f64> {
        &self.laplacian
    }

    pub fn apply(&self, u: &DVector<f64>) -> Result<DVector<f64>> {
        apply_operator(&self.laplacian, u)
    }

    /// Discrete source term of an analytic solution, `$\mathbf{L}\,u(\vec x)$`.
    pub fn source_term<S>(&self, solution: S) -> Result<DVector<f64>>
    where
        S: Fn(&[f64]) -> f64,
    {
        self.apply(&self.grid.sample(solution))
    }

    /// Discrete source term induced by the first output of `network`.
    pub fn network_source_term(&self, network: &Network) -> Result<DVector<f64>> {
        if network.input_dim() != self.grid.dimension() {
            return Err(Error::InputDimension {
                network: network.input_dim(),
                grid: self.grid.dimension(),
            });
        }
        self.apply(&self.grid.sample(|x| network.forward(x)[0]))
    }
}
