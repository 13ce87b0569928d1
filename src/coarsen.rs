//! Coarsening a network by averaging groups of hidden units.
//!
//! The hidden units `$0, \ldots, r-1$` are split into consecutive blocks of
//! `$m$` units, the last block taking the remaining `$r \bmod m$` units if
//! `$m$` does not divide `$r$`. Each block becomes one coarse unit. The
//! restriction matrix `$\mathbf{T} \in \R^{\lceil r/m\rceil\times r}$` holds
//! `$1/|B_i|$` on the columns of block `$B_i$` in row `$i$`, so that with
//! `$\mathbf{W}$` the weights of a layer
//!
//! - the first hidden layer becomes `$\mathbf{T}\mathbf{W}$`,
//! - every further hidden layer becomes `$\mathbf{T}\mathbf{W}\mathbf{T}^\top$`,
//! - every hidden bias becomes `$\mathbf{T}\vec b$`,
//! - the output weights become `$\mathbf{W}\mathbf{T}^\top$` and the output
//!   bias is kept.
//!
//! [`coarsen`] computes the block means directly; [`restriction`] gives the
//! same map as a matrix.
use nalgebra::{DMatrix, DVector};

use crate::network::{Layer, Network};
use crate::{Error, Result};

/// Sizes of the blocks `$n$` units are grouped into.
///
/// `block_sizes(10, 3)` is `[3, 3, 3, 1]`. Fails if `m` is zero.
pub fn block_sizes(n: usize, m: usize) -> Result<Vec<usize>> {
    if m == 0 {
        return Err(Error::InvalidBlockSize);
    }
    let mut sizes = vec![m; n / m];
    if n % m != 0 {
        sizes.push(n % m);
    }
    Ok(sizes)
}

/// The averaging matrix `$\mathbf{T}$` from `n` fine to `$\lceil n/m\rceil$` coarse units.
pub fn restriction(n: usize, m: usize) -> Result<DMatrix<f64>> {
    let sizes = block_sizes(n, m)?;
    let mut t = DMatrix::zeros(sizes.len(), n);
    let mut start = 0;
    for (i, &size) in sizes.iter().enumerate() {
        t.view_mut((i, start), (1, size))
            .fill(1. / size as f64);
        start += size;
    }
    Ok(t)
}

fn starts(sizes: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    sizes.iter().scan(0, |start, &size| {
        let block = (*start, size);
        *start += size;
        Some(block)
    })
}

/// Mean of every block of rows.
fn average_rows(matrix: &DMatrix<f64>, sizes: &[usize]) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(sizes.len(), matrix.ncols());
    for (i, (start, size)) in starts(sizes).enumerate() {
        out.set_row(i, &(matrix.rows(start, size).row_sum() / size as f64));
    }
    out
}

/// Mean of every block of columns.
fn average_columns(matrix: &DMatrix<f64>, sizes: &[usize]) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(matrix.nrows(), sizes.len());
    for (j, (start, size)) in starts(sizes).enumerate() {
        out.set_column(j, &(matrix.columns(start, size).column_sum() / size as f64));
    }
    out
}

fn average_entries(vector: &DVector<f64>, sizes: &[usize]) -> DVector<f64> {
    DVector::from_iterator(
        sizes.len(),
        starts(sizes).map(|(start, size)| vector.rows(start, size).sum() / size as f64),
    )
}

/// Coarse network with hidden width `$\lceil r/m\rceil$`.
///
/// The input and output dimensions, the number of hidden layers and the
/// activation are kept. Fails if `block_size` is zero.
pub fn coarsen(network: &Network, block_size: usize) -> Result<Network> {
    let sizes = block_sizes(network.width(), block_size)?;
    let hidden = network
        .hidden_layers()
        .iter()
        .enumerate()
        .map(|(index, layer)| {
            let rows = average_rows(&layer.weights, &sizes);
            Layer {
                weights: if index == 0 {
                    rows
                } else {
                    average_columns(&rows, &sizes)
                },
                biases: average_entries(&layer.biases, &sizes),
            }
        })
        .collect();
    let output = network.output_layer();
    let output = Layer {
        weights: average_columns(&output.weights, &sizes),
        biases: output.biases.clone(),
    };
    log::debug!(
        "coarsened hidden width {} to {} with block size {}",
        network.width(),
        sizes.len(),
        block_size
    );
    Network::from_layers(hidden, output, network.activation())
}

/// A sequence of networks, each a coarsening of the previous one.
#[derive(Clone, Debug, PartialEq)]
pub struct Hierarchy {
    networks: Vec<Network>,
    restrictions: Vec<DMatrix<f64>>,
}

impl Hierarchy {
    /// Coarsen `network` up to `levels` times with the same block size.
    ///
    /// Stops early once the hidden width is 1. The finest network is level 0.
    pub fn build(network: Network, block_size: usize, levels: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        let mut networks = vec![network];
        let mut restrictions = Vec::with_capacity(levels);
        for _ in 0..levels {
            let fine = &networks[networks.len() - 1];
            if fine.width() == 1 {
                break;
            }
            restrictions.push(restriction(fine.width(), block_size)?);
            let coarse = coarsen(fine, block_size)?;
            networks.push(coarse);
        }
        Ok(Self {
            networks,
            restrictions,
        })
    }

    /// Number of levels, the finest included.
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn network(&self, level: usize) -> Option<&Network> {
        self.networks.get(level)
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    /// `$\mathbf{T}$` mapping the hidden units of `level` to those of `level + 1`.
    pub fn restriction(&self, level: usize) -> Option<&DMatrix<f64>> {
        self.restrictions.get(level)
    }

    pub fn finest(&self) -> &Network {
        &self.networks[0]
    }

    pub fn coarsest(&self) -> &Network {
        &self.networks[self.networks.len() - 1]
    }
}
