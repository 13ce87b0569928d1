//! Reverse-mode differentiation on an explicit tape.
//!
//! Every operation appends a node holding its value and the local partial
//! derivatives with respect to its operands. Operands always have a smaller
//! index than the node using them, so one reverse sweep over the tape computes
//! the adjoints of all nodes for a chosen output.
//!
//! The tape is never reset by a sweep: after one forward recording any number
//! of outputs can be differentiated, which is what the Jacobian assembly needs.
use crate::network::Activation;

/// Handle to a node on a [`Tape`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Var(usize);

impl Var {
    /// Position of the node on the tape.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug)]
struct Node {
    value: f64,
    /// Range into `Tape::edges`.
    start: usize,
    end: usize,
}

/// Recording of a computation for reverse-mode differentiation.
#[derive(Clone, Debug, Default)]
pub struct Tape {
    nodes: Vec<Node>,
    /// `(operand index, local partial)` for all nodes, stored back to back.
    edges: Vec<(usize, f64)>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            edges: Vec::with_capacity(edges),
        }
    }

    /// Number of recorded nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn value(&self, var: Var) -> f64 {
        self.nodes[var.0].value
    }

    fn push<I>(&mut self, value: f64, operands: I) -> Var
    where
        I: IntoIterator<Item = (Var, f64)>,
    {
        let start = self.edges.len();
        self.edges
            .extend(operands.into_iter().map(|(var, partial)| (var.0, partial)));
        let end = self.edges.len();
        self.nodes.push(Node { value, start, end });
        Var(self.nodes.len() - 1)
    }

    /// Record an independent variable.
    pub fn variable(&mut self, value: f64) -> Var {
        self.push(value, None)
    }

    /// Record a constant.
    ///
    /// On the tape a constant is just a leaf whose adjoint nobody reads.
    pub fn constant(&mut self, value: f64) -> Var {
        self.push(value, None)
    }

    pub fn add(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a) + self.value(b);
        self.push(value, [(a, 1.0), (b, 1.0)])
    }

    pub fn sub(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a) - self.value(b);
        self.push(value, [(a, 1.0), (b, -1.0)])
    }

    pub fn mul(&mut self, a: Var, b: Var) -> Var {
        let (va, vb) = (self.value(a), self.value(b));
        self.push(va * vb, [(a, vb), (b, va)])
    }

    pub fn scale(&mut self, a: Var, factor: f64) -> Var {
        let value = self.value(a) * factor;
        self.push(value, [(a, factor)])
    }

    /// `$c + \sum_i w_i x_i$` with constant weights `$w_i$`.
    pub fn linear_combination(&mut self, terms: &[(Var, f64)], offset: f64) -> Var {
        let value = terms
            .iter()
            .fold(offset, |acc, &(var, weight)| acc + weight * self.value(var));
        self.push(value, terms.iter().copied())
    }

    /// `$b + \sum_i w_i x_i$` where the weights are tape variables as well.
    ///
    /// # Panics
    ///
    /// Panics if `weights` and `inputs` differ in length.
    pub fn affine(&mut self, weights: &[Var], inputs: &[Var], bias: Var) -> Var {
        assert_eq!(weights.len(), inputs.len(), "affine operand lengths differ");
        let value = weights
            .iter()
            .zip(inputs)
            .fold(self.value(bias), |acc, (&w, &x)| {
                acc + self.value(w) * self.value(x)
            });
        let start = self.edges.len();
        for (&w, &x) in weights.iter().zip(inputs) {
            let (vw, vx) = (self.value(w), self.value(x));
            self.edges.push((w.0, vx));
            self.edges.push((x.0, vw));
        }
        self.edges.push((bias.0, 1.0));
        let end = self.edges.len();
        self.nodes.push(Node { value, start, end });
        Var(self.nodes.len() - 1)
    }

    pub fn activate(&mut self, x: Var, activation: Activation) -> Var {
        let input = self.value(x);
        self.push(activation.apply(input), [(x, activation.derivative(input))])
    }

    /// Reverse sweep from `output`.
    ///
    /// Afterwards `adjoints[i]` holds `$\partial\,\mathrm{output}/\partial\,\mathrm{node}_i$`
    /// for every node recorded before `output`. Nodes `output` does not depend
    /// on end up with an adjoint of exactly zero. The buffer is reused
    /// between calls to avoid reallocating for every Jacobian row.
    pub fn backward(&self, output: Var, adjoints: &mut Vec<f64>) {
        adjoints.clear();
        adjoints.resize(output.0 + 1, 0.0);
        adjoints[output.0] = 1.0;
        for (i, node) in self.nodes[..=output.0].iter().enumerate().rev() {
            let adjoint = adjoints[i];
            if adjoint == 0.0 {
                continue;
            }
            for &(operand, partial) in &self.edges[node.start..node.end] {
                adjoints[operand] += adjoint * partial;
            }
        }
    }

    /// Convenience wrapper around [`backward`](#method.backward).
    pub fn gradient(&self, output: Var) -> Vec<f64> {
        let mut adjoints = Vec::new();
        self.backward(output, &mut adjoints);
        adjoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn product_and_tanh() {
        let mut tape = Tape::new();
        let x = tape.variable(0.3);
        let y = tape.variable(-1.2);
        let xy = tape.mul(x, y);
        let t = tape.activate(x, Activation::Tanh);
        let f = tape.add(xy, t);
        assert_relative_eq!(tape.value(f), 0.3 * -1.2 + 0.3f64.tanh());

        let grad = tape.gradient(f);
        assert_relative_eq!(grad[x.index()], -1.2 + 1. - 0.3f64.tanh().powi(2));
        assert_relative_eq!(grad[y.index()], 0.3);
    }

    #[test]
    fn disconnected_variable_has_zero_adjoint() {
        let mut tape = Tape::new();
        let x = tape.variable(2.);
        let unused = tape.variable(5.);
        let f = tape.scale(x, 3.);
        let grad = tape.gradient(f);
        assert_eq!(grad[unused.index()], 0.);
        assert_eq!(grad[x.index()], 3.);
    }

    #[test]
    fn repeated_sweeps_reuse_recording() {
        let mut tape = Tape::new();
        let w = [tape.variable(0.5), tape.variable(-0.25)];
        let x = [tape.constant(2.), tape.constant(4.)];
        let b = tape.variable(1.);
        let z = tape.affine(&w, &x, b);
        let out1 = tape.linear_combination(&[(z, 2.)], 1.);
        let out2 = tape.sub(z, b);
        assert_relative_eq!(tape.value(z), 1.);
        assert_relative_eq!(tape.value(out1), 3.);

        let mut adjoints = Vec::new();
        tape.backward(out1, &mut adjoints);
        assert_eq!(&adjoints[..2], &[4., 8.]);
        assert_eq!(adjoints[b.index()], 2.);

        tape.backward(out2, &mut adjoints);
        assert_eq!(&adjoints[..2], &[2., 4.]);
        assert_eq!(adjoints[b.index()], 0.);

        tape.backward(out1, &mut adjoints);
        assert_eq!(&adjoints[..2], &[4., 8.]);
    }

    #[test]
    fn relu_derivative_is_zero_left_of_origin() {
        let mut tape = Tape::new();
        let x = tape.variable(-0.5);
        let f = tape.activate(x, Activation::Relu);
        assert_eq!(tape.value(f), 0.);
        assert_eq!(tape.gradient(f)[x.index()], 0.);
    }
}
