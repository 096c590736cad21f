//! Sparse linear solvers for the Newton-Raphson correction equations.
#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use faer::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::*;

#[cfg(feature = "faer")]
pub type DefaultSolver = FaerSolver;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

#[allow(non_snake_case)]
/// A trait for solving sparse linear systems `A·x = b` given in CSC form.
///
/// Implementations may cache the symbolic factorization between calls; the
/// caller invokes [`Solve::reset`] whenever the sparsity pattern changes.
pub trait Solve {
    /// Solves the sparse linear system, overwriting `b` with `x`.
    ///
    /// # Parameters
    ///
    /// * `Ap` - Column pointers of the matrix.
    /// * `Ai` - Row indices of the matrix.
    /// * `Ax` - Non-zero values of the matrix.
    /// * `b` - Right-hand side vector.
    /// * `n` - Dimension of the system.
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str>;

    /// Drops any cached symbolic analysis.
    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(non_snake_case)]
    #[test]
    fn test_default_solver_small_system() {
        // [4 1; 2 3] x = [1; 2]
        let mut Ap = vec![0, 2, 4];
        let mut Ai = vec![0, 1, 0, 1];
        let mut Ax = vec![4.0, 2.0, 1.0, 3.0];
        let mut b = vec![1.0, 2.0];
        let mut solver = DefaultSolver::default();
        solver.solve(&mut Ap, &mut Ai, &mut Ax, &mut b, 2).unwrap();
        assert!((b[0] - 0.1).abs() < 1e-12);
        assert!((b[1] - 0.6).abs() < 1e-12);

        // Same pattern, new values, cached symbolic analysis reused.
        let mut Ax = vec![2.0, 0.0, 0.0, 5.0];
        let mut b = vec![4.0, 10.0];
        solver.solve(&mut Ap, &mut Ai, &mut Ax, &mut b, 2).unwrap();
        assert!((b[0] - 2.0).abs() < 1e-12);
        assert!((b[1] - 2.0).abs() < 1e-12);
    }
}
