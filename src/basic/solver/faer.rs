use faer::{
    MatMut,
    linalg::solvers::Solve,
    sparse::{
        SparseColMatRef, SymbolicSparseColMatRef,
        linalg::solvers::{Lu, SymbolicLu},
    },
};

use super::Solve as PoSolve;

/// Sparse LU solver backed by `faer`.
#[derive(Default)]
pub struct FaerSolver {
    symbolic: Option<SymbolicLu<usize>>,
}

#[allow(non_snake_case)]
impl PoSolve for FaerSolver {
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        if Ap.len() != n + 1 || b.len() != n {
            return Err("dimension mismatch");
        }
        if n == 0 {
            return Ok(());
        }
        let s = SymbolicSparseColMatRef::new_checked(n, n, Ap, None, Ai);
        let mat = SparseColMatRef::new(s, Ax);
        let symbolic = match self.symbolic.take() {
            Some(symbolic) => symbolic,
            None => SymbolicLu::try_new(s).map_err(|_| "Faer symbolic error")?,
        };
        let lu = Lu::try_new_with_symbolic(symbolic.clone(), mat)
            .map_err(|_| "Faer numerical error")?;
        self.symbolic = Some(symbolic);
        let mat_ref = MatMut::from_column_major_slice_mut(b, n, 1);
        lu.solve_in_place(mat_ref);
        if b.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err("singular Jacobian")
        }
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}
