//! Symmetrical components.
//!
//! Sequence quantities are ordered `[0, 1, 2]` (zero, positive, negative),
//! phase quantities `[a, b, c]`.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};
use num_complex::Complex64;
use num_traits::One;

/// The 120° rotation operator `a = e^{j2π/3}`.
pub fn a() -> Complex64 {
    Complex64::from_polar(1.0, 2.0 * PI / 3.0)
}

/// Transform `A` taking sequence to phase quantities.
///
/// ```text
/// | 1  1   1  |
/// | 1  a²  a  |
/// | 1  a   a² |
/// ```
pub fn transform() -> Matrix3<Complex64> {
    let one = Complex64::one();
    let a = a();
    let a2 = a * a;
    Matrix3::new(one, one, one, one, a2, a, one, a, a2)
}

/// `A⁻¹ = A* / 3`, taking phase to sequence quantities.
pub fn inverse_transform() -> Matrix3<Complex64> {
    transform().map(|v| v.conj() / 3.0)
}

pub fn to_phase(v012: Vector3<Complex64>) -> Vector3<Complex64> {
    transform() * v012
}

pub fn to_sequence(abc: Vector3<Complex64>) -> Vector3<Complex64> {
    inverse_transform() * abc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_is_inverse() {
        let eye = transform() * inverse_transform();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((eye[(i, j)] - expected).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn test_positive_sequence_is_balanced() {
        let abc = to_phase(Vector3::new(
            Complex64::new(0.0, 0.0),
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
        ));
        assert!((abc[1] - Complex64::from_polar(1.0, -2.0 * PI / 3.0)).norm() < 1e-12);
        assert!((abc[2] - Complex64::from_polar(1.0, 2.0 * PI / 3.0)).norm() < 1e-12);
        let back = to_sequence(abc);
        assert!((back[1] - 1.0).norm() < 1e-12);
        assert!(back[0].norm() < 1e-12 && back[2].norm() < 1e-12);
    }
}
