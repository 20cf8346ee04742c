//! Interpolation, load vectors, point evaluation and error integration on an [`FeSpace`].

use crate::core::scalar::Scalar;
use crate::fe::space::FeSpace;

/// Nodal interpolation of `f`.
pub fn interpolate<T: Scalar, const D: usize>(
    space: &FeSpace<D>,
    f: impl Fn(&[f64; D]) -> f64,
) -> Vec<T> {
    space
        .dof_handler
        .support_points(&space.mesh, &space.fe)
        .iter()
        .map(|p| T::cast_from(f(p)))
        .collect()
}

/// Load vector `(f, φ_i)`; constrained entries are zero.
pub fn create_right_hand_side<T: Scalar, const D: usize>(
    space: &FeSpace<D>,
    f: impl Fn(&[f64; D]) -> f64,
) -> Vec<T> {
    let mut rhs = vec![0.0f64; space.n_dofs()];
    let fe = &space.fe;
    let nq = fe.n_q_points();
    for c in 0..space.n_cells() {
        let dofs = space.dof_handler.cell_dofs(c);
        for q in 0..nq {
            let fx = f(space.mapping.quadrature_point(c, q)) * space.mapping.jxw(c, q);
            for (i, &dof) in dofs.iter().enumerate() {
                rhs[dof] += fx * fe.shape_value(q, i);
            }
        }
    }
    let mut out: Vec<T> = rhs.into_iter().map(T::cast_from).collect();
    space.constraints.distribute(&mut out);
    out
}

/// Value of the finite-element function `v` at physical point `p`; `None` outside the mesh.
pub fn point_value<T: Scalar, const D: usize>(
    space: &FeSpace<D>,
    v: &[T],
    p: &[f64; D],
) -> Option<f64> {
    let (c, xi) = space.mesh.locate(p)?;
    let dofs = space.dof_handler.cell_dofs(c);
    Some(
        dofs.iter()
            .enumerate()
            .map(|(i, &dof)| v[dof].as_f64() * space.fe.value_at(i, &xi))
            .sum(),
    )
}

/// Squared norms of `u_h - u` accumulated over all cells.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DifferenceNorms {
    pub l2_squared: f64,
    pub h1_semi_squared: f64,
    /// Maximum over quadrature points.
    pub linfty: f64,
}

/// Compare `v` against an exact solution with gradient `grad`.
pub fn integrate_difference<T: Scalar, const D: usize>(
    space: &FeSpace<D>,
    v: &[T],
    exact: impl Fn(&[f64; D]) -> f64,
    grad: impl Fn(&[f64; D]) -> [f64; D],
) -> DifferenceNorms {
    let fe = &space.fe;
    let nq = fe.n_q_points();
    let mut out = DifferenceNorms::default();
    for c in 0..space.n_cells() {
        let dofs = space.dof_handler.cell_dofs(c);
        for q in 0..nq {
            let mut val = 0.0;
            let mut g_ref = [0.0; D];
            for (i, &dof) in dofs.iter().enumerate() {
                let ui = v[dof].as_f64();
                val += ui * fe.shape_value(q, i);
                let g = fe.shape_grad(q, i);
                for d in 0..D {
                    g_ref[d] += ui * g[d];
                }
            }
            let x = space.mapping.quadrature_point(c, q);
            let g_h = space.mapping.physical_gradient(c, q, &g_ref);
            let g_e = grad(x);
            let jxw = space.mapping.jxw(c, q);
            let diff = val - exact(x);
            out.l2_squared += diff * diff * jxw;
            out.h1_semi_squared += (0..D).map(|d| (g_h[d] - g_e[d]).powi(2)).sum::<f64>() * jxw;
            out.linfty = out.linfty.max(diff.abs());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::mesh::Mesh;
    use approx::assert_abs_diff_eq;

    fn unit_space(degree: usize) -> FeSpace<2> {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 2).unwrap();
        FeSpace::new(mesh, degree).unwrap()
    }

    #[test]
    fn quadratic_is_reproduced_by_q2() {
        let space = unit_space(2);
        let f = |p: &[f64; 2]| p[0] * p[0] + 2.0 * p[1];
        let v: Vec<f64> = interpolate(&space, f);
        let norms = integrate_difference(&space, &v, f, |p| [2.0 * p[0], 2.0]);
        assert!(norms.l2_squared < 1e-24);
        assert!(norms.h1_semi_squared < 1e-22);
        assert_abs_diff_eq!(point_value(&space, &v, &[0.3, 0.7]).unwrap(), 0.09 + 1.4, epsilon = 1e-12);
        assert!(point_value(&space, &v, &[1.5, 0.0]).is_none());
    }

    #[test]
    fn load_vector_of_constant_integrates_interior_support() {
        let mesh = Mesh::<2>::hyper_rectangle([1, 1], [0.0, 0.0], [1.0, 1.0], 1).unwrap();
        let space = FeSpace::with_quadrature(mesh, 1, 2, false).unwrap();
        let rhs: Vec<f64> = create_right_hand_side(&space, |_| 1.0);
        assert_abs_diff_eq!(rhs.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(rhs[4], 0.25, epsilon = 1e-14);
    }
}
