//! Discrete phase space of a single qudit and the quasi-probability
//! representations built on it.
//!
//! A frame is fixed by a Hermitian, unit-trace matrix Gamma. From it we get
//! the dual pair of kernels
//!
//! ```text
//! F_0 = 1/d sum_a D_a / tr[D_a Gamma]      F_x = D_x F_0 D_x^dag
//!                                          G_x = D_x Gamma D_x^dag
//! ```
//!
//! with tr[F_x G_y] = d delta_xy. States are expanded over F, effects over G,
//! and a gate is represented by its transition matrix from input G-frames to
//! output F-frames.

use crate::error::{QuasiError, Result};
use std::f64::consts::PI;
use std::sync::OnceLock;
use tn::{kron_all, CMat, QdTensor, C64};
use tracing::error;

/// |tr[D_a Gamma]| below this makes the kernel blow up.
pub const SINGULAR_TOL: f64 = 1e-12;

/// Largest imaginary part tolerated in a quasi-probability, relative to its
/// magnitude.
pub const IMAG_TOL: f64 = 1e-8;

/// Marginal drift tolerated by the debug-build consistency checks.
pub const MARGINAL_TOL: f64 = 1e-8;

static QUBIT: OnceLock<PhaseSpace> = OnceLock::new();
static QUTRIT: OnceLock<PhaseSpace> = OnceLock::new();

/// Displacement operators of one qudit, indexed by the point `p * d + q`.
#[derive(Debug)]
pub struct PhaseSpace {
    dim: usize,
    displacements: Vec<CMat>,
}

/// Dual frame for a single Gamma: `f[x]` expands states, `g[x]` effects.
#[derive(Clone, Debug)]
pub struct Kernel {
    pub f: Vec<CMat>,
    pub g: Vec<CMat>,
}

impl PhaseSpace {
    /// Shared table for dimension 2 or 3, built on first use.
    pub fn get(dim: usize) -> Result<&'static PhaseSpace> {
        match dim {
            2 => Ok(QUBIT.get_or_init(|| PhaseSpace::build(2))),
            3 => Ok(QUTRIT.get_or_init(|| PhaseSpace::build(3))),
            d => Err(QuasiError::UnsupportedDimension(d)),
        }
    }

    fn build(d: usize) -> Self {
        // tau = -e^{i pi / d}, so that tau^2 = omega
        let tau = -C64::from_polar(1.0, PI / d as f64);
        let x = crate::gates::shift(d);
        let z = crate::gates::clock(d);
        let mut displacements = Vec::with_capacity(d * d);
        for p in 0..d {
            let xp = x.power(p);
            for q in 0..d {
                let phase = tau.powu((p * q) as u32);
                displacements.push(xp.matmul(&z.power(q)).scale(phase));
            }
        }
        Self { dim: d, displacements }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of phase-space points, d^2.
    pub fn points(&self) -> usize {
        self.dim * self.dim
    }

    /// Real parameters per Gamma, d^2 - 1.
    pub fn n_params(&self) -> usize {
        self.dim * self.dim - 1
    }

    /// D_{pq} = tau^{pq} X^p Z^q
    pub fn displacement(&self, point: usize) -> &CMat {
        &self.displacements[point]
    }

    /// Parameters of the standard Wigner frame: Gamma = F_0, the self-dual
    /// point (the parity operator for qutrits).
    pub fn wigner_params(&self) -> Vec<f64> {
        match self.dim {
            2 => vec![1.0, 0.5, 0.5],
            _ => vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    /// Builds Gamma from its d^2 - 1 real parameters.
    ///
    /// Layout, row by row over the upper triangle: the diagonal entry (except
    /// for the last row, which is fixed by unit trace), then (re, im) of every
    /// entry to its right. The lower triangle is the Hermitian mirror.
    pub fn x_to_gamma(&self, x: &[f64]) -> CMat {
        let d = self.dim;
        assert_eq!(
            x.len(),
            self.n_params(),
            "Gamma needs {} parameters",
            self.n_params()
        );
        let mut gamma = CMat::zeros(d);
        let mut k = 0;
        let mut diag = 0.0;
        for i in 0..d {
            if i + 1 < d {
                gamma.set(i, i, C64::new(x[k], 0.0));
                diag += x[k];
                k += 1;
            }
            for j in i + 1..d {
                let v = C64::new(x[k], x[k + 1]);
                gamma.set(i, j, v);
                gamma.set(j, i, v.conj());
                k += 2;
            }
        }
        gamma.set(d - 1, d - 1, C64::new(1.0 - diag, 0.0));
        gamma
    }

    pub fn kernel(&self, gamma: &CMat) -> Result<Kernel> {
        let d = self.dim;
        let mut f0 = CMat::zeros(d);
        for (a, disp) in self.displacements.iter().enumerate() {
            let t = disp.trace_product(gamma);
            if t.norm() < SINGULAR_TOL {
                return Err(QuasiError::SingularKernel { point: a });
            }
            f0 = &f0 + &disp.scale(C64::new(1.0 / d as f64, 0.0) / t);
        }
        let f = self.displacements.iter().map(|x| f0.conjugate_by(x)).collect();
        let g = self
            .displacements
            .iter()
            .map(|x| gamma.conjugate_by(x))
            .collect();
        Ok(Kernel { f, g })
    }

    /// W_rho(x) = 1/d Re tr[F_x rho]
    pub fn w_state(&self, rho: &CMat, gamma: &CMat) -> Result<QdTensor> {
        let kernel = self.kernel(gamma)?;
        let scale = 1.0 / self.dim as f64;
        let data = kernel
            .f
            .iter()
            .map(|fx| real_part(fx.trace_product(rho) * scale))
            .collect::<Result<Vec<_>>>()?;
        Ok(QdTensor::from_vec(1, self.points(), data))
    }

    /// W_E(x) = Re tr[G_x E]
    pub fn w_meas(&self, effect: &CMat, gamma: &CMat) -> Result<QdTensor> {
        let kernel = self.kernel(gamma)?;
        let data = kernel
            .g
            .iter()
            .map(|gx| real_part(gx.trace_product(effect)))
            .collect::<Result<Vec<_>>>()?;
        Ok(QdTensor::from_vec(1, self.points(), data))
    }

    /// Transition quasi-probability of a k-wire gate, input legs first:
    ///
    /// W_U(a; b) = 1/d^k Re tr[U (G_a1 x .. x G_ak) U^dag (F_b1 x .. x F_bk)]
    ///
    /// so that every row (fixed input point) sums to one.
    pub fn w_gate(&self, u: &CMat, gamma_in: &[&CMat], gamma_out: &[&CMat]) -> Result<QdTensor> {
        let k = gamma_in.len();
        if k == 0 || k > 3 {
            return Err(QuasiError::UnsupportedArity(k));
        }
        if gamma_out.len() != k {
            return Err(QuasiError::LengthMismatch {
                what: "output frames",
                expected: k,
                got: gamma_out.len(),
            });
        }
        let n = self.dim.pow(k as u32);
        if u.dim() != n {
            return Err(QuasiError::OperatorShape {
                what: "gate",
                index: 0,
                expected: n,
                got: u.dim(),
            });
        }

        let k_in = gamma_in
            .iter()
            .map(|g| self.kernel(g))
            .collect::<Result<Vec<_>>>()?;
        let k_out = gamma_out
            .iter()
            .map(|g| self.kernel(g))
            .collect::<Result<Vec<_>>>()?;

        let p = self.points();
        let rows = p.pow(k as u32);
        let f_out: Vec<CMat> = (0..rows)
            .map(|b| {
                let legs = leg_digits(b, p, k);
                let factors: Vec<&CMat> = legs.iter().zip(&k_out).map(|(&x, kr)| &kr.f[x]).collect();
                kron_all(&factors)
            })
            .collect();

        let scale = 1.0 / n as f64;
        let u_dag = u.dagger();
        let mut w = QdTensor::zeros(2 * k, p);
        for a in 0..rows {
            let legs = leg_digits(a, p, k);
            let factors: Vec<&CMat> = legs.iter().zip(&k_in).map(|(&x, kr)| &kr.g[x]).collect();
            let evolved = u.matmul(&kron_all(&factors)).matmul(&u_dag);
            for (b, fb) in f_out.iter().enumerate() {
                let v = real_part(evolved.trace_product(fb) * scale)?;
                w.set_flat(a * rows + b, v);
            }
        }
        Ok(w)
    }

    /// Sum of |W_rho|; one for states with a non-negative representation.
    pub fn neg_state(&self, rho: &CMat, gamma: &CMat) -> Result<f64> {
        Ok(self.w_state(rho, gamma)?.abs_sum())
    }

    /// Per-input-point negativity of a gate: sum over outputs of |W_U(a; .)|.
    pub fn neg_gate(&self, u: &CMat, gamma_in: &[&CMat], gamma_out: &[&CMat]) -> Result<Vec<f64>> {
        let w = self.w_gate(u, gamma_in, gamma_out)?;
        Ok(w.row_abs_sums(gamma_in.len()))
    }

    /// Worst case over input points of [`PhaseSpace::neg_gate`].
    pub fn neg_gate_max(&self, u: &CMat, gamma_in: &[&CMat], gamma_out: &[&CMat]) -> Result<f64> {
        Ok(self
            .neg_gate(u, gamma_in, gamma_out)?
            .into_iter()
            .fold(0.0, f64::max))
    }

    /// max |W_E|, floored at 1 like every other element's negativity.
    pub fn neg_meas(&self, effect: &CMat, gamma: &CMat) -> Result<f64> {
        Ok(self.w_meas(effect, gamma)?.max_abs().max(1.0))
    }
}

/// Splits a flat multi-point index into `k` per-leg points, first leg most
/// significant.
pub fn leg_digits(mut index: usize, points: usize, k: usize) -> Vec<usize> {
    let mut legs = vec![0; k];
    for slot in legs.iter_mut().rev() {
        *slot = index % points;
        index /= points;
    }
    legs
}

fn real_part(z: C64) -> Result<f64> {
    if !z.re.is_finite() || !z.im.is_finite() {
        return Err(QuasiError::NonFinite("quasi-probability"));
    }
    if z.im.abs() > IMAG_TOL * z.norm().max(1.0) {
        return Err(QuasiError::ImaginaryResidue { residue: z.im });
    }
    Ok(z.re)
}

/// Debug builds: the state quasi-probability must sum to tr[rho].
pub fn check_state_trace(w: &QdTensor, trace: f64, element: &str) -> Result<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    let drift = (w.sum() - trace).abs();
    check_drift(drift, w.abs_sum(), element)
}

/// Debug builds: every row of a gate quasi-probability must sum to one.
pub fn check_gate_marginals(w: &QdTensor, in_legs: usize, element: &str) -> Result<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    let drift = w
        .row_sums(in_legs)
        .iter()
        .fold(0.0, |m: f64, s| m.max((s - 1.0).abs()));
    let scale = w.row_abs_sums(in_legs).into_iter().fold(0.0, f64::max);
    check_drift(drift, scale, element)
}

fn check_drift(drift: f64, scale: f64, element: &str) -> Result<()> {
    if drift > MARGINAL_TOL * scale.max(1.0) {
        error!(element, drift, "quasi-probability marginals drifted");
        return Err(QuasiError::MarginalDrift {
            element: element.to_string(),
            drift,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates;
    use crate::operators::StateLabel;

    fn wigner_gamma(ps: &PhaseSpace) -> CMat {
        ps.x_to_gamma(&ps.wigner_params())
    }

    #[test]
    fn kernels_are_dual() {
        for d in [2, 3] {
            let ps = PhaseSpace::get(d).unwrap();
            let gamma = ps.x_to_gamma(&[0.7, 0.1, -0.2, 0.05, 0.1, 0.2, 0.0, 0.3][..ps.n_params()]);
            let k = ps.kernel(&gamma).unwrap();
            for x in 0..ps.points() {
                for y in 0..ps.points() {
                    let t = k.f[x].trace_product(&k.g[y]);
                    let expected = if x == y { d as f64 } else { 0.0 };
                    assert!((t - C64::new(expected, 0.0)).norm() < 1e-9, "d={} x={} y={}", d, x, y);
                }
            }
        }
    }

    #[test]
    fn gamma_is_hermitian_with_unit_trace() {
        let ps = PhaseSpace::get(3).unwrap();
        let g = ps.x_to_gamma(&[0.2, 0.3, -0.1, 0.4, 0.0, 0.5, -0.6, 0.7]);
        assert!(g.is_hermitian(1e-15));
        assert!((g.trace().re - 1.0).abs() < 1e-15);
    }

    #[test]
    fn wigner_gamma_is_self_dual() {
        for d in [2, 3] {
            let ps = PhaseSpace::get(d).unwrap();
            let g = wigner_gamma(ps);
            let k = ps.kernel(&g).unwrap();
            assert!(k.f[0].approx_eq(&g, 1e-12), "d = {}", d);
        }
    }

    #[test]
    fn basis_state_has_unit_negativity_in_wigner_frame() {
        for d in [2, 3] {
            let ps = PhaseSpace::get(d).unwrap();
            let rho = StateLabel::Basis(0).matrix(d).unwrap();
            let w = ps.w_state(&rho, &wigner_gamma(ps)).unwrap();
            assert!((w.sum() - 1.0).abs() < 1e-12);
            assert!((w.abs_sum() - 1.0).abs() < 1e-12, "d = {}", d);
        }
    }

    #[test]
    fn magic_state_is_negative() {
        let ps = PhaseSpace::get(3).unwrap();
        let rho = StateLabel::Magic.matrix(3).unwrap();
        assert!(ps.neg_state(&rho, &wigner_gamma(ps)).unwrap() > 1.0 + 1e-6);
    }

    #[test]
    fn gate_rows_sum_to_one() {
        let ps = PhaseSpace::get(2).unwrap();
        let gin = ps.x_to_gamma(&[0.8, 0.3, 0.1]);
        let gout = ps.x_to_gamma(&[0.6, -0.2, 0.4]);
        let w = ps
            .w_gate(&gates::sum_gate(2), &[&gin, &gin], &[&gout, &gout])
            .unwrap();
        assert_eq!(w.len(), 256);
        for s in w.row_sums(2) {
            assert!((s - 1.0).abs() < 1e-9);
        }
        check_gate_marginals(&w, 2, "cnot").unwrap();
    }

    #[test]
    fn singular_gamma_is_reported() {
        let ps = PhaseSpace::get(2).unwrap();
        // tr[Z Gamma] = 0
        let g = ps.x_to_gamma(&[0.5, 0.5, 0.5]);
        assert!(matches!(ps.kernel(&g), Err(QuasiError::SingularKernel { .. })));
    }

    #[test]
    fn four_wire_gate_is_rejected() {
        let ps = PhaseSpace::get(2).unwrap();
        let g = wigner_gamma(ps);
        let frames = [&g, &g, &g, &g];
        assert!(matches!(
            ps.w_gate(&CMat::identity(16), &frames, &frames),
            Err(QuasiError::UnsupportedArity(4))
        ));
    }

    #[test]
    fn leg_digits_are_most_significant_first() {
        assert_eq!(leg_digits(6, 4, 2), vec![1, 2]);
    }
}
