use faer::Mat;
use num_complex::Complex64;

pub type C64 = Complex64;

pub const ZERO: C64 = C64::new(0.0, 0.0);
pub const ONE: C64 = C64::new(1.0, 0.0);

/// Dense square complex matrix, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct CMat {
    n: usize,
    data: Vec<C64>,
}

impl CMat {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![ZERO; n * n],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m.set(i, i, ONE);
        }
        m
    }

    pub fn from_fn(n: usize, f: impl Fn(usize, usize) -> C64) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        Self { n, data }
    }

    pub fn diag(entries: &[C64]) -> Self {
        let mut m = Self::zeros(entries.len());
        for (i, &v) in entries.iter().enumerate() {
            m.set(i, i, v);
        }
        m
    }

    /// Projector |psi><psi| (no normalisation applied).
    pub fn outer(psi: &[C64]) -> Self {
        Self::from_fn(psi.len(), |i, j| psi[i] * psi[j].conj())
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> C64 {
        self.data[i * self.n + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: C64) {
        self.data[i * self.n + j] = v;
    }

    pub fn as_slice(&self) -> &[C64] {
        &self.data
    }

    pub fn matmul(&self, other: &CMat) -> CMat {
        assert_eq!(self.n, other.n, "matmul dimension mismatch");
        let n = self.n;
        let mut out = CMat::zeros(n);
        for i in 0..n {
            for k in 0..n {
                let a = self.data[i * n + k];
                if a == ZERO {
                    continue;
                }
                for j in 0..n {
                    out.data[i * n + j] += a * other.data[k * n + j];
                }
            }
        }
        out
    }

    pub fn dagger(&self) -> CMat {
        CMat::from_fn(self.n, |i, j| self.get(j, i).conj())
    }

    pub fn conj(&self) -> CMat {
        CMat {
            n: self.n,
            data: self.data.iter().map(|v| v.conj()).collect(),
        }
    }

    pub fn scale(&self, c: C64) -> CMat {
        CMat {
            n: self.n,
            data: self.data.iter().map(|v| v * c).collect(),
        }
    }

    pub fn trace(&self) -> C64 {
        (0..self.n).map(|i| self.get(i, i)).sum()
    }

    /// tr[A B] without forming the product.
    pub fn trace_product(&self, other: &CMat) -> C64 {
        assert_eq!(self.n, other.n, "trace_product dimension mismatch");
        let n = self.n;
        let mut acc = ZERO;
        for i in 0..n {
            for k in 0..n {
                acc += self.data[i * n + k] * other.data[k * n + i];
            }
        }
        acc
    }

    /// U A U^dag
    pub fn conjugate_by(&self, u: &CMat) -> CMat {
        u.matmul(self).matmul(&u.dagger())
    }

    pub fn kron(&self, other: &CMat) -> CMat {
        let (a, b) = (self.n, other.n);
        let mut out = CMat::zeros(a * b);
        for i in 0..a {
            for j in 0..a {
                let s = self.get(i, j);
                if s == ZERO {
                    continue;
                }
                for k in 0..b {
                    for l in 0..b {
                        out.set(i * b + k, j * b + l, s * other.get(k, l));
                    }
                }
            }
        }
        out
    }

    pub fn power(&self, k: usize) -> CMat {
        let mut out = CMat::identity(self.n);
        for _ in 0..k {
            out = out.matmul(self);
        }
        out
    }

    /// Lifts an operator on `positions` (in that order) of a `k`-wire register
    /// of local dimension `d` to the whole register; other wires see identity.
    pub fn embed(&self, d: usize, positions: &[usize], k: usize) -> CMat {
        let sub = positions.len();
        assert_eq!(self.n, d.pow(sub as u32), "embed: operator does not match positions");
        let total = d.pow(k as u32);
        let mut out = CMat::zeros(total);

        let mut digits = vec![0usize; k];
        for row in 0..total {
            split_digits(row, d, &mut digits);
            let sub_row = gather(&digits, positions, d);
            for sub_col in 0..self.n {
                let v = self.get(sub_row, sub_col);
                if v == ZERO {
                    continue;
                }
                let mut col_digits = digits.clone();
                scatter(sub_col, positions, d, &mut col_digits);
                out.set(row, join_digits(&col_digits, d), v);
            }
        }
        out
    }

    pub fn max_abs_diff(&self, other: &CMat) -> f64 {
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max)
    }

    pub fn approx_eq(&self, other: &CMat, tol: f64) -> bool {
        self.n == other.n && self.max_abs_diff(other) < tol
    }

    pub fn is_hermitian(&self, tol: f64) -> bool {
        self.approx_eq(&self.dagger(), tol)
    }

    pub fn is_unitary(&self, tol: f64) -> bool {
        self.matmul(&self.dagger()).approx_eq(&CMat::identity(self.n), tol)
    }

    /// Unitary factor of a QR decomposition with the phases of R's diagonal
    /// folded back in, so a Gaussian input yields a Haar-distributed unitary.
    pub fn unitary_from_qr(&self) -> CMat {
        let n = self.n;
        let z = Mat::<C64>::from_fn(n, n, |i, j| self.get(i, j));
        let qr = z.qr();
        let q = qr.compute_thin_q();
        let r = qr.compute_thin_r();

        let phases: Vec<C64> = (0..n)
            .map(|i| {
                let rii = r.read(i, i);
                let norm = rii.norm();
                if norm == 0.0 { ONE } else { rii / norm }
            })
            .collect();
        CMat::from_fn(n, |i, j| q.read(i, j) * phases[j])
    }
}

impl std::ops::Add for &CMat {
    type Output = CMat;

    fn add(self, other: &CMat) -> CMat {
        assert_eq!(self.n, other.n);
        CMat {
            n: self.n,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect(),
        }
    }
}

/// Kronecker product of a non-empty list, left to right.
pub fn kron_all(mats: &[&CMat]) -> CMat {
    let mut out = CMat::identity(1);
    for m in mats {
        out = out.kron(m);
    }
    out
}

fn split_digits(mut index: usize, d: usize, digits: &mut [usize]) {
    for slot in digits.iter_mut().rev() {
        *slot = index % d;
        index /= d;
    }
}

fn join_digits(digits: &[usize], d: usize) -> usize {
    digits.iter().fold(0, |acc, &x| acc * d + x)
}

fn gather(digits: &[usize], positions: &[usize], d: usize) -> usize {
    positions.iter().fold(0, |acc, &p| acc * d + digits[p])
}

fn scatter(mut index: usize, positions: &[usize], d: usize, digits: &mut [usize]) {
    for &p in positions.iter().rev() {
        digits[p] = index % d;
        index /= d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> CMat {
        CMat::from_fn(2, |i, j| if i != j { ONE } else { ZERO })
    }

    #[test]
    fn kron_matches_embed_on_first_wire() {
        let k = x().kron(&CMat::identity(2));
        let e = x().embed(2, &[0], 2);
        assert!(k.approx_eq(&e, 1e-15));
    }

    #[test]
    fn embed_reversed_positions_swaps_wires() {
        // CNOT with control on wire 1, target on wire 0.
        let cnot = CMat::from_fn(4, |i, j| {
            let perm = [0, 1, 3, 2];
            if perm[i] == j { ONE } else { ZERO }
        });
        let e = cnot.embed(2, &[1, 0], 2);
        // |01> (wire0=0, wire1=1) -> |11>
        assert_eq!(e.get(3, 1), ONE);
        assert_eq!(e.get(1, 1), ZERO);
    }

    #[test]
    fn trace_product_matches_matmul() {
        let a = CMat::from_fn(3, |i, j| C64::new(i as f64, j as f64));
        let b = CMat::from_fn(3, |i, j| C64::new((i * j) as f64, 1.0));
        let direct = a.matmul(&b).trace();
        assert!((a.trace_product(&b) - direct).norm() < 1e-12);
    }
}
