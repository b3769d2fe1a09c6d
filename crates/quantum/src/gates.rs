//! Qudit gate and state matrices for local dimension `d`.
//!
//! For `d = 2` these are the usual qubit gates; for `d = 3` the generalised
//! Pauli (shift/clock), Fourier and SUM gates of the qutrit Clifford group
//! plus the qutrit T gate.

use std::f64::consts::PI;
use tn::{CMat, C64, ONE, ZERO};

/// exp(2 pi i / d)
pub fn omega(d: usize) -> C64 {
    C64::from_polar(1.0, 2.0 * PI / d as f64)
}

/// Shift X|j> = |j+1 mod d>.
pub fn shift(d: usize) -> CMat {
    CMat::from_fn(d, |i, j| if i == (j + 1) % d { ONE } else { ZERO })
}

/// Clock Z|j> = omega^j |j>.
pub fn clock(d: usize) -> CMat {
    let w = omega(d);
    CMat::from_fn(d, |i, j| if i == j { w.powu(i as u32) } else { ZERO })
}

/// Discrete Fourier transform; the Hadamard gate for d = 2.
pub fn fourier(d: usize) -> CMat {
    let w = omega(d);
    let s = 1.0 / (d as f64).sqrt();
    CMat::from_fn(d, |i, j| w.powu((i * j) as u32) * s)
}

/// Clifford phase gate: diag(1, i) for qubits, diag(1, 1, omega) for qutrits.
pub fn phase_s(d: usize) -> CMat {
    let w = omega(d);
    let entries: Vec<C64> = (0..d)
        .map(|j| {
            if d == 2 {
                C64::new(0.0, 1.0).powu(j as u32)
            } else {
                w.powu((j * j.saturating_sub(1) / 2) as u32)
            }
        })
        .collect();
    CMat::diag(&entries)
}

/// Non-Clifford T gate: diag(1, e^{i pi/4}) for qubits,
/// diag(1, zeta, zeta^8) with zeta = e^{2 pi i/9} for qutrits.
pub fn t_gate(d: usize) -> CMat {
    if d == 2 {
        return CMat::diag(&[ONE, C64::from_polar(1.0, PI / 4.0)]);
    }
    let zeta = C64::from_polar(1.0, 2.0 * PI / 9.0);
    let mut entries = vec![ONE; d];
    entries[1] = zeta;
    entries[2] = zeta.powu(8);
    CMat::diag(&entries)
}

/// |a, b> -> |a, b + a>; CNOT for qubits.
pub fn sum_gate(d: usize) -> CMat {
    permutation(d, 2, |digits| vec![digits[0], (digits[1] + digits[0]) % d])
}

/// |a, b> -> omega^{ab} |a, b>.
pub fn controlled_z(d: usize) -> CMat {
    let w = omega(d);
    phase_table(d, 2, |digits| w.powu(((digits[0] * digits[1]) % d) as u32))
}

/// |a, b, c> -> omega^{abc} |a, b, c>.
pub fn controlled_cz(d: usize) -> CMat {
    let w = omega(d);
    phase_table(d, 3, |digits| {
        w.powu(((digits[0] * digits[1] * digits[2]) % d) as u32)
    })
}

/// |a, b, c> -> |a, b, c + ab>; the Toffoli gate for qubits.
pub fn toffoli(d: usize) -> CMat {
    permutation(d, 3, |digits| {
        vec![digits[0], digits[1], (digits[2] + digits[0] * digits[1]) % d]
    })
}

/// Computational basis ket |j>.
pub fn basis(d: usize, j: usize) -> Vec<C64> {
    (0..d).map(|i| if i == j { ONE } else { ZERO }).collect()
}

pub fn apply(u: &CMat, psi: &[C64]) -> Vec<C64> {
    (0..u.dim())
        .map(|i| (0..u.dim()).map(|j| u.get(i, j) * psi[j]).sum())
        .collect()
}

fn digits_of(mut index: usize, d: usize, k: usize) -> Vec<usize> {
    let mut digits = vec![0; k];
    for slot in digits.iter_mut().rev() {
        *slot = index % d;
        index /= d;
    }
    digits
}

fn index_of(digits: &[usize], d: usize) -> usize {
    digits.iter().fold(0, |acc, &x| acc * d + x)
}

fn permutation(d: usize, k: usize, map: impl Fn(&[usize]) -> Vec<usize>) -> CMat {
    let n = d.pow(k as u32);
    let mut m = CMat::zeros(n);
    for col in 0..n {
        let row = index_of(&map(&digits_of(col, d, k)), d);
        m.set(row, col, ONE);
    }
    m
}

fn phase_table(d: usize, k: usize, phase: impl Fn(&[usize]) -> C64) -> CMat {
    let n = d.pow(k as u32);
    let entries: Vec<C64> = (0..n).map(|i| phase(&digits_of(i, d, k))).collect();
    CMat::diag(&entries)
}
