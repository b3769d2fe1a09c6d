//! Exact outcome probability by density-matrix evolution, for checking
//! estimates on small circuits.

use crate::circuit::Circuit;
use tn::{kron_all, CMat, C64, ZERO};

/// p = tr[(E_1 x .. x E_N) U rho U^dag].
///
/// rho is stored as a vector over 2N virtual wires: ket wires 0..N, bra wires
/// N..2N. Gates act with U on the ket wires and with conj(U) on the bra wires.
pub fn exact_probability(circuit: &Circuit) -> f64 {
    let d = circuit.dim();
    let n = circuit.n_wires();
    let states: Vec<&CMat> = circuit.states().iter().collect();
    let mut rho = kron_all(&states).as_slice().to_vec();

    for gate in circuit.gates() {
        apply_on_wires(&mut rho, d, 2 * n, &gate.wires, &gate.matrix);
        let bra: Vec<usize> = gate.wires.iter().map(|w| w + n).collect();
        apply_on_wires(&mut rho, d, 2 * n, &bra, &gate.matrix.conj());
    }
    for (w, effect) in circuit.measurements().iter().enumerate() {
        apply_on_wires(&mut rho, d, 2 * n, &[w], effect);
    }

    let dim = d.pow(n as u32);
    (0..dim).map(|i| rho[i * dim + i]).sum::<C64>().re
}

/// Applies `op` to `wires` (first wire most significant) of a vector over
/// `total` wires of local dimension `d`.
fn apply_on_wires(v: &mut [C64], d: usize, total: usize, wires: &[usize], op: &CMat) {
    let k = wires.len();
    let sub = d.pow(k as u32);
    let stride = |w: usize| d.pow((total - 1 - w) as u32);
    let offsets: Vec<usize> = (0..sub)
        .map(|s| {
            let mut rest = s;
            let mut off = 0;
            for j in (0..k).rev() {
                off += (rest % d) * stride(wires[j]);
                rest /= d;
            }
            off
        })
        .collect();

    let mut local = vec![ZERO; sub];
    for base in 0..v.len() {
        if wires.iter().any(|&w| (base / stride(w)) % d != 0) {
            continue;
        }
        for (slot, &off) in local.iter_mut().zip(&offsets) {
            *slot = v[base + off];
        }
        for (r, &off) in offsets.iter().enumerate() {
            v[base + off] = (0..sub).map(|c| op.get(r, c) * local[c]).sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hadamard_gives_half() {
        let c = Circuit::from_labels(2, "0", &[(&[0], "H")], "0").unwrap();
        assert!((exact_probability(&c) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn bell_pair_marginals() {
        let c = Circuit::from_labels(2, "00", &[(&[0], "H"), (&[0, 1], "C+")], "11").unwrap();
        assert!((exact_probability(&c) - 0.5).abs() < 1e-12);
        let c = Circuit::from_labels(2, "00", &[(&[0], "H"), (&[0, 1], "C+")], "10").unwrap();
        assert!(exact_probability(&c).abs() < 1e-12);
    }

    #[test]
    fn reversed_control_order() {
        // control on wire 1, which starts in |1>
        let c = Circuit::from_labels(2, "01", &[(&[1, 0], "C+")], "1/").unwrap();
        assert!((exact_probability(&c) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn qutrit_fourier_is_uniform() {
        let c = Circuit::from_labels(3, "0", &[(&[0], "H")], "2").unwrap();
        assert!((exact_probability(&c) - 1.0 / 3.0).abs() < 1e-12);
    }
}
