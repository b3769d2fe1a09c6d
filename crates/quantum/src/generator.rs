//! Random and benchmark circuits.

use crate::circuit::{Circuit, Gate};
use crate::error::{QuasiError, Result};
use crate::operators::{EffectLabel, StateLabel};
use rng::ONDRng;
use tn::{kron_all, CMat, C64};

/// Haar-random n x n unitary: QR of a complex Gaussian matrix with the
/// phases of R's diagonal moved into Q.
pub fn haar_unitary(n: usize, rng: &mut ONDRng) -> CMat {
    let mut z = CMat::zeros(n);
    for i in 0..n {
        for j in 0..n {
            let re = rng.next_gaussian(b"haar-re");
            let im = rng.next_gaussian(b"haar-im");
            z.set(i, j, C64::new(re, im));
        }
    }
    z.unitary_from_qr()
}

/// How gate wires are chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IndexMethod {
    /// `width` distinct wires drawn uniformly per gate.
    #[default]
    Random,
    /// Brick-wall of neighbouring pairs: even pairs, then odd pairs.
    Canonical,
    /// Neighbouring pairs sliding down the register and wrapping around.
    Chain,
}

/// Wire lists for `length` gates on `n_wires` wires. `Canonical` and
/// `Chain` always produce pairs.
pub fn index_list(
    length: usize,
    n_wires: usize,
    width: usize,
    method: IndexMethod,
    rng: &mut ONDRng,
) -> Result<Vec<Vec<usize>>> {
    let needed = match method {
        IndexMethod::Random => width,
        IndexMethod::Canonical | IndexMethod::Chain => 2,
    };
    if needed == 0 || needed > n_wires {
        return Err(QuasiError::LengthMismatch {
            what: "wires available for a gate",
            expected: needed,
            got: n_wires,
        });
    }

    let mut out = Vec::with_capacity(length);
    match method {
        IndexMethod::Random => {
            for _ in 0..length {
                let mut pool: Vec<usize> = (0..n_wires).collect();
                for i in 0..width {
                    let j = i + rng.next_below(n_wires - i, b"wires");
                    pool.swap(i, j);
                }
                pool.truncate(width);
                out.push(pool);
            }
        }
        IndexMethod::Canonical => {
            let mut q = 0;
            for _ in 0..length {
                out.push(vec![q, q + 1]);
                q += 2;
                if q + 1 >= n_wires {
                    // restart on the other parity
                    let even = n_wires % 2 == 0;
                    q = match (q == n_wires, even) {
                        (true, true) | (false, false) => 1,
                        _ => 0,
                    };
                    if q + 1 >= n_wires {
                        q = 0;
                    }
                }
            }
        }
        IndexMethod::Chain => {
            for i in 0..length {
                let q = i % (n_wires - 1);
                out.push(vec![q, q + 1]);
            }
        }
    }
    Ok(out)
}

/// Parameters of a random circuit.
#[derive(Clone, Debug)]
pub struct RandomCircuit {
    pub wires: usize,
    pub gates: usize,
    /// Wires per gate.
    pub width: usize,
    pub dim: usize,
    /// One state label per wire; random `0`/`1` when `None`.
    pub states: Option<String>,
    /// Leading wires projected on `0`; the rest are traced out.
    pub measured: usize,
    pub method: IndexMethod,
}

impl RandomCircuit {
    pub fn new(wires: usize, gates: usize, width: usize) -> Self {
        Self {
            wires,
            gates,
            width,
            dim: 2,
            states: None,
            measured: 1,
            method: IndexMethod::Random,
        }
    }

    /// Three quarters of the gates are Haar-random on all their wires, the
    /// rest are products of single-wire Haar unitaries.
    pub fn generate(&self, rng: &mut ONDRng) -> Result<Circuit> {
        let d = self.dim;
        let labels: String = match &self.states {
            Some(s) => {
                if s.chars().count() != self.wires {
                    return Err(QuasiError::LengthMismatch {
                        what: "state labels",
                        expected: self.wires,
                        got: s.chars().count(),
                    });
                }
                s.clone()
            }
            None => (0..self.wires)
                .map(|_| if rng.next_below(2, b"state") == 0 { '0' } else { '1' })
                .collect(),
        };
        let states = labels
            .chars()
            .map(|c| c.to_string().parse::<StateLabel>()?.matrix(d))
            .collect::<Result<Vec<_>>>()?;

        let gates = index_list(self.gates, self.wires, self.width, self.method, rng)?
            .into_iter()
            .map(|wires| {
                let k = wires.len();
                let u = if rng.next_f64(b"coin") < 0.75 {
                    haar_unitary(d.pow(k as u32), rng)
                } else {
                    let singles: Vec<CMat> = (0..k).map(|_| haar_unitary(d, rng)).collect();
                    kron_all(&singles.iter().collect::<Vec<_>>())
                };
                Gate::new(wires, u)
            })
            .collect();

        let measurements = (0..self.wires)
            .map(|w| {
                let e = if w < self.measured {
                    EffectLabel::Project(StateLabel::Basis(0))
                } else {
                    EffectLabel::Trace
                };
                e.matrix(d)
            })
            .collect::<Result<Vec<_>>>()?;

        Circuit::new(d, states, gates, measurements)
    }
}

/// Three qubits, `blocks` repetitions of Haar gates on (0,1) then (1,2);
/// the first two wires are projected on |0>.
pub fn haar_two_gate_circuit(blocks: usize, rng: &mut ONDRng) -> Result<Circuit> {
    let zero = StateLabel::Basis(0).matrix(2)?;
    let mut gates = Vec::with_capacity(2 * blocks);
    for _ in 0..blocks {
        for wires in [vec![0, 1], vec![1, 2]] {
            gates.push(Gate::new(wires, haar_unitary(4, rng)));
        }
    }
    Circuit::new(
        2,
        vec![zero.clone(), zero.clone(), zero.clone()],
        gates,
        vec![zero.clone(), zero, CMat::identity(2)],
    )
}

/// Three-qubit Bernstein-Vazirani instance with a Clifford+T oracle.
pub fn bernstein_vazirani() -> Result<Circuit> {
    Circuit::from_labels(
        2,
        "001",
        &[
            (&[0], "H"),
            (&[2], "H"),
            (&[2], "H"),
            (&[1, 2], "C+"),
            (&[2], "t"),
            (&[0, 2], "C+"),
            (&[2], "T"),
            (&[1, 2], "C+"),
            (&[2], "t"),
            (&[0, 2], "C+"),
            (&[1], "T"),
            (&[2], "T"),
            (&[0, 1], "C+"),
            (&[2], "H"),
            (&[0], "T"),
            (&[1], "t"),
            (&[0, 1], "C+"),
            (&[0], "H"),
        ],
        "0//",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haar_unitaries_are_unitary() {
        let mut rng = ONDRng::new(b"haar");
        for n in [2, 3, 4, 9] {
            assert!(haar_unitary(n, &mut rng).is_unitary(1e-10), "n = {}", n);
        }
    }

    #[test]
    fn random_indices_are_distinct() {
        let mut rng = ONDRng::new(b"idx");
        for wires in index_list(50, 5, 3, IndexMethod::Random, &mut rng).unwrap() {
            assert_eq!(wires.len(), 3);
            assert!(wires[0] != wires[1] && wires[1] != wires[2] && wires[0] != wires[2]);
            assert!(wires.iter().all(|&w| w < 5));
        }
    }

    #[test]
    fn canonical_indices_alternate_parity() {
        let mut rng = ONDRng::new(b"idx");
        let idx = index_list(4, 4, 2, IndexMethod::Canonical, &mut rng).unwrap();
        assert_eq!(idx, vec![vec![0, 1], vec![2, 3], vec![1, 2], vec![0, 1]]);
    }

    #[test]
    fn chain_wraps_around() {
        let mut rng = ONDRng::new(b"idx");
        let idx = index_list(4, 3, 2, IndexMethod::Chain, &mut rng).unwrap();
        assert_eq!(idx, vec![vec![0, 1], vec![1, 2], vec![0, 1], vec![1, 2]]);
    }

    #[test]
    fn random_circuit_has_requested_shape() {
        let mut rng = ONDRng::new(b"circ");
        let mut shape = RandomCircuit::new(4, 6, 2);
        shape.measured = 2;
        let c = shape.generate(&mut rng).unwrap();
        assert_eq!(c.n_wires(), 4);
        assert_eq!(c.gates().len(), 6);
        assert!(c.gates().iter().all(|g| g.matrix.is_unitary(1e-10)));
    }

    #[test]
    fn bernstein_vazirani_loads() {
        let c = bernstein_vazirani().unwrap();
        assert_eq!(c.gates().len(), 18);
    }
}
