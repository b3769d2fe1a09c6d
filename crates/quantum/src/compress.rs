//! Rewrites a circuit into a causal sequence of exactly-m-wire blocks.

use crate::circuit::{Circuit, Gate};
use crate::error::{QuasiError, Result};
use tn::CMat;
use tracing::debug;

struct OpenBlock {
    wires: Vec<usize>,
    unitary: CMat,
    /// Opened by an m-wire gate; only gates on a subset of its wires join.
    sealed: bool,
    /// The single untouched gate this block was opened with, if still so.
    origin: Option<Gate>,
}

impl OpenBlock {
    fn open(gate: &Gate, m: usize) -> Self {
        Self {
            wires: gate.wires.clone(),
            unitary: gate.matrix.clone(),
            sealed: gate.width() == m,
            origin: Some(gate.clone()),
        }
    }

    fn accepts(&self, gate: &Gate, m: usize) -> bool {
        let extra = gate.wires.iter().filter(|w| !self.wires.contains(w)).count();
        if self.sealed {
            extra == 0 && gate.width() < m
        } else if gate.width() == m {
            // the m-wire gate takes over a block that fits inside its wires
            self.wires.iter().all(|w| gate.wires.contains(w))
        } else {
            self.wires.len() + extra <= m
        }
    }

    fn absorb(&mut self, gate: &Gate, m: usize, d: usize) {
        for &w in &gate.wires {
            if !self.wires.contains(&w) {
                self.widen(w, d);
            }
        }
        let positions: Vec<usize> = gate
            .wires
            .iter()
            .map(|w| self.position(*w))
            .collect();
        let lifted = gate.matrix.embed(d, &positions, self.wires.len());
        self.unitary = lifted.matmul(&self.unitary);
        self.origin = None;
        if self.wires.len() == m {
            self.sealed = true;
        }
    }

    fn widen(&mut self, wire: usize, d: usize) {
        let old: Vec<usize> = (0..self.wires.len()).collect();
        self.wires.push(wire);
        self.unitary = self.unitary.embed(d, &old, self.wires.len());
    }

    fn position(&self, wire: usize) -> usize {
        self.wires
            .iter()
            .position(|&w| w == wire)
            .unwrap_or_else(|| unreachable!("wire {wire} was added to the block"))
    }

    /// Pads with idle wires up to `m` and sorts the wires ascending.
    fn seal(mut self, m: usize, n_wires: usize, d: usize) -> Gate {
        for w in 0..n_wires {
            if self.wires.len() == m {
                break;
            }
            if !self.wires.contains(&w) {
                self.widen(w, d);
                self.origin = None;
            }
        }

        let mut sorted = self.wires.clone();
        sorted.sort_unstable();
        if sorted != self.wires {
            let positions: Vec<usize> = self
                .wires
                .iter()
                .map(|w| sorted.binary_search(w).unwrap_or_else(|_| unreachable!()))
                .collect();
            self.unitary = self.unitary.embed(d, &positions, m);
            self.origin = None;
        }

        match self.origin {
            Some(gate) => gate,
            None => Gate::new(sorted, self.unitary),
        }
    }
}

impl Circuit {
    /// Groups the gate sequence into blocks of exactly `m` wires (2 or 3).
    ///
    /// An m-wire gate takes over the open block when that block's wires are
    /// among its own, and seals it; otherwise it opens a new block. Narrower
    /// gates join the open block when the combined wires still fit, or join a
    /// sealed block on a subset of its wires, otherwise they open a new one.
    /// Blocks are padded with idle wires and have ascending wire order, so
    /// compressing an already compressed circuit returns it unchanged.
    pub fn compress(&self, m: usize) -> Result<Circuit> {
        if !(2..=3).contains(&m) {
            return Err(QuasiError::UnsupportedBlockSize(m));
        }
        let n = self.n_wires();
        if n < m {
            return Err(QuasiError::BlockTooNarrow { wires: n, block: m });
        }
        let d = self.dim();

        let mut blocks = Vec::new();
        let mut open: Option<OpenBlock> = None;
        for (g, gate) in self.gates().iter().enumerate() {
            if gate.width() > m {
                return Err(QuasiError::GateWiderThanBlock {
                    gate: g,
                    width: gate.width(),
                    block: m,
                });
            }
            match open.as_mut() {
                Some(block) if block.accepts(gate, m) => block.absorb(gate, m, d),
                _ => {
                    if let Some(block) = open.take() {
                        blocks.push(block.seal(m, n, d));
                    }
                    open = Some(OpenBlock::open(gate, m));
                }
            }
        }
        if let Some(block) = open.take() {
            blocks.push(block.seal(m, n, d));
        }

        debug!(
            gates = self.gates().len(),
            blocks = blocks.len(),
            block_wires = m,
            "compressed circuit"
        );

        Circuit::new(
            d,
            self.states().to_vec(),
            blocks,
            self.measurements().to_vec(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_single_wire_gates_into_pair() {
        let c = Circuit::from_labels(
            2,
            "000",
            &[(&[0], "H"), (&[1], "T"), (&[0, 1], "C+"), (&[1], "H"), (&[2], "T")],
            "000",
        )
        .unwrap();
        let z = c.compress(2).unwrap();
        // [H0 T1 C+ H1] | [T2 padded with wire 0]
        assert_eq!(z.index_list(), vec![vec![0, 1], vec![0, 2]]);
    }

    #[test]
    fn wide_gate_absorbs_preceding_narrow_gates() {
        let c = Circuit::from_labels(2, "00", &[(&[0], "T"), (&[0, 1], "C+")], "00").unwrap();
        let z = c.compress(2).unwrap();
        assert_eq!(z.index_list(), vec![vec![0, 1]]);
        let t = c.gates()[0].matrix.embed(2, &[0], 2);
        let expected = c.gates()[1].matrix.matmul(&t);
        assert!(z.gates()[0].matrix.approx_eq(&expected, 1e-12));
    }

    #[test]
    fn wide_gate_does_not_absorb_block_on_other_wires() {
        let c = Circuit::from_labels(2, "000", &[(&[2], "T"), (&[0, 1], "C+")], "000").unwrap();
        let z = c.compress(2).unwrap();
        assert_eq!(z.index_list(), vec![vec![0, 2], vec![0, 1]]);
    }

    #[test]
    fn rejects_wide_gate_for_small_block() {
        let c = Circuit::from_labels(2, "000", &[(&[0, 1, 2], "TOF")], "000").unwrap();
        assert!(matches!(
            c.compress(2),
            Err(QuasiError::GateWiderThanBlock { width: 3, .. })
        ));
    }

    #[test]
    fn rejects_circuit_narrower_than_block() {
        let c = Circuit::from_labels(2, "0", &[(&[0], "H")], "0").unwrap();
        assert!(matches!(
            c.compress(2),
            Err(QuasiError::BlockTooNarrow { wires: 1, block: 2 })
        ));
    }

    #[test]
    fn unsorted_pair_is_reordered() {
        let c = Circuit::from_labels(2, "00", &[(&[1, 0], "C+")], "00").unwrap();
        let z = c.compress(2).unwrap();
        assert_eq!(z.index_list(), vec![vec![0, 1]]);
        // Control on wire 1: |01> -> |11>
        assert!((z.gates()[0].matrix.get(3, 1).re - 1.0).abs() < 1e-12);
    }
}
