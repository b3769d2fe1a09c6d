//! Circuit description: input states, a causal gate sequence with target
//! wires, and one measurement effect per wire.

use crate::error::{QuasiError, Result};
use crate::operators::{is_trace_effect, EffectLabel, GateLabel, StateLabel};
use tn::CMat;

/// Widest gate the phase-space contractions support.
pub const MAX_GATE_WIRES: usize = 3;

#[derive(Clone, Debug)]
pub struct Gate {
    pub wires: Vec<usize>,
    pub matrix: CMat,
    /// Registry label, when the gate came from one.
    pub label: Option<GateLabel>,
}

impl Gate {
    pub fn new(wires: Vec<usize>, matrix: CMat) -> Self {
        Self {
            wires,
            matrix,
            label: None,
        }
    }

    pub fn labelled(label: GateLabel, wires: Vec<usize>, dim: usize) -> Result<Self> {
        Ok(Self {
            wires,
            matrix: label.matrix(dim)?,
            label: Some(label),
        })
    }

    pub fn width(&self) -> usize {
        self.wires.len()
    }

    /// Whether the output Gamma is derived from the input by conjugation
    /// instead of being a free parameter.
    pub fn is_covariant(&self) -> bool {
        self.wires.len() == 1 && self.label.is_some_and(GateLabel::is_covariant)
    }
}

#[derive(Clone, Debug)]
pub struct Circuit {
    dim: usize,
    states: Vec<CMat>,
    gates: Vec<Gate>,
    measurements: Vec<CMat>,
}

impl Circuit {
    pub fn new(
        dim: usize,
        states: Vec<CMat>,
        gates: Vec<Gate>,
        measurements: Vec<CMat>,
    ) -> Result<Self> {
        if dim != 2 && dim != 3 {
            return Err(QuasiError::UnsupportedDimension(dim));
        }
        let n = states.len();
        if measurements.len() != n {
            return Err(QuasiError::LengthMismatch {
                what: "measurement count",
                expected: n,
                got: measurements.len(),
            });
        }
        for (i, s) in states.iter().enumerate() {
            check_shape("state", i, dim, s)?;
        }
        for (i, e) in measurements.iter().enumerate() {
            check_shape("measurement", i, dim, e)?;
        }
        for (g, gate) in gates.iter().enumerate() {
            validate_gate(g, gate, dim, n)?;
        }
        Ok(Self {
            dim,
            states,
            gates,
            measurements,
        })
    }

    /// Builds a circuit from registry labels, one character per wire for
    /// states and measurements, e.g. `("001", &[(&[0], "H")], "0//")`.
    pub fn from_labels(
        dim: usize,
        states: &str,
        gates: &[(&[usize], &str)],
        measurements: &str,
    ) -> Result<Self> {
        let with_dim = |e: QuasiError| match e {
            QuasiError::UnknownLabel { kind, label, .. } => {
                QuasiError::UnknownLabel { kind, label, dim }
            }
            other => other,
        };

        let states = states
            .chars()
            .map(|c| {
                c.to_string()
                    .parse::<StateLabel>()
                    .and_then(|s| s.matrix(dim))
                    .map_err(with_dim)
            })
            .collect::<Result<Vec<_>>>()?;
        let measurements = measurements
            .chars()
            .map(|c| {
                c.to_string()
                    .parse::<EffectLabel>()
                    .and_then(|e| e.matrix(dim))
                    .map_err(with_dim)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut built = Vec::with_capacity(gates.len());
        for (g, (wires, label)) in gates.iter().enumerate() {
            let label: GateLabel = label.parse().map_err(with_dim)?;
            if label.wires() != wires.len() {
                return Err(QuasiError::LengthMismatch {
                    what: "gate label arity",
                    expected: label.wires(),
                    got: wires.len(),
                });
            }
            let gate = Gate::labelled(label, wires.to_vec(), dim).map_err(with_dim)?;
            validate_gate(g, &gate, dim, states.len())?;
            built.push(gate);
        }

        Self::new(dim, states, built, measurements)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn n_wires(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> &[CMat] {
        &self.states
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn measurements(&self) -> &[CMat] {
        &self.measurements
    }

    pub fn index_list(&self) -> Vec<Vec<usize>> {
        self.gates.iter().map(|g| g.wires.clone()).collect()
    }

    /// Adjoint circuit: measurements become inputs and vice versa, gates are
    /// inverted and applied in reverse order. tr[E U rho U^dag] is preserved.
    pub fn reversed(&self) -> Circuit {
        let gates = self
            .gates
            .iter()
            .rev()
            .map(|g| Gate::new(g.wires.clone(), g.matrix.dagger()))
            .collect();
        Circuit {
            dim: self.dim,
            states: self.measurements.clone(),
            gates,
            measurements: self.states.clone(),
        }
    }

    /// ASCII wire diagram. Single-wire gates are not drawn.
    pub fn connectivity(&self) -> String {
        let n = self.n_wires();
        let mut rows: Vec<String> = vec!["> ".to_string(); n];
        for gate in &self.gates {
            let w = &gate.wires;
            if w.len() == 1 {
                continue;
            }
            for (i, row) in rows.iter_mut().enumerate() {
                if !w.contains(&i) {
                    row.push('-');
                }
            }
            let marks: &[char] = if w.len() == 3 {
                &['O', '|', '+']
            } else {
                &['c', 'z']
            };
            for (&wire, &mark) in w.iter().zip(marks) {
                rows[wire].push(mark);
            }
        }
        for (row, e) in rows.iter_mut().zip(&self.measurements) {
            row.push_str(if is_trace_effect(e) { " /" } else { " D" });
        }
        rows.join("\n")
    }
}

fn check_shape(what: &'static str, index: usize, dim: usize, m: &CMat) -> Result<()> {
    if m.dim() != dim {
        return Err(QuasiError::OperatorShape {
            what,
            index,
            expected: dim,
            got: m.dim(),
        });
    }
    Ok(())
}

fn validate_gate(g: usize, gate: &Gate, dim: usize, n_wires: usize) -> Result<()> {
    let width = gate.wires.len();
    if width == 0 || width > MAX_GATE_WIRES {
        return Err(QuasiError::GateTooWide { gate: g, width });
    }
    for (i, &w) in gate.wires.iter().enumerate() {
        if w >= n_wires {
            return Err(QuasiError::WireOutOfRange {
                gate: g,
                wire: w,
                wires: n_wires,
            });
        }
        if gate.wires[..i].contains(&w) {
            return Err(QuasiError::DuplicateWire { gate: g, wire: w });
        }
    }
    check_shape("gate", g, dim.pow(width as u32), &gate.matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_wire() {
        let err = Circuit::from_labels(2, "00", &[(&[0, 2], "C+")], "00").unwrap_err();
        assert!(matches!(err, QuasiError::WireOutOfRange { wire: 2, .. }));
    }

    #[test]
    fn rejects_four_wire_gate() {
        let gate = Gate::new(vec![0, 1, 2, 3], CMat::identity(16));
        let states = vec![CMat::identity(2); 4];
        let err = Circuit::new(2, states.clone(), vec![gate], states).unwrap_err();
        assert!(matches!(err, QuasiError::GateTooWide { width: 4, .. }));
    }

    #[test]
    fn rejects_mismatched_measurements() {
        let err = Circuit::from_labels(2, "000", &[], "0/").unwrap_err();
        assert!(matches!(err, QuasiError::LengthMismatch { .. }));
    }

    #[test]
    fn unknown_label_reports_dimension() {
        let err = Circuit::from_labels(2, "0", &[(&[0], "Q")], "0").unwrap_err();
        assert!(matches!(err, QuasiError::UnknownLabel { dim: 2, .. }));
    }

    #[test]
    fn connectivity_draws_controls() {
        let c = Circuit::from_labels(2, "000", &[(&[0], "H"), (&[0, 2], "C+")], "0//").unwrap();
        assert_eq!(c.connectivity(), "> c D\n> - /\n> z /");
    }
}
