//! Closed registry of state, gate and measurement-effect labels.
//!
//! Labels are parsed once when a circuit is loaded; an unknown label, or one
//! that has no meaning in the requested dimension, fails there rather than
//! deep inside a sampling loop.

use crate::error::{QuasiError, Result};
use crate::gates;
use std::fmt;
use std::str::FromStr;
use tn::{CMat, C64};

fn check_dim(dim: usize) -> Result<()> {
    match dim {
        2 | 3 => Ok(()),
        d => Err(QuasiError::UnsupportedDimension(d)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateLabel {
    /// Computational basis state |j>.
    Basis(usize),
    Plus,
    Minus,
    /// T|+>, the magic state.
    Magic,
    /// S|+>
    Phase,
}

impl StateLabel {
    pub fn ket(self, dim: usize) -> Result<Vec<C64>> {
        check_dim(dim)?;
        let plus: Vec<C64> = vec![C64::new(1.0 / (dim as f64).sqrt(), 0.0); dim];
        match self {
            StateLabel::Basis(j) if j < dim => Ok(gates::basis(dim, j)),
            StateLabel::Basis(j) => Err(QuasiError::UnknownLabel {
                kind: "state",
                label: j.to_string(),
                dim,
            }),
            StateLabel::Plus => Ok(plus),
            StateLabel::Minus => Ok(gates::apply(&gates::fourier(dim), &gates::basis(dim, 1))),
            StateLabel::Magic => Ok(gates::apply(&gates::t_gate(dim), &plus)),
            StateLabel::Phase => Ok(gates::apply(&gates::phase_s(dim), &plus)),
        }
    }

    /// Density matrix |psi><psi|.
    pub fn matrix(self, dim: usize) -> Result<CMat> {
        Ok(CMat::outer(&self.ket(dim)?))
    }
}

impl FromStr for StateLabel {
    type Err = QuasiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "0" => Ok(StateLabel::Basis(0)),
            "1" => Ok(StateLabel::Basis(1)),
            "2" => Ok(StateLabel::Basis(2)),
            "+" => Ok(StateLabel::Plus),
            "-" => Ok(StateLabel::Minus),
            "T" => Ok(StateLabel::Magic),
            "S" => Ok(StateLabel::Phase),
            other => Err(QuasiError::UnknownLabel {
                kind: "state",
                label: other.to_string(),
                dim: 0,
            }),
        }
    }
}

/// Measurement effect: a state projector, or `/` for tracing the wire out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectLabel {
    Project(StateLabel),
    Trace,
}

impl EffectLabel {
    pub fn matrix(self, dim: usize) -> Result<CMat> {
        check_dim(dim)?;
        match self {
            EffectLabel::Project(s) => s.matrix(dim),
            EffectLabel::Trace => Ok(CMat::identity(dim)),
        }
    }
}

impl FromStr for EffectLabel {
    type Err = QuasiError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "/" {
            return Ok(EffectLabel::Trace);
        }
        s.parse::<StateLabel>()
            .map(EffectLabel::Project)
            .map_err(|_| QuasiError::UnknownLabel {
                kind: "effect",
                label: s.to_string(),
                dim: 0,
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateLabel {
    Identity,
    X,
    Z,
    H,
    S,
    Sdg,
    T,
    Tdg,
    /// CNOT / SUM, control first.
    CPlus,
    CZ,
    CCZ,
    Toffoli,
}

impl GateLabel {
    pub fn wires(self) -> usize {
        match self {
            GateLabel::CPlus | GateLabel::CZ => 2,
            GateLabel::CCZ | GateLabel::Toffoli => 3,
            _ => 1,
        }
    }

    /// Single-wire Clifford gates: the output Gamma of such a gate is fixed to
    /// `U Gamma_in U^dag`, which makes its quasi-probability a permutation.
    pub fn is_covariant(self) -> bool {
        matches!(
            self,
            GateLabel::Identity
                | GateLabel::X
                | GateLabel::Z
                | GateLabel::H
                | GateLabel::S
                | GateLabel::Sdg
        )
    }

    pub fn matrix(self, dim: usize) -> Result<CMat> {
        check_dim(dim)?;
        let m = match self {
            GateLabel::Identity => CMat::identity(dim),
            GateLabel::X => gates::shift(dim),
            GateLabel::Z => gates::clock(dim),
            GateLabel::H => gates::fourier(dim),
            GateLabel::S => gates::phase_s(dim),
            GateLabel::Sdg => gates::phase_s(dim).dagger(),
            GateLabel::T => gates::t_gate(dim),
            GateLabel::Tdg => gates::t_gate(dim).dagger(),
            GateLabel::CPlus => gates::sum_gate(dim),
            GateLabel::CZ => gates::controlled_z(dim),
            GateLabel::CCZ => gates::controlled_cz(dim),
            GateLabel::Toffoli => gates::toffoli(dim),
        };
        Ok(m)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GateLabel::Identity => "1",
            GateLabel::X => "X",
            GateLabel::Z => "Z",
            GateLabel::H => "H",
            GateLabel::S => "S",
            GateLabel::Sdg => "s",
            GateLabel::T => "T",
            GateLabel::Tdg => "t",
            GateLabel::CPlus => "C+",
            GateLabel::CZ => "CZ",
            GateLabel::CCZ => "CCZ",
            GateLabel::Toffoli => "TOF",
        }
    }
}

impl fmt::Display for GateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateLabel {
    type Err = QuasiError;

    fn from_str(s: &str) -> Result<Self> {
        let g = match s {
            "1" => GateLabel::Identity,
            "X" => GateLabel::X,
            "Z" => GateLabel::Z,
            "H" => GateLabel::H,
            "S" => GateLabel::S,
            "s" => GateLabel::Sdg,
            "T" => GateLabel::T,
            "t" => GateLabel::Tdg,
            "C+" => GateLabel::CPlus,
            "CZ" => GateLabel::CZ,
            "CCZ" => GateLabel::CCZ,
            "TOF" => GateLabel::Toffoli,
            other => {
                return Err(QuasiError::UnknownLabel {
                    kind: "gate",
                    label: other.to_string(),
                    dim: 0,
                })
            }
        };
        Ok(g)
    }
}

/// Identity effect check used when rendering circuits.
pub fn is_trace_effect(e: &CMat) -> bool {
    e.approx_eq(&CMat::identity(e.dim()), 1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_display() {
        for s in ["1", "X", "Z", "H", "S", "s", "T", "t", "C+", "CZ", "CCZ", "TOF"] {
            let g: GateLabel = s.parse().unwrap();
            assert_eq!(g.to_string(), s);
        }
    }

    #[test]
    fn unknown_gate_label_fails_fast() {
        assert!(matches!(
            "SWAP".parse::<GateLabel>(),
            Err(QuasiError::UnknownLabel { kind: "gate", .. })
        ));
    }

    #[test]
    fn qutrit_only_state_rejected_for_qubits() {
        let s: StateLabel = "2".parse().unwrap();
        assert!(s.matrix(2).is_err());
        assert!(s.matrix(3).is_ok());
    }

    #[test]
    fn states_are_normalised() {
        for d in [2, 3] {
            for s in ["0", "1", "+", "-", "T", "S"] {
                let rho = s.parse::<StateLabel>().unwrap().matrix(d).unwrap();
                assert!((rho.trace().re - 1.0).abs() < 1e-12, "{} d={}", s, d);
            }
        }
    }
}
