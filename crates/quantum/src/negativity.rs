//! Assignment of frames (Gamma matrices) to the wires of a circuit, and the
//! log-negativity of the resulting quasi-probability representation.
//!
//! Every state opens a slot on its wire. Every gate closes the slots on its
//! input wires and opens one slot per output wire; for a covariant gate the
//! new slot is `U Gamma_in U^dag` and costs no parameters. Measurements read
//! the final slot of their wire, so one frame is shared between the last
//! element acting on a wire and the effect reading it.

use crate::circuit::Circuit;
use crate::error::{QuasiError, Result};
use crate::phase_space::PhaseSpace;
use tn::CMat;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotSource {
    /// Owns parameter block `b`.
    Free(usize),
    /// Conjugation of `source` by the covariant gate `gate`.
    Conjugated { source: usize, gate: usize },
}

/// Elements of a circuit, in the order their quasi-probabilities appear in
/// the product.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    State(usize),
    Gate(usize),
    Meas(usize),
}

#[derive(Clone, Debug)]
pub struct ParamLayout {
    slots: Vec<SlotSource>,
    n_free: usize,
    state_slots: Vec<usize>,
    gate_in: Vec<Vec<usize>>,
    gate_out: Vec<Vec<usize>>,
    meas_slots: Vec<usize>,
}

impl ParamLayout {
    pub fn new(circuit: &Circuit) -> Self {
        let mut slots = Vec::new();
        let mut n_free = 0;
        let mut fresh = |slots: &mut Vec<SlotSource>| {
            slots.push(SlotSource::Free(n_free));
            n_free += 1;
            slots.len() - 1
        };

        let mut current: Vec<usize> = (0..circuit.n_wires()).map(|_| fresh(&mut slots)).collect();
        let state_slots = current.clone();

        let mut gate_in = Vec::with_capacity(circuit.gates().len());
        let mut gate_out = Vec::with_capacity(circuit.gates().len());
        for (g, gate) in circuit.gates().iter().enumerate() {
            let inputs: Vec<usize> = gate.wires.iter().map(|&w| current[w]).collect();
            let outputs: Vec<usize> = if gate.is_covariant() {
                slots.push(SlotSource::Conjugated {
                    source: inputs[0],
                    gate: g,
                });
                vec![slots.len() - 1]
            } else {
                gate.wires.iter().map(|_| fresh(&mut slots)).collect()
            };
            for (&w, &s) in gate.wires.iter().zip(&outputs) {
                current[w] = s;
            }
            gate_in.push(inputs);
            gate_out.push(outputs);
        }

        Self {
            slots,
            n_free,
            state_slots,
            gate_in,
            gate_out,
            meas_slots: current,
        }
    }

    /// Number of independent Gamma matrices.
    pub fn n_free(&self) -> usize {
        self.n_free
    }

    pub fn n_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn source(&self, slot: usize) -> SlotSource {
        self.slots[slot]
    }

    pub fn state_slot(&self, wire: usize) -> usize {
        self.state_slots[wire]
    }

    pub fn gate_inputs(&self, gate: usize) -> &[usize] {
        &self.gate_in[gate]
    }

    pub fn gate_outputs(&self, gate: usize) -> &[usize] {
        &self.gate_out[gate]
    }

    pub fn meas_slot(&self, wire: usize) -> usize {
        self.meas_slots[wire]
    }

    /// Parameter block a slot ultimately depends on.
    pub fn root_block(&self, mut slot: usize) -> usize {
        loop {
            match self.slots[slot] {
                SlotSource::Free(b) => return b,
                SlotSource::Conjugated { source, .. } => slot = source,
            }
        }
    }

    /// Slots read by an element.
    pub fn element_slots(&self, element: Element) -> Vec<usize> {
        match element {
            Element::State(i) => vec![self.state_slots[i]],
            Element::Gate(g) => self.gate_in[g]
                .iter()
                .chain(&self.gate_out[g])
                .copied()
                .collect(),
            Element::Meas(i) => vec![self.meas_slots[i]],
        }
    }

    /// Parameter blocks an element opens, i.e. the ones a local step on that
    /// element is free to move.
    pub fn owned_blocks(&self, element: Element) -> Vec<usize> {
        let slots: &[usize] = match element {
            Element::State(i) => std::slice::from_ref(&self.state_slots[i]),
            Element::Gate(g) => &self.gate_out[g],
            Element::Meas(_) => &[],
        };
        slots
            .iter()
            .filter_map(|&s| match self.slots[s] {
                SlotSource::Free(b) => Some(b),
                SlotSource::Conjugated { .. } => None,
            })
            .collect()
    }

    /// Materialises every slot's Gamma from a flat parameter vector.
    pub fn gammas(&self, ps: &PhaseSpace, circuit: &Circuit, x: &[f64]) -> Result<Vec<CMat>> {
        let np = ps.n_params();
        if x.len() != self.n_free * np {
            return Err(QuasiError::ParameterLength {
                expected: self.n_free * np,
                got: x.len(),
            });
        }
        let mut out: Vec<CMat> = Vec::with_capacity(self.slots.len());
        for source in &self.slots {
            let gamma = match *source {
                SlotSource::Free(b) => ps.x_to_gamma(&x[b * np..(b + 1) * np]),
                SlotSource::Conjugated { source, gate } => {
                    out[source].conjugate_by(&circuit.gates()[gate].matrix)
                }
            };
            out.push(gamma);
        }
        Ok(out)
    }
}

/// Log-negativity of a circuit as a function of its frame parameters.
#[derive(Clone, Debug)]
pub struct NegativityModel {
    circuit: Circuit,
    ps: &'static PhaseSpace,
    layout: ParamLayout,
    element_blocks: Vec<(Element, Vec<usize>)>,
}

impl NegativityModel {
    pub fn new(circuit: Circuit) -> Result<Self> {
        let ps = PhaseSpace::get(circuit.dim())?;
        let layout = ParamLayout::new(&circuit);
        let element_blocks = elements_of(&circuit)
            .into_iter()
            .map(|e| {
                let mut blocks: Vec<usize> = layout
                    .element_slots(e)
                    .into_iter()
                    .map(|s| layout.root_block(s))
                    .collect();
                blocks.sort_unstable();
                blocks.dedup();
                (e, blocks)
            })
            .collect();
        Ok(Self {
            circuit,
            ps,
            layout,
            element_blocks,
        })
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn phase_space(&self) -> &'static PhaseSpace {
        self.ps
    }

    pub fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    /// Length of the flat parameter vector.
    pub fn n_params(&self) -> usize {
        self.layout.n_free() * self.ps.n_params()
    }

    /// Every frame set to the Wigner point.
    pub fn wigner_point(&self) -> Vec<f64> {
        self.ps.wigner_params().repeat(self.layout.n_free())
    }

    pub fn elements(&self) -> Vec<Element> {
        self.element_blocks.iter().map(|(e, _)| *e).collect()
    }

    /// Elements whose quasi-probability depends on any of `blocks`.
    pub fn elements_touching(&self, blocks: &[usize]) -> Vec<Element> {
        self.element_blocks
            .iter()
            .filter(|(_, deps)| deps.iter().any(|b| blocks.contains(b)))
            .map(|(e, _)| *e)
            .collect()
    }

    /// ln of one element's negativity given materialised frames.
    pub fn element_log_neg(&self, element: Element, gammas: &[CMat]) -> Result<f64> {
        let c = &self.circuit;
        let l = &self.layout;
        let neg = match element {
            Element::State(i) => self.ps.neg_state(&c.states()[i], &gammas[l.state_slot(i)])?,
            Element::Gate(g) => {
                let gin: Vec<&CMat> = l.gate_inputs(g).iter().map(|&s| &gammas[s]).collect();
                let gout: Vec<&CMat> = l.gate_outputs(g).iter().map(|&s| &gammas[s]).collect();
                self.ps.neg_gate_max(&c.gates()[g].matrix, &gin, &gout)?
            }
            Element::Meas(i) => self.ps.neg_meas(&c.measurements()[i], &gammas[l.meas_slot(i)])?,
        };
        let log_neg = neg.ln();
        if !log_neg.is_finite() {
            return Err(QuasiError::NonFinite("log-negativity"));
        }
        Ok(log_neg)
    }

    /// ln N(x): the sum of every element's log-negativity.
    pub fn log_negativity(&self, x: &[f64]) -> Result<f64> {
        let elements = self.elements();
        self.partial_log_negativity(x, &elements)
    }

    /// Sum of log-negativities over `elements` only.
    pub fn partial_log_negativity(&self, x: &[f64], elements: &[Element]) -> Result<f64> {
        let gammas = self.layout.gammas(self.ps, &self.circuit, x)?;
        elements
            .iter()
            .map(|&e| self.element_log_neg(e, &gammas))
            .sum()
    }

    pub fn negativity(&self, x: &[f64]) -> Result<f64> {
        Ok(self.log_negativity(x)?.exp())
    }
}

fn elements_of(circuit: &Circuit) -> Vec<Element> {
    (0..circuit.n_wires())
        .map(Element::State)
        .chain((0..circuit.gates().len()).map(Element::Gate))
        .chain((0..circuit.n_wires()).map(Element::Meas))
        .collect()
}
