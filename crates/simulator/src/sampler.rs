//! Monte Carlo estimation of an outcome probability from the
//! quasi-probability representation of a circuit.
//!
//! `prepare` fixes the frames and precomputes, for every element, the
//! normalised |W| tables to draw from and the signed negativity each draw
//! contributes. Every `sample_iter` is then an independent, unbiased
//! estimate of tr[E U rho U^dag] whose magnitude is bounded by the total
//! negativity.

use quantum::phase_space::{check_gate_marginals, check_state_trace};
use quantum::{
    optimize_global, optimize_local, Circuit, LocalConfig, NegativityModel, OptimizeConfig,
    QuasiError, Result,
};
use rng::ONDRng;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Where the frame parameters come from.
#[derive(Clone, Debug)]
pub enum ParameterSource {
    Wigner,
    Optimized(OptimizeConfig),
    LocalOptimized(LocalConfig),
    Given(Vec<f64>),
}

/// How measurement quasi-probabilities enter the per-sample estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Estimator {
    /// prod_m W_m(x_m): the outcome probability.
    #[default]
    Product,
    /// sum_m 1/2 W_m(x_m) W_{m+1}(x_{m+1}) around the ring of wires, the
    /// nearest-neighbour correlation used for QAOA-style cost functions.
    RingCorrelation,
}

/// Normalised |W| over one row, and sign(W) * sum|W| per entry.
#[derive(Clone, Debug)]
struct DrawTable {
    cdf: Vec<f64>,
    weights: Vec<f64>,
    neg: f64,
}

impl DrawTable {
    /// `None` for a row with no mass; such rows are never drawn from.
    fn from_row(row: &[f64]) -> Option<Self> {
        let neg: f64 = row.iter().map(|v| v.abs()).sum();
        if neg == 0.0 {
            return None;
        }
        let mut acc = 0.0;
        let cdf = row
            .iter()
            .map(|v| {
                acc += v.abs() / neg;
                acc
            })
            .collect();
        let weights = row.iter().map(|&v| tn::tensor::sign(v) * neg).collect();
        Some(Self { cdf, weights, neg })
    }
}

#[derive(Clone, Debug)]
struct GateTable {
    wires: Vec<usize>,
    /// One table per input multi-point.
    rows: Vec<Option<DrawTable>>,
}

#[derive(Clone, Debug)]
pub struct SampleReport {
    pub estimate: f64,
    pub std_error: f64,
    pub sample_size: usize,
    pub total_negativity: f64,
    /// Running mean after every sample, when requested.
    pub trace: Option<Vec<f64>>,
    pub elapsed: Duration,
}

#[derive(Clone, Debug)]
pub struct Sampler {
    points: usize,
    states: Vec<DrawTable>,
    gates: Vec<GateTable>,
    meas: Vec<Vec<f64>>,
    estimator: Estimator,
    params: Vec<f64>,
    total_negativity: f64,
}

impl Sampler {
    /// Resolves the parameters once and builds every draw table.
    pub fn prepare(circuit: &Circuit, source: &ParameterSource, estimator: Estimator) -> Result<Self> {
        let model = NegativityModel::new(circuit.clone())?;
        let params = match source {
            ParameterSource::Wigner => model.wigner_point(),
            ParameterSource::Optimized(cfg) => optimize_global(&model, cfg)?.x,
            ParameterSource::LocalOptimized(cfg) => optimize_local(&model, cfg)?.x,
            ParameterSource::Given(x) => {
                if x.len() != model.n_params() {
                    return Err(QuasiError::ParameterLength {
                        expected: model.n_params(),
                        got: x.len(),
                    });
                }
                x.clone()
            }
        };
        Self::from_model(&model, params, estimator)
    }

    fn from_model(model: &NegativityModel, params: Vec<f64>, estimator: Estimator) -> Result<Self> {
        let ps = model.phase_space();
        let layout = model.layout();
        let circuit = model.circuit();
        let gammas = layout.gammas(ps, circuit, &params)?;
        let mut total_negativity = 1.0;

        let mut states = Vec::with_capacity(circuit.n_wires());
        for (i, rho) in circuit.states().iter().enumerate() {
            let w = ps.w_state(rho, &gammas[layout.state_slot(i)])?;
            let element = format!("state {i}");
            check_state_trace(&w, rho.trace().re, &element)?;
            let table = DrawTable::from_row(w.as_slice()).ok_or(QuasiError::NonFinite("state negativity"))?;
            total_negativity *= table.neg;
            states.push(table);
        }

        let mut gates = Vec::with_capacity(circuit.gates().len());
        for (g, gate) in circuit.gates().iter().enumerate() {
            let k = gate.width();
            let gin: Vec<_> = layout.gate_inputs(g).iter().map(|&s| &gammas[s]).collect();
            let gout: Vec<_> = layout.gate_outputs(g).iter().map(|&s| &gammas[s]).collect();
            let w = ps.w_gate(&gate.matrix, &gin, &gout)?;
            check_gate_marginals(&w, k, &format!("gate {g}"))?;

            let n_rows = ps.points().pow(k as u32);
            let mut rows = Vec::with_capacity(n_rows);
            let mut worst: f64 = 0.0;
            for a in 0..n_rows {
                let table = DrawTable::from_row(w.row(k, a));
                if let Some(t) = &table {
                    worst = worst.max(t.neg);
                }
                rows.push(table);
            }
            total_negativity *= worst;
            gates.push(GateTable {
                wires: gate.wires.clone(),
                rows,
            });
        }

        let mut meas = Vec::with_capacity(circuit.n_wires());
        for (i, effect) in circuit.measurements().iter().enumerate() {
            let w = ps.w_meas(effect, &gammas[layout.meas_slot(i)])?;
            total_negativity *= w.max_abs().max(1.0);
            meas.push(w.as_slice().to_vec());
        }

        info!(
            wires = circuit.n_wires(),
            gates = circuit.gates().len(),
            total_negativity,
            "sampler prepared"
        );
        Ok(Self {
            points: ps.points(),
            states,
            gates,
            meas,
            estimator,
            params,
            total_negativity,
        })
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Product of state, worst-case gate and measurement negativities; bounds
    /// |sample_iter| for the product estimator.
    pub fn total_negativity(&self) -> f64 {
        self.total_negativity
    }

    pub fn estimator(&self) -> Estimator {
        self.estimator
    }

    /// One estimate: draw a phase-space trajectory through the circuit and
    /// return its signed weight.
    pub fn sample_iter(&self, rng: &mut ONDRng) -> f64 {
        let p = self.points;
        let mut current = vec![0usize; self.states.len()];
        let mut estimate = 1.0;

        for (wire, table) in self.states.iter().enumerate() {
            let x = rng.sample_cdf(&table.cdf, b"state");
            current[wire] = x;
            estimate *= table.weights[x];
        }

        for gate in &self.gates {
            let row = gate.wires.iter().fold(0, |acc, &w| acc * p + current[w]);
            let Some(table) = &gate.rows[row] else {
                return 0.0;
            };
            let mut out = rng.sample_cdf(&table.cdf, b"gate");
            estimate *= table.weights[out];
            for &w in gate.wires.iter().rev() {
                current[w] = out % p;
                out /= p;
            }
        }

        let factor: f64 = match self.estimator {
            Estimator::Product => self
                .meas
                .iter()
                .zip(&current)
                .map(|(w, &x)| w[x])
                .product::<f64>(),
            Estimator::RingCorrelation => {
                let n = self.meas.len();
                (0..n)
                    .map(|m| {
                        let next = (m + 1) % n;
                        0.5 * self.meas[m][current[m]] * self.meas[next][current[next]]
                    })
                    .sum::<f64>()
            }
        };
        estimate * factor
    }

    /// Mean of `size` independent estimates, with its standard error.
    pub fn sample(&self, size: usize, rng: &mut ONDRng, keep_trace: bool) -> SampleReport {
        let started = Instant::now();
        let mut trace = keep_trace.then(|| Vec::with_capacity(size));
        let mut stats = RunningStats::default();
        for i in 0..size {
            stats.push(self.sample_iter(rng));
            if let Some(t) = trace.as_mut() {
                t.push(stats.mean);
            }
            if size >= 10 && (i + 1) % (size / 10) == 0 {
                debug!(done = i + 1, estimate = stats.mean, "sampling");
            }
        }
        let report = stats.report(self.total_negativity, trace, started.elapsed());
        info!(
            estimate = report.estimate,
            std_error = report.std_error,
            sample_size = report.sample_size,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "sampling finished"
        );
        report
    }
}

/// Welford mean and variance; mergeable across batches.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RunningStats {
    pub n: usize,
    pub mean: f64,
    pub m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, v: f64) {
        self.n += 1;
        let delta = v - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (v - self.mean);
    }

    pub fn merge(self, other: RunningStats) -> RunningStats {
        if self.n == 0 {
            return other;
        }
        if other.n == 0 {
            return self;
        }
        let n = self.n + other.n;
        let delta = other.mean - self.mean;
        RunningStats {
            n,
            mean: self.mean + delta * other.n as f64 / n as f64,
            m2: self.m2 + other.m2 + delta * delta * (self.n * other.n) as f64 / n as f64,
        }
    }

    pub fn report(self, total_negativity: f64, trace: Option<Vec<f64>>, elapsed: Duration) -> SampleReport {
        let std_error = if self.n > 1 {
            (self.m2 / (self.n - 1) as f64 / self.n as f64).sqrt()
        } else {
            f64::INFINITY
        };
        SampleReport {
            estimate: self.mean,
            std_error,
            sample_size: self.n,
            total_negativity,
            trace,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_table_keeps_signs() {
        let t = DrawTable::from_row(&[0.5, -0.25, 0.0, 0.75]).unwrap();
        assert!((t.neg - 1.5).abs() < 1e-15);
        assert_eq!(t.weights, vec![1.5, -1.5, 0.0, 1.5]);
        assert!((t.cdf[3] - 1.0).abs() < 1e-15);
    }

    #[test]
    fn empty_row_is_never_drawn() {
        assert!(DrawTable::from_row(&[0.0; 4]).is_none());
    }

    #[test]
    fn merged_stats_match_single_pass() {
        let values = [0.3, -1.2, 2.5, 0.0, 0.7, 1.1];
        let mut all = RunningStats::default();
        values.iter().for_each(|&v| all.push(v));
        let (mut a, mut b) = (RunningStats::default(), RunningStats::default());
        values[..2].iter().for_each(|&v| a.push(v));
        values[2..].iter().for_each(|&v| b.push(v));
        let merged = a.merge(b);
        assert!((merged.mean - all.mean).abs() < 1e-12);
        assert!((merged.m2 - all.m2).abs() < 1e-12);
    }

    #[test]
    fn wrong_given_length_is_rejected() {
        let c = Circuit::from_labels(2, "0", &[(&[0], "H")], "0").unwrap();
        let err = Sampler::prepare(&c, &ParameterSource::Given(vec![1.0]), Estimator::Product).unwrap_err();
        assert!(matches!(err, QuasiError::ParameterLength { expected: 3, got: 1 }));
    }

    #[test]
    fn stabilizer_circuit_samples_are_deterministic_weights() {
        // |0> -> H -> <0| has a non-negative Wigner representation, so every
        // sample is either 0 or 1.
        let c = Circuit::from_labels(2, "0", &[(&[0], "H")], "0").unwrap();
        let s = Sampler::prepare(&c, &ParameterSource::Wigner, Estimator::Product).unwrap();
        assert!((s.total_negativity() - 1.0).abs() < 1e-12);
        let mut rng = ONDRng::new(b"stab");
        for _ in 0..100 {
            let v = s.sample_iter(&mut rng);
            assert!(v.abs() < 1e-12 || (v - 1.0).abs() < 1e-12, "v = {}", v);
        }
    }
}
