//! A circuit together with its cached representations.

use crate::sampler::{Estimator, ParameterSource, SampleReport, Sampler};
use quantum::{
    exact_probability, optimize_global, optimize_local, wigner_result, Circuit, LocalConfig,
    NegativityModel, OptimizeConfig, OptimizeResult, Result,
};
use rng::ONDRng;
use std::fmt;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Representation {
    Wigner,
    Optimized,
    LocalOptimized,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Representation::Wigner => "wigner",
            Representation::Optimized => "optimized",
            Representation::LocalOptimized => "local",
        })
    }
}

/// Holds the circuit, its optional compressed form and the optimisation
/// results computed so far. Representations are computed on first use
/// against the compressed circuit when there is one.
#[derive(Clone, Debug)]
pub struct QdCircuit {
    circuit: Circuit,
    compressed: Option<Circuit>,
    optimize: OptimizeConfig,
    local: LocalConfig,
    wigner: Option<OptimizeResult>,
    optimized: Option<OptimizeResult>,
    local_optimized: Option<OptimizeResult>,
}

impl QdCircuit {
    pub fn new(circuit: Circuit) -> Self {
        Self {
            circuit,
            compressed: None,
            optimize: OptimizeConfig::default(),
            local: LocalConfig::default(),
            wigner: None,
            optimized: None,
            local_optimized: None,
        }
    }

    pub fn with_optimize_config(mut self, cfg: OptimizeConfig) -> Self {
        self.optimize = cfg;
        self.optimized = None;
        self
    }

    pub fn with_local_config(mut self, cfg: LocalConfig) -> Self {
        self.local = cfg;
        self.local_optimized = None;
        self
    }

    pub fn original(&self) -> &Circuit {
        &self.circuit
    }

    /// The circuit the representations refer to.
    pub fn circuit(&self) -> &Circuit {
        self.compressed.as_ref().unwrap_or(&self.circuit)
    }

    /// Compresses into `m`-wire blocks and drops cached representations.
    pub fn compress(&mut self, m: usize) -> Result<&Circuit> {
        let compressed = self.circuit.compress(m)?;
        info!(
            gates = self.circuit.gates().len(),
            blocks = compressed.gates().len(),
            "circuit compressed"
        );
        self.wigner = None;
        self.optimized = None;
        self.local_optimized = None;
        Ok(self.compressed.insert(compressed))
    }

    pub fn result(&self, repr: Representation) -> Option<&OptimizeResult> {
        match repr {
            Representation::Wigner => self.wigner.as_ref(),
            Representation::Optimized => self.optimized.as_ref(),
            Representation::LocalOptimized => self.local_optimized.as_ref(),
        }
    }

    /// Frame parameters for `repr`, computed once and cached.
    pub fn opt_x(&mut self, repr: Representation) -> Result<&OptimizeResult> {
        if self.result(repr).is_none() {
            let model = NegativityModel::new(self.circuit().clone())?;
            let result = match repr {
                Representation::Wigner => wigner_result(&model)?,
                Representation::Optimized => optimize_global(&model, &self.optimize)?,
                Representation::LocalOptimized => optimize_local(&model, &self.local)?,
            };
            info!(
                representation = %repr,
                log_neg = result.log_neg,
                neg = result.neg,
                "representation ready"
            );
            let slot = match repr {
                Representation::Wigner => &mut self.wigner,
                Representation::Optimized => &mut self.optimized,
                Representation::LocalOptimized => &mut self.local_optimized,
            };
            *slot = Some(result);
        }
        match self.result(repr) {
            Some(r) => Ok(r),
            None => unreachable!("representation {repr} was just cached"),
        }
    }

    pub fn sampler(&mut self, repr: Representation, estimator: Estimator) -> Result<Sampler> {
        let x = self.opt_x(repr)?.x.clone();
        Sampler::prepare(self.circuit(), &ParameterSource::Given(x), estimator)
    }

    pub fn sample(&mut self, repr: Representation, size: usize, rng: &mut ONDRng) -> Result<SampleReport> {
        Ok(self.sampler(repr, Estimator::Product)?.sample(size, rng, false))
    }

    /// Exact outcome probability of the original circuit.
    pub fn exact_probability(&self) -> f64 {
        exact_probability(&self.circuit)
    }
}
