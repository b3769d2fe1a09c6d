use quantum::generator::{haar_unitary, RandomCircuit};
use quantum::operators::StateLabel;
use quantum::{
    exact_probability, optimize_global, optimize_local, wigner_result, Circuit, Element,
    LocalConfig, LocalOrder, NegativityModel, OptimizeConfig, PhaseSpace, QuasiError,
};
use rng::ONDRng;
use tn::{CMat, C64};

/// Gamma close to the Wigner point, so the kernel stays well conditioned.
fn near_wigner(ps: &PhaseSpace, rng: &mut ONDRng) -> CMat {
    let x: Vec<f64> = ps
        .wigner_params()
        .iter()
        .map(|v| v + rng.uniform(-0.1, 0.1, b"gamma"))
        .collect();
    ps.x_to_gamma(&x)
}

fn random_pure_state(d: usize, rng: &mut ONDRng) -> CMat {
    let u = haar_unitary(d, rng);
    let psi: Vec<C64> = (0..d).map(|i| u.get(i, 0)).collect();
    CMat::outer(&psi)
}

#[test]
fn state_quasi_probability_sums_to_one() {
    let mut rng = ONDRng::new(b"trace");
    for d in [2, 3] {
        let ps = PhaseSpace::get(d).unwrap();
        for _ in 0..20 {
            let gamma = near_wigner(ps, &mut rng);
            let rho = random_pure_state(d, &mut rng);
            let w = ps.w_state(&rho, &gamma).unwrap();
            assert!((w.sum() - 1.0).abs() < 1e-9, "d = {}, sum = {}", d, w.sum());
            assert!(w.abs_sum() >= 1.0 - 1e-12);
        }
    }
}

#[test]
fn gate_negativity_is_at_least_one() {
    let mut rng = ONDRng::new(b"gate-neg");
    for d in [2, 3] {
        let ps = PhaseSpace::get(d).unwrap();
        let u = haar_unitary(d, &mut rng);
        let gin = near_wigner(ps, &mut rng);
        let gout = near_wigner(ps, &mut rng);
        for neg in ps.neg_gate(&u, &[&gin], &[&gout]).unwrap() {
            assert!(neg >= 1.0 - 1e-9, "d = {}, neg = {}", d, neg);
        }
    }
}

#[test]
fn contraction_matches_exact_transition_probability() {
    let mut rng = ONDRng::new(b"contract");
    let ps = PhaseSpace::get(2).unwrap();
    let u = haar_unitary(4, &mut rng);
    let rho = [random_pure_state(2, &mut rng), random_pure_state(2, &mut rng)];
    let effect = [
        StateLabel::Basis(0).matrix(2).unwrap(),
        StateLabel::Plus.matrix(2).unwrap(),
    ];
    let g_state = [near_wigner(ps, &mut rng), near_wigner(ps, &mut rng)];
    let g_out = [near_wigner(ps, &mut rng), near_wigner(ps, &mut rng)];

    let w_rho: Vec<_> = (0..2).map(|i| ps.w_state(&rho[i], &g_state[i]).unwrap()).collect();
    let w_u = ps
        .w_gate(&u, &[&g_state[0], &g_state[1]], &[&g_out[0], &g_out[1]])
        .unwrap();
    let w_e: Vec<_> = (0..2).map(|i| ps.w_meas(&effect[i], &g_out[i]).unwrap()).collect();

    let p = ps.points();
    let mut total = 0.0;
    for a0 in 0..p {
        for a1 in 0..p {
            for b0 in 0..p {
                for b1 in 0..p {
                    total += w_rho[0].as_slice()[a0]
                        * w_rho[1].as_slice()[a1]
                        * w_u.get(&[a0, a1, b0, b1])
                        * w_e[0].as_slice()[b0]
                        * w_e[1].as_slice()[b1];
                }
            }
        }
    }

    let circuit = Circuit::new(
        2,
        rho.to_vec(),
        vec![quantum::Gate::new(vec![0, 1], u)],
        effect.to_vec(),
    )
    .unwrap();
    let exact = exact_probability(&circuit);
    assert!((total - exact).abs() < 1e-9, "contracted {} vs exact {}", total, exact);
}

#[test]
fn three_wire_contraction_matches_exact_probability() {
    let mut rng = ONDRng::new(b"contract-3");
    let ps = PhaseSpace::get(2).unwrap();
    let u = haar_unitary(8, &mut rng);
    let rho: Vec<CMat> = (0..3).map(|_| random_pure_state(2, &mut rng)).collect();
    let effect = [
        StateLabel::Basis(0).matrix(2).unwrap(),
        StateLabel::Basis(1).matrix(2).unwrap(),
        CMat::identity(2),
    ];
    let g_in: Vec<CMat> = (0..3).map(|_| near_wigner(ps, &mut rng)).collect();
    let g_out: Vec<CMat> = (0..3).map(|_| near_wigner(ps, &mut rng)).collect();

    let w_rho: Vec<_> = (0..3).map(|i| ps.w_state(&rho[i], &g_in[i]).unwrap()).collect();
    let w_u = ps
        .w_gate(&u, &[&g_in[0], &g_in[1], &g_in[2]], &[&g_out[0], &g_out[1], &g_out[2]])
        .unwrap();
    let w_e: Vec<_> = (0..3).map(|i| ps.w_meas(&effect[i], &g_out[i]).unwrap()).collect();

    let p = ps.points();
    let legs = p * p * p;
    let mut total = 0.0;
    for a in 0..legs {
        let ai = [a / (p * p), (a / p) % p, a % p];
        let w_in: f64 = (0..3).map(|i| w_rho[i].as_slice()[ai[i]]).product();
        for (b, &w) in w_u.row(3, a).iter().enumerate() {
            let bi = [b / (p * p), (b / p) % p, b % p];
            let w_out: f64 = (0..3).map(|i| w_e[i].as_slice()[bi[i]]).product();
            total += w_in * w * w_out;
        }
    }

    let circuit = Circuit::new(
        2,
        rho,
        vec![quantum::Gate::new(vec![0, 1, 2], u)],
        effect.to_vec(),
    )
    .unwrap();
    let exact = exact_probability(&circuit);
    assert!((total - exact).abs() < 1e-9, "contracted {} vs exact {}", total, exact);
}

#[test]
fn covariant_gates_have_unit_negativity_for_any_input_frame() {
    let mut rng = ONDRng::new(b"self-dual");
    for d in [2, 3] {
        let ps = PhaseSpace::get(d).unwrap();
        for label in ["H", "S", "X"] {
            let u = label
                .parse::<quantum::operators::GateLabel>()
                .unwrap()
                .matrix(d)
                .unwrap();
            let gin = near_wigner(ps, &mut rng);
            let gout = gin.conjugate_by(&u);
            let neg = ps.neg_gate_max(&u, &[&gin], &[&gout]).unwrap();
            assert!((neg - 1.0).abs() < 1e-9, "{} d = {}: {}", label, d, neg);
        }
    }
}

#[test]
fn compression_is_idempotent_and_preserves_probability() {
    let mut rng = ONDRng::new(b"compress");
    for m in [2, 3] {
        let mut shape = RandomCircuit::new(4, 8, 1);
        shape.measured = 2;
        let singles = shape.generate(&mut rng).unwrap();
        let mut shape = RandomCircuit::new(4, 5, 2);
        shape.states = Some("0101".to_string());
        let pairs = shape.generate(&mut rng).unwrap();

        for c in [singles, pairs] {
            let once = c.compress(m).unwrap();
            let twice = once.compress(m).unwrap();
            assert_eq!(once.index_list(), twice.index_list());
            for (a, b) in once.gates().iter().zip(twice.gates()) {
                assert!(a.matrix.approx_eq(&b.matrix, 1e-12));
            }
            assert!(once.gates().iter().all(|g| g.width() == m));
            let (p0, p1) = (exact_probability(&c), exact_probability(&once));
            assert!((p0 - p1).abs() < 1e-10, "m = {}: {} vs {}", m, p0, p1);
        }
    }
}

#[test]
fn reversed_circuit_has_same_probability() {
    let mut rng = ONDRng::new(b"reverse");
    let c = RandomCircuit::new(3, 4, 2).generate(&mut rng).unwrap();
    let p0 = exact_probability(&c);
    let p1 = exact_probability(&c.reversed());
    assert!((p0 - p1).abs() < 1e-10);
}

fn t_circuit() -> Circuit {
    Circuit::from_labels(
        2,
        "0+",
        &[(&[0], "H"), (&[0], "T"), (&[0, 1], "C+"), (&[1], "T"), (&[1], "H")],
        "00",
    )
    .unwrap()
}

#[test]
fn optimisation_orders_wigner_local_global() {
    let model = NegativityModel::new(t_circuit()).unwrap();
    let wigner = wigner_result(&model).unwrap();
    let local_cfg = LocalConfig {
        max_iter: 30,
        ..LocalConfig::default()
    };
    let local = optimize_local(&model, &local_cfg).unwrap();
    let cfg = OptimizeConfig::default().with_niter(1).with_max_iter(30);
    let global = optimize_global(&model, &cfg).unwrap();

    assert!(local.log_neg <= wigner.log_neg + 1e-12);
    assert!(global.log_neg <= local.log_neg + 1e-12, "global {} local {}", global.log_neg, local.log_neg);
    assert!(global.neg >= 1.0 - 1e-9);
    assert!((model.log_negativity(&global.x).unwrap() - global.log_neg).abs() < 1e-9);
}

#[test]
fn optimised_effects_never_cost_less_than_one() {
    let model = NegativityModel::new(t_circuit()).unwrap();
    let cfg = OptimizeConfig::default().with_niter(2).with_max_iter(100);
    let global = optimize_global(&model, &cfg).unwrap();
    let gammas = model
        .layout()
        .gammas(model.phase_space(), model.circuit(), &global.x)
        .unwrap();
    for element in model.elements() {
        let log_neg = model.element_log_neg(element, &gammas).unwrap();
        assert!(log_neg >= -1e-9, "{:?}: {}", element, log_neg);
    }
    assert!(global.neg >= 1.0 - 1e-9);
}

#[test]
fn local_orders_are_all_accepted() {
    let model = NegativityModel::new(t_circuit()).unwrap();
    let wigner = wigner_result(&model).unwrap();
    for order in [LocalOrder::Reverse, LocalOrder::Custom(vec![4, 2, 0, 1, 3])] {
        let cfg = LocalConfig {
            max_iter: 20,
            order,
            ..LocalConfig::default()
        };
        let r = optimize_local(&model, &cfg).unwrap();
        assert!(r.log_neg <= wigner.log_neg + 1e-12);
    }
}

#[test]
fn invalid_local_order_is_rejected() {
    let model = NegativityModel::new(t_circuit()).unwrap();
    let cfg = LocalConfig {
        order: LocalOrder::Custom(vec![0, 0, 1, 2, 3]),
        ..LocalConfig::default()
    };
    assert!(matches!(
        optimize_local(&model, &cfg),
        Err(QuasiError::InvalidOrder(_))
    ));
}

#[test]
fn magic_state_costs_negativity() {
    let c = Circuit::from_labels(3, "T", &[(&[0], "H")], "0").unwrap();
    let model = NegativityModel::new(c).unwrap();
    let gammas = model
        .layout()
        .gammas(model.phase_space(), model.circuit(), &model.wigner_point())
        .unwrap();
    let state = model.element_log_neg(Element::State(0), &gammas).unwrap();
    let gate = model.element_log_neg(Element::Gate(0), &gammas).unwrap();
    assert!(state > 1e-6);
    assert!(gate.abs() < 1e-9);
}
