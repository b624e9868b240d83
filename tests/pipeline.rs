//! Field store persistence and processing pipelines on composed volumes.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use pa_forge::io::{FieldStore, read_store, write_store};
use pa_forge::processing::{ProcessingSettings, run_pipeline};
use pa_forge::{DataField, RunContext, SimulationSettings, create_volume};

const BLOOD_PHANTOM: &str = r#"
    [simulation]
    name = "blood phantom"
    random_seed = 11
    spacing_mm = 1.0
    volume_x_mm = 4.0
    volume_y_mm = 4.0
    volume_z_mm = 6.0
    wavelengths = [750, 800, 850]

    [structures.background]
    type = "background"
    tissue = { preset = "blood", oxygenation = 0.7 }

    [structures.vessel]
    type = "circular_tubular"
    priority = 9
    start_mm = [0.0, 2.0, 3.0]
    end_mm = [4.0, 2.0, 3.0]
    radius_mm = 1.0
    partial_volume = true
    tissue = { preset = "blood", oxygenation = 0.3 }

    [[processing]]
    component = "linear_unmixing"
    chromophores = ["oxyhemoglobin", "deoxyhemoglobin"]
    compute_so2 = true

    [[processing]]
    component = "field_of_view_cropping"
    field_of_view_mm = [[0.0, 2.0], [0.0, 4.0], [1.0, 5.0]]
"#;

fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

fn phantom() -> (SimulationSettings, FieldStore) {
    let settings = SimulationSettings::from_toml_str(BLOOD_PHANTOM).expect("valid settings");
    let store = create_volume(&settings).expect("volume composes");
    (settings, store)
}

#[test]
fn store_survives_a_round_trip_through_a_file() {
    let (_, store) = phantom();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phantom.json");

    write_store(BufWriter::new(File::create(&path).unwrap()), &store).unwrap();
    let restored = read_store(BufReader::new(File::open(&path).unwrap())).unwrap();

    assert_eq!(restored.spacing_mm(), 1.0);
    assert_eq!(restored.wavelengths(), &[750, 800, 850]);
    assert_eq!(restored, store);
}

#[test]
fn unmixing_recovers_oxygenation_before_cropping() {
    let (settings, mut store) = phantom();
    let steps = ProcessingSettings::from_toml_str(BLOOD_PHANTOM)
        .unwrap()
        .steps;
    assert_eq!(steps.len(), 2);

    run_pipeline(&mut store, &steps, &RunContext::new(settings.random_seed)).unwrap();

    let so2 = store.get(&DataField::UnmixedSo2, None).unwrap();
    assert_eq!(so2.dim(), (2, 4, 4));
    // Voxels far from the vessel hold background blood only.
    assert!(approx_eq(so2[[0, 0, 0]], 0.7, 1e-9));

    let oxygenation = store.get(&DataField::Oxygenation, None).unwrap();
    for (&unmixed, &truth) in so2.iter().zip(oxygenation.iter()) {
        assert!(approx_eq(unmixed, truth, 1e-9), "{unmixed} vs {truth}");
    }

    let mua = store.get(&DataField::Absorption, Some(800)).unwrap();
    assert_eq!(mua.dim(), (2, 4, 4));
}

#[test]
fn noise_depends_only_on_the_seed() {
    let (_, store) = phantom();
    let steps = ProcessingSettings::from_toml_str(
        r#"
        [[processing]]
        component = "gaussian_noise"
        field = "absorption"
        std = 0.05
        mode = "multiplicative"
        non_negative = true
        "#,
    )
    .unwrap()
    .steps;

    let run = |seed: u64| {
        let mut noisy = store.clone();
        run_pipeline(&mut noisy, &steps, &RunContext::new(seed)).unwrap();
        noisy
    };

    let a = run(3);
    assert_eq!(a, run(3));
    assert_ne!(a, run(4));

    let noisy = a.get(&DataField::Absorption, Some(750)).unwrap();
    assert!(noisy.iter().all(|&v| v >= 0.0));
    assert_eq!(
        a.get(&DataField::Oxygenation, None).unwrap(),
        store.get(&DataField::Oxygenation, None).unwrap()
    );
}

#[test]
fn missing_solver_field_is_reported() {
    let (_, mut store) = phantom();
    let steps = ProcessingSettings::from_toml_str(
        "[[processing]]\ncomponent = \"poisson_noise\"\nfield = \"initial_pressure\"\n",
    )
    .unwrap()
    .steps;

    let err = run_pipeline(&mut store, &steps, &RunContext::new(0)).unwrap_err();
    assert!(err.to_string().contains("initial_pressure"), "{err}");
}
