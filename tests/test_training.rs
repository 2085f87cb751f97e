//! Integration tests for the classifier roster, grid search and metrics

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use netsec_pipeline::config::PipelineSettings;
use netsec_pipeline::training::{
    expand_grid, get_classification_score, r2_score, Classifier, GridSearch, Model, ModelFamily,
    NetworkModel, ParamGrid, ParamSet, ParamValue, Preprocessor,
};
use netsec_pipeline::NetsecError;

/// Two noisy blobs in three dimensions, labels {0, 1}
fn blobs(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x = Array2::zeros((n, 3));
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let label = (i % 2) as f64;
        for j in 0..3 {
            x[[i, j]] = label * 2.0 + rng.gen_range(-1.0..1.0);
        }
        y[i] = label;
    }
    (x, y)
}

fn accuracy(model: &Classifier, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
    let pred = model.predict(x).unwrap();
    pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count() as f64 / y.len() as f64
}

// ============================================================================
// Roster
// ============================================================================

#[test]
fn test_every_family_learns_blobs() {
    let (x_train, y_train) = blobs(200, 1);
    let (x_test, y_test) = blobs(100, 2);

    for family in ModelFamily::ALL {
        let mut model = family.build(&ParamSet::new(), 42).unwrap();
        model.fit(&x_train, &y_train).unwrap();
        let acc = accuracy(&model, &x_test, &y_test);
        assert!(acc > 0.85, "{} accuracy {}", family, acc);
    }
}

#[test]
fn test_roster_order_and_names() {
    let names: Vec<&str> = ModelFamily::ALL.iter().map(|f| f.name()).collect();
    assert_eq!(
        names,
        vec![
            "Logistic Regression",
            "K-Nearest Neighbors",
            "Decision Tree",
            "AdaBoost",
            "Gradient Boosting",
            "Random Forest"
        ]
    );
}

#[test]
fn test_default_grid_sizes() {
    let sizes: Vec<usize> = ModelFamily::ALL
        .iter()
        .map(|f| expand_grid(&f.default_grid()).len())
        .collect();
    assert_eq!(sizes, vec![1, 20, 3, 18, 120, 5]);
}

#[test]
fn test_seeded_forest_is_reproducible() {
    let (x, y) = blobs(120, 3);
    let mut params = ParamSet::new();
    params.insert("n_estimators".into(), ParamValue::Int(6));

    let mut a = ModelFamily::RandomForest.build(&params, 11).unwrap();
    let mut b = ModelFamily::RandomForest.build(&params, 11).unwrap();
    a.fit(&x, &y).unwrap();
    b.fit(&x, &y).unwrap();

    let (queries, _) = blobs(50, 4);
    assert_eq!(a.predict(&queries).unwrap(), b.predict(&queries).unwrap());
}

// ============================================================================
// Grid search
// ============================================================================

#[test]
fn test_grid_search_reports_every_candidate() {
    let (x, y) = blobs(90, 5);
    let mut grid = ParamGrid::new();
    grid.insert("criterion".into(), vec!["gini".into(), "entropy".into(), "log_loss".into()]);
    grid.insert("max_depth".into(), vec![ParamValue::Int(2), ParamValue::Int(4)]);

    let result = GridSearch::new(ModelFamily::DecisionTree, grid)
        .with_cv_folds(3)
        .with_random_state(42)
        .fit(&x, &y)
        .unwrap();

    assert_eq!(result.candidates.len(), 6);
    let best_cv = result
        .candidates
        .iter()
        .filter_map(|c| c.mean_score)
        .fold(f64::MIN, f64::max);
    assert_eq!(result.best_score, best_cv);
    // The winner is the first candidate reaching the best score
    let first_best = result
        .candidates
        .iter()
        .find(|c| c.mean_score == Some(best_cv))
        .unwrap();
    assert_eq!(first_best.params, result.best_params);
}

#[test]
fn test_grid_search_rejects_bad_value_type() {
    let (x, y) = blobs(30, 6);
    let mut grid = ParamGrid::new();
    grid.insert("weights".into(), vec![ParamValue::Int(1)]);
    let err = GridSearch::new(ModelFamily::KNearestNeighbors, grid).fit(&x, &y).unwrap_err();
    assert!(matches!(err, NetsecError::InvalidParameter { .. }));
}

#[test]
fn test_grid_overrides_from_settings_yaml() {
    let yaml = r#"
selection_metric: accuracy
param_grids:
  gradient_boosting:
    n_estimators: [4]
    learning_rate: [0.1]
    subsample: [0.8]
  k_nearest_neighbors:
    n_neighbors: [5]
    weights: [distance]
"#;
    let settings: PipelineSettings = serde_yaml::from_str(yaml).unwrap();
    settings.validate().unwrap();
    let gb = settings.param_grid(ModelFamily::GradientBoosting);
    assert_eq!(expand_grid(&gb).len(), 1);
    let knn = expand_grid(&settings.param_grid(ModelFamily::KNearestNeighbors));
    assert!(ModelFamily::KNearestNeighbors.build(&knn[0], 0).is_ok());
    // Untouched family keeps the built-in grid
    assert_eq!(expand_grid(&settings.param_grid(ModelFamily::RandomForest)).len(), 5);
}

// ============================================================================
// Metrics and the wrapped predictor
// ============================================================================

#[test]
fn test_metrics_stay_in_unit_interval() {
    let y_true = Array1::from(vec![1.0, 0.0, 1.0, 0.0]);
    let all_negative = Array1::from(vec![0.0, 0.0, 0.0, 0.0]);
    let metrics = get_classification_score(&y_true, &all_negative).unwrap();
    assert_eq!(metrics.precision_score, 0.0);
    assert_eq!(metrics.recall_score, 0.0);
    assert_eq!(metrics.f1_score, 0.0);

    assert_eq!(r2_score(&y_true, &y_true).unwrap(), 1.0);
}

#[test]
fn test_network_model_round_trip() {
    let (mut x, y) = blobs(80, 7);
    x[[0, 1]] = f64::NAN;
    x[[5, 2]] = f64::NAN;

    let mut preprocessor = Preprocessor::new(vec!["a".into(), "b".into(), "c".into()], 3);
    let x_clean = preprocessor.fit_transform(&x).unwrap();
    let mut model = ModelFamily::GradientBoosting.build(&ParamSet::new(), 42).unwrap();
    model.fit(&x_clean, &y).unwrap();

    let network = NetworkModel::new(preprocessor, model).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    network.save(&path).unwrap();

    let loaded = NetworkModel::load(&path).unwrap();
    assert_eq!(loaded.predict(&x).unwrap(), network.predict(&x).unwrap());
}
