use proptest::prelude::*;
use specmap_algorithms::classification::{
    isodata, kmeans, kmeans_raster, Clusterer, InitMethod, IsodataParams, KmeansParams,
    SpectralAngleMapper, SpectralCorrelationMapper, Termination,
};
use specmap_core::{ClassificationStrategy, Error, PixelInput, Raster, ReferenceSpectra, Traversal};
use specmap_parallel::{ProcessingMode, TraversalEngine};

fn rules<S: ClassificationStrategy>(strategy: &S, pixel: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; strategy.num_out_bands()];
    strategy.evaluate(PixelInput::Pixel(pixel), &mut out).unwrap();
    out
}

proptest! {
    #[test]
    fn prop_sam_and_scm_scale_invariant(
        pixel in prop::collection::vec(0.01f64..10.0, 4),
        refs in prop::collection::vec(prop::collection::vec(0.01f64..10.0, 4), 1..4),
        scale in 0.1f64..100.0
    ) {
        let reference = ReferenceSpectra::from_spectra(refs).unwrap();
        let scaled: Vec<f64> = pixel.iter().map(|v| v * scale).collect();

        let sam = SpectralAngleMapper::new(reference.clone());
        for (a, b) in rules(&sam, &pixel).iter().zip(rules(&sam, &scaled)) {
            prop_assert!((a - b).abs() < 1e-9);
        }
        let scm = SpectralCorrelationMapper::new(reference);
        for (a, b) in rules(&scm, &pixel).iter().zip(rules(&scm, &scaled)) {
            prop_assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_kmeans_labels_in_range(
        data in prop::collection::vec(-10.0f64..10.0, 4..40),
        k in 1usize..5
    ) {
        let n = data.len();
        let input = Raster::from_vec(data, 1, n, 1).unwrap();
        let params = KmeansParams { num_clusters: k, seed: 7, ..Default::default() };
        match kmeans_raster(&TraversalEngine::new(3), &input, &params) {
            Ok((labels, table)) => {
                let k_out = table.clusters.len() as f64;
                for &l in labels.values() {
                    prop_assert!(l >= 1.0 && l <= k_out);
                }
                prop_assert_eq!(table.clusters.iter().map(|c| c.count).sum::<usize>(), n);
            }
            // Not enough distinct values for k
            Err(Error::InvalidParameter { .. }) => {}
            Err(e) => prop_assert!(false, "unexpected error: {e}"),
        }
    }

    #[test]
    fn prop_isodata_respects_min_num_vals(
        data in prop::collection::vec(0.0f64..100.0, 20..80),
        min_num_vals in 1usize..6
    ) {
        let n = data.len();
        let input = Raster::from_vec(data, 1, n, 1).unwrap();
        let params = IsodataParams {
            num_clusters: 3,
            max_num_clusters: 6,
            max_num_iterations: 8,
            min_num_vals,
            stddev_thres: 5.0,
            min_distance_between_centres: 3.0,
            prop_over_avg_dist: 0.5,
            ..Default::default()
        };
        match isodata(&input, &params) {
            Ok(outcome) => {
                for cluster in &outcome.clusters {
                    prop_assert!(cluster.count >= min_num_vals);
                }
            }
            Err(Error::InvalidParameter { .. }) | Err(Error::IterationFault(_)) => {}
            Err(e) => prop_assert!(false, "unexpected error: {e}"),
        }
    }
}

#[test]
fn test_identical_and_negated_vectors() {
    let reference = ReferenceSpectra::from_spectra([vec![0.3, 0.6, 0.9]]).unwrap();
    let sam = SpectralAngleMapper::new(reference.clone());
    let scm = SpectralCorrelationMapper::new(reference);

    assert!(rules(&sam, &[0.3, 0.6, 0.9])[0].abs() < 1e-12);
    assert!((rules(&scm, &[0.3, 0.6, 0.9])[0] - 1.0).abs() < 1e-12);
    assert!((rules(&sam, &[-0.3, -0.6, -0.9])[0] - std::f64::consts::PI).abs() < 1e-12);
    assert!(rules(&scm, &[-0.3, -0.6, -0.9])[0].abs() < 1e-12);
    assert_eq!(rules(&scm, &[0.4, 0.4, 0.4])[0], 0.5);
}

#[test]
fn test_sam_end_to_end_through_engine() {
    let reference =
        ReferenceSpectra::new([("A", vec![1.0, 0.0, 0.0, 0.0]), ("B", vec![0.0, 1.0, 0.0, 0.0])])
            .unwrap();
    let input = Raster::from_vec(
        vec![
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.5, 0.5, 0.0, 0.0, //
            f64::NAN, 0.2, 0.3, 0.4,
        ],
        2,
        2,
        4,
    )
    .unwrap();

    let engine = TraversalEngine::new(1).with_mode(ProcessingMode::Sequential);
    let rule_image = engine.run(&SpectralAngleMapper::new(reference.clone()), &input).unwrap();
    assert_eq!(rule_image.bands(), 2);
    assert!((rule_image.get(1, 0, 0).unwrap() - 0.785398).abs() < 1e-6);
    assert!((rule_image.get(1, 0, 1).unwrap() - 0.785398).abs() < 1e-6);

    let classifier = SpectralAngleMapper::new(reference).classifier(0.5).unwrap();
    let labels = engine.run(&classifier, &input).unwrap();
    assert_eq!(labels.get(0, 0, 0).unwrap(), 1.0);
    assert_eq!(labels.get(0, 1, 0).unwrap(), 2.0);
    assert_eq!(labels.get(1, 0, 0).unwrap(), 0.0);
    assert!(labels.get(1, 1, 0).unwrap().is_nan());
}

#[test]
fn test_windowed_traversal_is_rejected_for_pointwise_strategy() {
    let reference = ReferenceSpectra::from_spectra([vec![1.0, 0.0]]).unwrap();
    let input = Raster::filled(5, 5, 2, 1.0).unwrap();
    let engine = TraversalEngine::new(2).with_traversal(Traversal::Windowed { size: 3 });
    let err = engine.run(&SpectralAngleMapper::new(reference), &input).unwrap_err();
    assert!(matches!(err, Error::UnsupportedTraversal { .. }));
    assert!(err.is_configuration());
}

#[test]
fn test_kmeans_single_cluster_reaches_global_mean() {
    let mut data = Vec::new();
    for i in 0..30 {
        data.extend_from_slice(&[i as f64, 100.0 - i as f64, (i % 7) as f64]);
    }
    let input = Raster::from_vec(data, 5, 6, 3).unwrap();
    let params = KmeansParams {
        num_clusters: 1,
        init: InitMethod::Random,
        ..Default::default()
    };
    let outcome = kmeans(&input, &params).unwrap();
    assert_eq!(outcome.termination, Termination::Converged { iterations: 1 });

    let expected = [14.5, 85.5, (0..30).map(|i| (i % 7) as f64).sum::<f64>() / 30.0];
    for (c, e) in outcome.clusters[0].centroid.iter().zip(expected) {
        assert!((c - e).abs() < 1e-10);
    }
}

#[test]
fn test_kmeans_two_clusters_one_dimensional() {
    let input = Raster::from_vec(vec![0.0, 0.0, 1.0, 10.0, 10.0, 11.0], 1, 6, 1).unwrap();
    for init in [InitMethod::Random, InitMethod::KMeansPlusPlus] {
        for seed in 0..8 {
            let params = KmeansParams {
                num_clusters: 2,
                min_num_vals: 1,
                init,
                seed,
                ..Default::default()
            };
            let outcome = kmeans(&input, &params).unwrap();
            assert!(outcome.termination.is_converged());
            assert!(outcome.termination.iterations() <= 2);

            let mut centres: Vec<f64> = outcome.clusters.iter().map(|c| c.centroid[0]).collect();
            centres.sort_by(f64::total_cmp);
            assert!((centres[0] - 1.0 / 3.0).abs() < 1e-9);
            assert!((centres[1] - 31.0 / 3.0).abs() < 1e-9);
        }
    }
}

#[test]
fn test_labeling_pass_reproduces_last_assignment() {
    let mut data = Vec::new();
    for i in 0..64 {
        let group = (i % 3) as f64 * 50.0;
        data.extend_from_slice(&[group + (i % 5) as f64 * 0.3, group * 0.5 + 1.0]);
    }
    let input = Raster::from_vec(data, 8, 8, 2).unwrap();
    let engine = TraversalEngine::new(3);
    let params = KmeansParams {
        num_clusters: 3,
        cluster_move_threshold: 1e-12,
        ..Default::default()
    };

    let outcome = Clusterer::new(engine.clone()).run(&input, &params.to_config()).unwrap();
    let (labels, table) = outcome.label(&engine, &input).unwrap();
    assert_eq!(labels.shape(), (8, 8));
    for (row, cluster) in table.clusters.iter().zip(&outcome.clusters) {
        assert_eq!(row.label, cluster.id);
        assert_eq!(row.count, cluster.count);
        assert_eq!(row.centroid, cluster.centroid);
    }
}
