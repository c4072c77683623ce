//! Lifeline topology validity: the forward and reverse neighbor sets of every
//! strategy must agree with each other.

use glb_lite::topology::{Hypercube, LifelineStrategy, Ring};
use glb_lite::LifelineStrategyKind;

fn assert_consistent(strategy: &dyn LifelineStrategy, places: usize) {
    for home in 0..places {
        for &target in &strategy.lifelines(home, places) {
            assert!(target < places, "target {target} out of range for {places}");
            assert_ne!(target, home, "self-lifeline at {home}/{places}");
            assert!(
                strategy.reverse_lifelines(target, places).contains(&home),
                "{home} -> {target} not mirrored (places = {places})"
            );
        }
        for &source in &strategy.reverse_lifelines(home, places) {
            assert!(
                strategy.lifelines(source, places).contains(&home),
                "reverse {source} -> {home} not mirrored (places = {places})"
            );
        }
    }
}

#[test]
fn hypercube_is_consistent_for_all_small_clusters() {
    for places in 1..=17 {
        assert_consistent(&Hypercube, places);
    }
}

#[test]
fn ring_is_consistent_for_all_small_clusters() {
    for places in 1..=17 {
        assert_consistent(&Ring, places);
    }
}

#[test]
fn built_strategies_are_consistent() {
    for kind in [LifelineStrategyKind::Hypercube, LifelineStrategyKind::Ring] {
        let strategy = kind.build();
        for places in 1..=9 {
            assert_consistent(strategy.as_ref(), places);
        }
    }
}

#[test]
fn hypercube_neighborhood_is_symmetric() {
    for places in [2, 5, 8, 16] {
        for home in 0..places {
            assert_eq!(
                Hypercube.lifelines(home, places),
                Hypercube.reverse_lifelines(home, places)
            );
        }
    }
}

#[test]
fn strategy_names_round_trip() {
    for kind in [LifelineStrategyKind::Hypercube, LifelineStrategyKind::Ring] {
        assert_eq!(LifelineStrategyKind::from_name(kind.name()).unwrap(), kind);
    }
    assert!(LifelineStrategyKind::from_name("mesh").is_err());
}
