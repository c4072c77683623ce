//! Lifeline topology strategies.
//!
//! A strategy is a pure function from `(place id, place count)` to the fixed
//! set of places a starving place may establish lifelines on. Correctness of
//! the scheduler does not depend on which topology is chosen, only on
//! `lifelines`/`reverse_lifelines` being consistent with each other.

use std::fmt;
use std::str::FromStr;

use crate::error::{GlbError, Result};

/// Maps a place to its fixed steal neighborhood.
pub trait LifelineStrategy: Send + Sync + fmt::Debug {
    /// Places that `home` may establish a lifeline on.
    fn lifelines(&self, home: usize, places: usize) -> Vec<usize>;

    /// Places that may establish a lifeline on `home`. Must satisfy
    /// `h2 ∈ lifelines(h1) ⇔ h1 ∈ reverse_lifelines(h2)`.
    fn reverse_lifelines(&self, home: usize, places: usize) -> Vec<usize>;
}

/// Built-in strategies, resolvable by name at setup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifelineStrategyKind {
    /// Hypercube edges: neighbors differ in exactly one bit. Degree grows
    /// logarithmically with the place count.
    #[default]
    Hypercube,
    /// Directed ring: each place steals from its successor.
    Ring,
}

impl LifelineStrategyKind {
    /// Resolve a strategy by name. Fails fast with [`GlbError::UnknownStrategy`]
    /// so a typo surfaces at setup, not mid-computation.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "hypercube" => Ok(Self::Hypercube),
            "ring" => Ok(Self::Ring),
            other => Err(GlbError::UnknownStrategy(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Hypercube => "hypercube",
            Self::Ring => "ring",
        }
    }

    pub fn build(self) -> Box<dyn LifelineStrategy> {
        match self {
            Self::Hypercube => Box::new(Hypercube),
            Self::Ring => Box::new(Ring),
        }
    }
}

impl FromStr for LifelineStrategyKind {
    type Err = GlbError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for LifelineStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hypercube topology: `home ^ (1 << z)` for every bit position `z` that
/// yields a valid place id. XOR is self-inverse, so the lifeline and
/// reverse-lifeline sets coincide.
#[derive(Debug)]
pub struct Hypercube;

impl LifelineStrategy for Hypercube {
    fn lifelines(&self, home: usize, places: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut z = 0;
        while (1usize << z) < places {
            let partner = home ^ (1usize << z);
            if partner < places {
                out.push(partner);
            }
            z += 1;
        }
        out
    }

    fn reverse_lifelines(&self, home: usize, places: usize) -> Vec<usize> {
        self.lifelines(home, places)
    }
}

/// Ring topology: each place steals from `(home + 1) % places`.
#[derive(Debug)]
pub struct Ring;

impl LifelineStrategy for Ring {
    fn lifelines(&self, home: usize, places: usize) -> Vec<usize> {
        if places < 2 {
            return Vec::new();
        }
        vec![(home + 1) % places]
    }

    fn reverse_lifelines(&self, home: usize, places: usize) -> Vec<usize> {
        if places < 2 {
            return Vec::new();
        }
        vec![(home + places - 1) % places]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_resolves_builtins() {
        assert_eq!(
            LifelineStrategyKind::from_name("hypercube").unwrap(),
            LifelineStrategyKind::Hypercube
        );
        assert_eq!(
            LifelineStrategyKind::from_name("ring").unwrap(),
            LifelineStrategyKind::Ring
        );
    }

    #[test]
    fn from_name_rejects_unknown() {
        let err = LifelineStrategyKind::from_name("torus").unwrap_err();
        assert!(matches!(err, GlbError::UnknownStrategy(name) if name == "torus"));
    }

    #[test]
    fn hypercube_degree_is_logarithmic() {
        let strategy = Hypercube;
        let lines = strategy.lifelines(0, 8);
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn hypercube_handles_non_power_of_two() {
        let strategy = Hypercube;
        // place 5 of 6: 5^1=4, 5^2=7 (out of range), 5^4=1
        assert_eq!(strategy.lifelines(5, 6), vec![4, 1]);
    }

    #[test]
    fn single_place_has_no_lifelines() {
        assert!(Hypercube.lifelines(0, 1).is_empty());
        assert!(Ring.lifelines(0, 1).is_empty());
    }
}
