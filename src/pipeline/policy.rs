//! Commit decisions.
//!
//! | Stage                | Policy              | Commit when                      |
//! |----------------------|---------------------|----------------------------------|
//! | scripts, stylesheets | [`AnySavings`]      | `candidate < original`           |
//! | images, webp         | [`Threshold(n)`]    | `original - candidate > n`       |
//! | markup               | [`Unconditional`]   | always (credits only real gains) |
//!
//! [`AnySavings`]: SavingsPolicy::AnySavings
//! [`Threshold(n)`]: SavingsPolicy::Threshold
//! [`Unconditional`]: SavingsPolicy::Unconditional

/// Savings policy for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavingsPolicy {
    /// Any strictly positive saving.
    AnySavings,
    /// Savings must exceed this many bytes.
    Threshold(u64),
    /// Always write the candidate; savings are credited when positive.
    Unconditional,
}

/// Outcome of [`SavingsPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub commit: bool,
    /// Bytes credited to the stage. Zero unless committed.
    pub saved: u64,
}

impl SavingsPolicy {
    pub fn decide(self, original: u64, candidate: u64) -> Decision {
        let diff = original.saturating_sub(candidate);
        let commit = match self {
            Self::AnySavings => candidate < original,
            Self::Threshold(min) => diff > min,
            Self::Unconditional => true,
        };
        Decision {
            commit,
            saved: if commit { diff } else { 0 },
        }
    }
}

/// Per-file transform outcome reported to the stage totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub original: u64,
    pub candidate: u64,
    pub decision: Decision,
}

impl Outcome {
    pub fn new(policy: SavingsPolicy, original: usize, candidate: usize) -> Self {
        let (original, candidate) = (original as u64, candidate as u64);
        Self {
            original,
            candidate,
            decision: policy.decide(original, candidate),
        }
    }

    /// A file left exactly as it was.
    pub const fn unchanged(size: usize) -> Self {
        Self {
            original: size as u64,
            candidate: size as u64,
            decision: Decision {
                commit: false,
                saved: 0,
            },
        }
    }

    #[inline]
    pub const fn committed(&self) -> bool {
        self.decision.commit
    }

    #[inline]
    pub const fn saved(&self) -> u64 {
        self.decision.saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MIN_SAVINGS_BYTES;

    const IMAGES: SavingsPolicy = SavingsPolicy::Threshold(DEFAULT_MIN_SAVINGS_BYTES);

    #[test]
    fn test_threshold_below_minimum_skips() {
        let d = IMAGES.decide(10_000, 9_900);
        assert_eq!(d, Decision { commit: false, saved: 0 });
    }

    #[test]
    fn test_threshold_above_minimum_commits() {
        let d = IMAGES.decide(10_000, 9_800);
        assert_eq!(d, Decision { commit: true, saved: 200 });
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!IMAGES.decide(10_000, 9_850).commit);
        assert!(IMAGES.decide(10_000, 9_849).commit);
    }

    #[test]
    fn test_larger_candidate_never_commits() {
        assert_eq!(IMAGES.decide(100, 400).saved, 0);
        assert!(!SavingsPolicy::AnySavings.decide(100, 400).commit);
    }

    #[test]
    fn test_any_savings() {
        let policy = SavingsPolicy::AnySavings;
        assert_eq!(policy.decide(500, 499), Decision { commit: true, saved: 1 });
        assert_eq!(policy.decide(500, 500), Decision { commit: false, saved: 0 });
    }

    #[test]
    fn test_unconditional_credits_only_gains() {
        let policy = SavingsPolicy::Unconditional;
        assert_eq!(policy.decide(500, 400), Decision { commit: true, saved: 100 });
        assert_eq!(policy.decide(500, 520), Decision { commit: true, saved: 0 });
    }

    #[test]
    fn test_outcome_new() {
        let outcome = Outcome::new(SavingsPolicy::AnySavings, 10, 4);
        assert!(outcome.committed());
        assert_eq!(outcome.saved(), 6);
        assert_eq!(outcome.candidate, 4);
        assert!(!Outcome::unchanged(10).committed());
    }
}
