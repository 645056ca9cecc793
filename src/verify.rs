// src/verify.rs

use std::fmt;

use crate::{
    dataset::DatasetKind,
    error::LoadError,
    load::{LoadReport, Loader},
};

/// Result of loading one dataset during verification.
#[derive(Debug)]
pub enum Outcome {
    /// Loaded with exactly the documented number of communes.
    Verified(LoadReport),
    /// Loaded, but the row count differs (lenient mode).
    Mismatch(LoadReport),
    Failed(LoadError),
}

impl Outcome {
    pub fn dataset(&self) -> DatasetKind {
        match self {
            Outcome::Verified(r) | Outcome::Mismatch(r) => r.dataset,
            Outcome::Failed(e) => e.dataset(),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Outcome::Verified(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(..))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Verified(r) => write!(
                f,
                "✓ {}: {} communes ({}, {:.2?})",
                r.dataset,
                format_count(r.rows),
                r.source.as_str(),
                r.elapsed
            ),
            Outcome::Mismatch(r) => write!(
                f,
                "⚠ {}: {} communes, expected {} ({})",
                r.dataset,
                format_count(r.rows),
                format_count(r.expected),
                r.path.display()
            ),
            Outcome::Failed(e) => write!(f, "✗ {}", e),
        }
    }
}

/// One outcome per dataset, in documented order.
#[derive(Debug)]
pub struct VerificationSummary {
    outcomes: Vec<Outcome>,
}

impl VerificationSummary {
    /// Load all three datasets and classify each result.
    pub fn run(loader: &Loader) -> Self {
        let outcomes = loader
            .load_all()
            .into_iter()
            .map(|result| match result {
                Ok(loaded) if loaded.report.is_complete() => Outcome::Verified(loaded.report),
                Ok(loaded) => Outcome::Mismatch(loaded.report),
                Err(e) => Outcome::Failed(e),
            })
            .collect();
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Truth that every dataset loaded. Lenient mismatches only warn;
    /// strict mode reports them as failures.
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(Outcome::is_failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }
}

impl fmt::Display for VerificationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            writeln!(f, "{}", outcome)?;
        }
        let verified = self.outcomes.iter().filter(|o| o.is_verified()).count();
        write!(f, "{}/{} datasets verified", verified, self.outcomes.len())
    }
}

/// `34963` → `34,963`.
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
