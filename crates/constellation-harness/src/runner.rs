//! Campaign execution: derive a catalog, scan it, and log what happens.

use std::time::Instant;

use constellation_core::{
    Catalog, CatalogEntry, CatalogSpec, Checkpoint, DeriveFailure, EliminationEngine, Finding,
    Scanner, VerificationResult,
};

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

/// Values between progress checkpoints when a checkpoint sink is attached.
pub const CHECKPOINT_STRIDE: u64 = 10_000;

/// A named derive-then-verify run.
pub struct Campaign {
    pub name: String,
    pub config: HarnessConfig,
    log: Option<LogEmitter>,
}

impl Campaign {
    #[must_use]
    pub fn new(name: impl Into<String>, config: HarnessConfig) -> Self {
        Self {
            name: name.into(),
            config,
            log: None,
        }
    }

    #[must_use]
    pub fn with_log(mut self, emitter: LogEmitter) -> Self {
        self.log = Some(emitter);
        self
    }

    /// Derive every family in `spec`, logging each outcome.
    pub fn derive(&mut self, spec: &CatalogSpec) -> Result<Catalog> {
        for family in &spec.families {
            self.log_with(LogLevel::Info, "derive_start", |e| e.with_family(family.name()))?;
        }

        let engine = EliminationEngine::from_config(&self.config.elimination());
        let mut durations = Vec::with_capacity(spec.families.len());
        let mut started = Instant::now();
        let catalog = Catalog::derive_all_with(spec, &engine, |_| {
            durations.push(millis_since(started));
            started = Instant::now();
        });

        for (entry, elapsed) in catalog.entries().iter().zip(durations) {
            match entry {
                CatalogEntry::Derived(d) => {
                    let details = serde_json::json!({
                        "detector": d.detector.to_string(),
                        "degree_in_m": d.diagnostics.degree_in_m,
                        "basis_size": d.basis_size,
                        "fingerprint": d.diagnostics.fingerprint,
                    });
                    self.log_with(LogLevel::Info, "derive_ok", |e| {
                        e.with_family(d.name())
                            .with_outcome(Outcome::Pass)
                            .with_duration_ms(elapsed)
                            .with_details(details)
                    })?;
                }
                CatalogEntry::Failed { family, failure } => {
                    let reason = match failure {
                        DeriveFailure::NoDetector { reason, .. } => reason.to_string(),
                        DeriveFailure::Invalid(err) => err.to_string(),
                    };
                    self.log_with(LogLevel::Warn, "derive_no_detector", |e| {
                        e.with_family(family.clone())
                            .with_outcome(Outcome::Skip)
                            .with_duration_ms(elapsed)
                            .with_details(serde_json::json!({ "reason": reason }))
                    })?;
                }
            }
        }
        Ok(catalog)
    }

    /// Scan `catalog` to the configured limit, optionally resuming from and
    /// periodically handing out checkpoints.
    pub fn verify<F>(
        &mut self,
        catalog: &Catalog,
        resume: Option<Checkpoint>,
        mut on_checkpoint: F,
    ) -> Result<VerificationResult>
    where
        F: FnMut(&Checkpoint) -> Result<()>,
    {
        let mut scanner = match resume {
            Some(checkpoint) => Scanner::resume(catalog, checkpoint)?,
            None => Scanner::new(catalog, self.config.scan_limit, self.config.scan_options())?,
        };
        let details = serde_json::json!({
            "from": scanner.next_n(),
            "limit": scanner.result().limit,
            "families": catalog.detectors().count(),
            "check_false_negatives": scanner.options().check_false_negatives,
        });
        self.log_with(LogLevel::Info, "scan_start", |e| e.with_details(details))?;

        let started = Instant::now();
        let mut findings = Vec::new();
        while !scanner.is_finished() {
            let stop = scanner.next_n().saturating_add(CHECKPOINT_STRIDE - 1);
            scanner.step_to_with(stop, |finding| findings.push(owned(finding)))?;
            for finding in findings.drain(..) {
                self.log_finding(&finding)?;
            }
            on_checkpoint(&scanner.checkpoint())?;
        }
        let elapsed = millis_since(started);

        let result = scanner.result().clone();
        for (name, report) in &result.families {
            let outcome = if report.is_clean() {
                Outcome::Pass
            } else {
                Outcome::Fail
            };
            let details = serde_json::json!({
                "hits": report.hits,
                "confirmed": report.confirmed,
                "false_positives": report.false_positives.len(),
                "false_negatives": report.false_negatives.len(),
            });
            self.log_with(LogLevel::Info, "scan_done", |e| {
                e.with_family(name.clone())
                    .with_outcome(outcome)
                    .with_duration_ms(elapsed)
                    .with_details(details)
            })?;
        }
        if let Some(log) = self.log.as_mut() {
            log.flush()?;
        }
        Ok(result)
    }

    fn log_finding(&mut self, finding: &OwnedFinding) -> Result<()> {
        let (event, family, n, m) = match finding {
            OwnedFinding::FalsePositive { family, n, m } => ("false_positive", family, *n, *m),
            OwnedFinding::FalseNegative { family, n, m } => ("false_negative", family, *n, *m),
        };
        self.log_with(LogLevel::Warn, event, |e| {
            e.with_family(family.clone())
                .with_point(n, m)
                .with_outcome(Outcome::Fail)
        })
    }

    fn log_with<F>(&mut self, level: LogLevel, event: &str, build: F) -> Result<()>
    where
        F: FnOnce(LogEntry) -> LogEntry,
    {
        if let Some(log) = self.log.as_mut() {
            let entry = build(log.entry(level, event));
            log.emit_entry(entry)?;
        }
        Ok(())
    }
}

enum OwnedFinding {
    FalsePositive { family: String, n: u64, m: u128 },
    FalseNegative { family: String, n: u64, m: u128 },
}

fn owned(finding: Finding<'_>) -> OwnedFinding {
    match finding {
        Finding::FalsePositive { family, n, m } => OwnedFinding::FalsePositive {
            family: family.to_string(),
            n,
            m,
        },
        Finding::FalseNegative { family, n, m } => OwnedFinding::FalseNegative {
            family: family.to_string(),
            n,
            m,
        },
    }
}

fn millis_since(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
