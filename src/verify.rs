// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::collections::BTreeMap;

use tracing::warn;

use crate::lick::{Lick, LickBook};
use crate::metronome::TimeSignature;
use crate::samples::SampleLibrary;

/// Severity level for a verification issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A single verification issue found during checking.
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: Severity,
    pub category: &'static str,
    pub lick_name: String,
    pub message: String,
}

/// Result of verifying a set of licks.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub issues: Vec<Issue>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: VerificationReport) {
        self.issues.extend(other.issues);
    }
}

fn issue(severity: Severity, category: &'static str, lick: &Lick, message: String) -> Issue {
    Issue {
        severity,
        category,
        lick_name: lick.name.clone(),
        message,
    }
}

/// Checks a single lick on its own: it must have events, every event must last a
/// positive number of beats and the time signature must parse.
pub fn check_lick(lick: &Lick) -> Vec<Issue> {
    let mut issues = Vec::new();
    if lick.lick_data.is_empty() {
        issues.push(issue(
            Severity::Error,
            "empty",
            lick,
            "lick has no notes".to_string(),
        ));
    }

    for (i, event) in lick.lick_data.iter().enumerate() {
        if event.validate().is_err() {
            issues.push(issue(
                Severity::Error,
                "duration",
                lick,
                format!(
                    "event {} (\"{}\") has invalid duration {}",
                    i, event.label, event.duration_beats
                ),
            ));
        }
    }

    if let Some(time_signature) = &lick.time_signature {
        if time_signature.parse::<TimeSignature>().is_err() {
            issues.push(issue(
                Severity::Warning,
                "time-signature",
                lick,
                format!("time signature \"{}\" is malformed, 4/4 will be used", time_signature),
            ));
        }
    }

    issues
}

/// Returns an issue for each distinct tab in the lick that has no sample in the
/// library. Such tabs play as rests.
pub fn check_samples(lick: &Lick, library: &SampleLibrary) -> Vec<Issue> {
    let mut missing: Vec<&str> = lick
        .lick_data
        .iter()
        .filter(|event| !event.is_rest() && library.get(&event.label).is_none())
        .map(|event| event.label.as_str())
        .collect();
    missing.sort();
    missing.dedup();

    let key = library.key().unwrap_or("none");
    missing
        .into_iter()
        .map(|tab| {
            issue(
                Severity::Warning,
                "samples",
                lick,
                format!("tab \"{}\" has no sample in key {}, it will play as a rest", tab, key),
            )
        })
        .collect()
}

/// Checks every lick in the book, and against the library if one is given.
pub fn check_all(book: &LickBook, library: Option<&SampleLibrary>) -> VerificationReport {
    let mut report = VerificationReport::default();
    for lick in book.all() {
        report.issues.extend(check_lick(lick));
        if let Some(library) = library {
            report.issues.extend(check_samples(lick, library));
        }
    }
    report
}

/// Logs warnings for any tabs in the lick that have no sample.
/// Intended to be called right before playback starts.
pub fn warn_missing_samples(lick: &Lick, library: &SampleLibrary) {
    let missing = check_samples(lick, library);
    if !missing.is_empty() {
        warn!(
            lick = %lick.name,
            key = library.key().unwrap_or("none"),
            "Lick has {} tab(s) with no sample; these will be silent",
            missing.len()
        );
    }
}

/// Prints a verification report grouped by lick name.
pub fn print_report(report: &VerificationReport, book: &LickBook) {
    if report.is_clean() {
        println!("\u{2705} All {} lick(s) passed verification.", book.len());
        return;
    }

    // Group issues by lick name.
    let mut by_lick: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
    for issue in &report.issues {
        by_lick.entry(&issue.lick_name).or_default().push(issue);
    }

    let clean_count = book
        .all()
        .iter()
        .filter(|lick| !by_lick.contains_key(lick.name.as_str()))
        .count();

    for (lick_name, issues) in &by_lick {
        let has_errors = issues.iter().any(|i| i.severity == Severity::Error);
        let icon = if has_errors {
            "\u{274c}"
        } else {
            "\u{26a0}\u{fe0f} "
        };
        println!("{} {}", icon, lick_name);
        for issue in issues {
            let severity_icon = match issue.severity {
                Severity::Warning => "\u{26a0}\u{fe0f} ",
                Severity::Error => "\u{274c}",
            };
            println!(
                "   {} [{}] {}",
                severity_icon, issue.category, issue.message
            );
        }
    }

    if clean_count > 0 {
        println!("\n\u{2705} {} lick(s) passed all checks.", clean_count);
    }

    println!(
        "\nSummary: {} issue(s) found across {} lick(s).",
        report.issues.len(),
        by_lick.len()
    );
}
