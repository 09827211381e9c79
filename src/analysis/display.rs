//! Plain-text overview of a set of experiments

use std::collections::BTreeMap;
use std::io::Write;

use super::scores::truncate;
use super::{check_scope, stats};
use crate::experiment::ExperimentFrame;
use crate::scope::Scope;
use crate::Result;

/// Glyph for a signed rank correlation.
fn glyph(rho: f64) -> &'static str {
    match rho {
        r if r >= 0.6 => "++",
        r if r >= 0.2 => "+",
        r if r <= -0.6 => "--",
        r if r <= -0.2 => "-",
        _ => ".",
    }
}

/// Write a summary of `experiments` to `out`.
///
/// The summary has three parts: row counts by provenance, one line per
/// measure (count, min, mean, max of present values), and a matrix of
/// rank-correlation glyphs with one row per non-constant input and one
/// column per measure.
///
/// # Errors
///
/// Returns `ScopeMismatch` for a frame of another scope and `Io` if the
/// writer fails.
pub fn display_experiments<W: Write>(
    scope: &Scope,
    experiments: &ExperimentFrame,
    out: &mut W,
) -> Result<()> {
    check_scope(scope, experiments)?;

    let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
    for source in experiments.sources() {
        *by_source.entry(source.to_string()).or_default() += 1;
    }
    writeln!(
        out,
        "Scope {}: {} experiments",
        scope.name(),
        experiments.len()
    )?;
    for (source, count) in &by_source {
        writeln!(out, "  {source:<16} {count}")?;
    }

    let measures: Vec<(&str, &[f64])> = scope
        .measures()
        .iter()
        .filter_map(|m| experiments.column(m.name()).map(|c| (m.name(), c)))
        .collect();

    writeln!(out)?;
    writeln!(
        out,
        "{:<32} {:>8} {:>14} {:>14} {:>14}",
        "measure", "count", "min", "mean", "max"
    )?;
    for (name, values) in &measures {
        let sorted = stats::sorted_finite(values);
        let (min, max) = match (sorted.first(), sorted.last()) {
            (Some(lo), Some(hi)) => (*lo, *hi),
            _ => (f64::NAN, f64::NAN),
        };
        writeln!(
            out,
            "{:<32} {:>8} {:>14.4} {:>14.4} {:>14.4}",
            truncate(name, 32),
            sorted.len(),
            min,
            stats::finite_mean(values),
            max
        )?;
    }

    let inputs: Vec<(&str, &[f64])> = scope
        .parameters()
        .iter()
        .filter(|p| !p.is_constant())
        .filter_map(|p| experiments.column(p.name()).map(|c| (p.name(), c)))
        .collect();
    if inputs.is_empty() || measures.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    write!(out, "{:<24}", "input \\ measure")?;
    for (name, _) in &measures {
        write!(out, " {:>10}", truncate(name, 10))?;
    }
    writeln!(out)?;
    for (input, x) in &inputs {
        write!(out, "{:<24}", truncate(input, 24))?;
        for (_, y) in &measures {
            write!(out, " {:>10}", glyph(stats::spearman(x, y)))?;
        }
        writeln!(out)?;
    }
    Ok(())
}
