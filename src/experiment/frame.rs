//! Experiment Frame - ordered experiment rows for one scope
//!
//! Values are held column-wise as `f64`. `NaN` marks a missing value and is
//! written to Arrow as null.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType as ArrowType, Field, Schema};
use arrow::record_batch::RecordBatch;

use super::Source;
use crate::scope::Scope;
use crate::{Error, Result};

/// Reserved column holding the experiment id.
pub const EXPERIMENT_ID_COLUMN: &str = "experiment_id";
/// Reserved column holding the provenance code.
pub const SOURCE_COLUMN: &str = "source";

/// One named column of values.
#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    values: Vec<f64>,
}

/// Ordered experiment rows: id, provenance, and named value columns.
///
/// Row order is insertion order and is preserved by every operation that
/// returns a new frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentFrame {
    scope_name: String,
    experiment_ids: Vec<u64>,
    sources: Vec<Source>,
    columns: Vec<Column>,
}

impl ExperimentFrame {
    /// Create an empty frame with the given column names.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for duplicate or reserved column names.
    pub fn new<S: AsRef<str>>(scope_name: impl Into<String>, columns: &[S]) -> Result<Self> {
        let mut frame = Self {
            scope_name: scope_name.into(),
            experiment_ids: Vec::new(),
            sources: Vec::new(),
            columns: Vec::with_capacity(columns.len()),
        };
        for name in columns {
            frame.add_column(name.as_ref(), Vec::new())?;
        }
        Ok(frame)
    }

    /// Name of the scope these rows belong to.
    #[must_use]
    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiment_ids.len()
    }

    /// True when the frame has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiment_ids.is_empty()
    }

    /// Experiment ids in row order.
    #[must_use]
    pub fn experiment_ids(&self) -> &[u64] {
        &self.experiment_ids
    }

    /// Provenance tags in row order.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// True if a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Values of a column, if present.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Values of a row in column order.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        (index < self.len()).then(|| self.columns.iter().map(|c| c.values[index]).collect())
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `values` does not have one entry per column.
    pub fn push_row(&mut self, experiment_id: u64, source: Source, values: &[f64]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(Error::InvalidInput(format!(
                "row has {} values, frame has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.experiment_ids.push(experiment_id);
        self.sources.push(source);
        for (column, &value) in self.columns.iter_mut().zip(values) {
            column.values.push(value);
        }
        Ok(())
    }

    /// Add a column with one value per existing row.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` on a length mismatch, duplicate or reserved name.
    pub fn add_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if name == EXPERIMENT_ID_COLUMN || name == SOURCE_COLUMN {
            return Err(Error::InvalidInput(format!("column name `{name}` is reserved")));
        }
        if self.has_column(name) {
            return Err(Error::InvalidInput(format!("duplicate column `{name}`")));
        }
        if values.len() != self.len() {
            return Err(Error::InvalidInput(format!(
                "column `{name}` has {} values, frame has {} rows",
                values.len(),
                self.len()
            )));
        }
        self.columns.push(Column {
            name: name.to_string(),
            values,
        });
        Ok(())
    }

    /// Overwrite every row's experiment id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` on a length mismatch.
    pub fn set_experiment_ids(&mut self, ids: Vec<u64>) -> Result<()> {
        if ids.len() != self.len() {
            return Err(Error::InvalidInput(format!(
                "{} ids for {} rows",
                ids.len(),
                self.len()
            )));
        }
        self.experiment_ids = ids;
        Ok(())
    }

    /// Tag every row with `source`.
    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.iter_mut().for_each(|s| *s = source);
        self
    }

    /// Rows whose mask entry is true, in order.
    #[must_use]
    pub fn filter(&self, mask: &[bool]) -> Self {
        let keep = |i: &usize| mask.get(*i).copied().unwrap_or(false);
        let idx: Vec<usize> = (0..self.len()).filter(keep).collect();
        self.take(&idx)
    }

    /// Rows produced by `source`.
    #[must_use]
    pub fn select_source(&self, source: Source) -> Self {
        let mask: Vec<bool> = self.sources.iter().map(|s| *s == source).collect();
        self.filter(&mask)
    }

    /// Rows with no missing value in any of `columns`.
    #[must_use]
    pub fn complete_rows(&self, columns: &[&str]) -> Self {
        let mask: Vec<bool> = (0..self.len())
            .map(|i| {
                columns
                    .iter()
                    .filter_map(|name| self.column(name))
                    .all(|values| !values[i].is_nan())
            })
            .collect();
        self.filter(&mask)
    }

    /// Keep only the named columns (in the given order), ignoring unknown names.
    #[must_use]
    pub fn project(&self, names: &[&str]) -> Self {
        let columns = names
            .iter()
            .filter_map(|name| self.columns.iter().find(|c| c.name == *name).cloned())
            .collect();
        Self {
            scope_name: self.scope_name.clone(),
            experiment_ids: self.experiment_ids.clone(),
            sources: self.sources.clone(),
            columns,
        }
    }

    /// Frame restricted to the scope's input columns that are present.
    #[must_use]
    pub fn inputs(&self, scope: &Scope) -> Self {
        self.project(&scope.parameter_names())
    }

    /// Append another frame's rows.
    ///
    /// Columns missing from either side are filled with `NaN`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` if the frames belong to different scopes.
    pub fn extend(&mut self, other: &Self) -> Result<()> {
        if other.scope_name != self.scope_name {
            return Err(Error::SchemaMismatch(format!(
                "cannot append rows of scope {} to scope {}",
                other.scope_name, self.scope_name
            )));
        }
        let before = self.len();
        for column in &other.columns {
            if !self.has_column(&column.name) {
                self.columns.push(Column {
                    name: column.name.clone(),
                    values: vec![f64::NAN; before],
                });
            }
        }
        for column in &mut self.columns {
            match other.column(&column.name) {
                Some(values) => column.values.extend_from_slice(values),
                None => column.values.resize(before + other.len(), f64::NAN),
            }
        }
        self.experiment_ids.extend_from_slice(&other.experiment_ids);
        self.sources.extend_from_slice(&other.sources);
        Ok(())
    }

    /// Check every column is declared by `scope`.
    ///
    /// # Errors
    ///
    /// Returns `ScopeMismatch` for a frame of another scope and
    /// `SchemaMismatch` for an undeclared column.
    pub fn validate_against(&self, scope: &Scope) -> Result<()> {
        if self.scope_name != scope.name() {
            return Err(Error::ScopeMismatch {
                expected: scope.name().to_string(),
                actual: self.scope_name.clone(),
            });
        }
        for column in &self.columns {
            if scope.parameter(&column.name).is_none() && scope.measure(&column.name).is_none() {
                return Err(Error::SchemaMismatch(format!(
                    "column `{}` is not declared by scope {}",
                    column.name,
                    scope.name()
                )));
            }
        }
        Ok(())
    }

    /// Coerce input columns to their declared dtypes.
    ///
    /// Integers are rounded, booleans become 0/1, categorical indices are
    /// range-checked. Measure columns are left as reals.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`validate_against`](Self::validate_against) and
    /// `SchemaMismatch` for an out-of-range category.
    pub fn ensure_dtypes(&self, scope: &Scope) -> Result<Self> {
        self.validate_against(scope)?;
        let mut out = self.clone();
        for column in &mut out.columns {
            if let Some(parameter) = scope.parameter(&column.name) {
                for value in &mut column.values {
                    *value = parameter.coerce(*value)?;
                }
            }
        }
        Ok(out)
    }

    /// Convert to an Arrow record batch.
    ///
    /// # Errors
    ///
    /// Returns `Arrow` if the batch cannot be assembled.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![
            Field::new(EXPERIMENT_ID_COLUMN, ArrowType::UInt64, false),
            Field::new(SOURCE_COLUMN, ArrowType::UInt32, false),
        ];
        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(UInt64Array::from(self.experiment_ids.clone())),
            Arc::new(UInt32Array::from_iter_values(
                self.sources.iter().map(|s| s.code()),
            )),
        ];
        for column in &self.columns {
            fields.push(Field::new(&column.name, ArrowType::Float64, true));
            let values: Float64Array = column
                .values
                .iter()
                .map(|v| (!v.is_nan()).then_some(*v))
                .collect();
            arrays.push(Arc::new(values));
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }

    /// Build a frame from an Arrow record batch.
    ///
    /// Value columns of any numeric type are cast to `Float64`; nulls become
    /// `NaN`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` if the reserved columns are missing or have
    /// the wrong type, `Arrow` if a cast fails.
    pub fn from_record_batch(scope_name: impl Into<String>, batch: &RecordBatch) -> Result<Self> {
        let schema = batch.schema();

        let ids = column_by_name(batch, EXPERIMENT_ID_COLUMN)?
            .as_any()
            .downcast_ref::<UInt64Array>()
            .ok_or_else(|| {
                Error::SchemaMismatch(format!("`{EXPERIMENT_ID_COLUMN}` must be UInt64"))
            })?
            .values()
            .to_vec();
        let sources = column_by_name(batch, SOURCE_COLUMN)?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| Error::SchemaMismatch(format!("`{SOURCE_COLUMN}` must be UInt32")))?
            .values()
            .iter()
            .map(|code| Source::from_code(*code))
            .collect();

        let mut columns = Vec::new();
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            if field.name() == EXPERIMENT_ID_COLUMN || field.name() == SOURCE_COLUMN {
                continue;
            }
            let cast = arrow::compute::cast(array, &ArrowType::Float64)?;
            let floats = cast
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    Error::Other(format!("`{}` did not cast to Float64", field.name()))
                })?;
            let values = (0..floats.len())
                .map(|i| {
                    if floats.is_null(i) {
                        f64::NAN
                    } else {
                        floats.value(i)
                    }
                })
                .collect();
            columns.push(Column {
                name: field.name().clone(),
                values,
            });
        }

        Ok(Self {
            scope_name: scope_name.into(),
            experiment_ids: ids,
            sources,
            columns,
        })
    }

    fn take(&self, idx: &[usize]) -> Self {
        Self {
            scope_name: self.scope_name.clone(),
            experiment_ids: idx.iter().map(|&i| self.experiment_ids[i]).collect(),
            sources: idx.iter().map(|&i| self.sources[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: idx.iter().map(|&i| c.values[i]).collect(),
                })
                .collect(),
        }
    }
}

fn column_by_name<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    let index = batch
        .schema()
        .index_of(name)
        .map_err(|_| Error::SchemaMismatch(format!("missing column `{name}`")))?;
    Ok(batch.column(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Measure, Parameter, ParameterType};

    fn scope() -> Scope {
        Scope::builder("s")
            .parameter(Parameter::real("x", ParameterType::Uncertainty, 0.0, 1.0))
            .parameter(Parameter::integer("n", ParameterType::Lever, 0, 10))
            .measure(Measure::new("y"))
            .build()
            .unwrap()
    }

    fn frame() -> ExperimentFrame {
        let mut f = ExperimentFrame::new("s", &["x", "n", "y"]).unwrap();
        f.push_row(1, Source::CoreModel, &[0.1, 2.4, 1.0]).unwrap();
        f.push_row(2, Source::CoreModel, &[0.2, 3.6, f64::NAN]).unwrap();
        f.push_row(3, Source::MetaModel(1), &[0.3, 5.0, 3.0]).unwrap();
        f
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut f = ExperimentFrame::new("s", &["x"]).unwrap();
        assert!(f.push_row(1, Source::CoreModel, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_reserved_column_rejected() {
        assert!(ExperimentFrame::new("s", &[SOURCE_COLUMN]).is_err());
    }

    #[test]
    fn test_select_source_and_complete_rows() {
        let f = frame();
        assert_eq!(f.select_source(Source::CoreModel).len(), 2);
        assert_eq!(f.select_source(Source::MetaModel(1)).experiment_ids(), &[3]);
        assert_eq!(f.complete_rows(&["y"]).experiment_ids(), &[1, 3]);
    }

    #[test]
    fn test_ensure_dtypes_rounds_integers() {
        let f = frame().ensure_dtypes(&scope()).unwrap();
        assert_eq!(f.column("n").unwrap(), &[2.0, 4.0, 5.0]);
        assert!(f.column("y").unwrap()[1].is_nan());
    }

    #[test]
    fn test_ensure_dtypes_rejects_unknown_column() {
        let mut f = frame();
        f.add_column("extra", vec![0.0; 3]).unwrap();
        assert!(matches!(
            f.ensure_dtypes(&scope()),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_record_batch_preserves_nulls_and_sources() {
        let f = frame();
        let batch = f.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 5);

        let back = ExperimentFrame::from_record_batch("s", &batch).unwrap();
        assert_eq!(back.sources(), f.sources());
        assert!(back.column("y").unwrap()[1].is_nan());
        assert_eq!(back.column_names(), vec!["x", "n", "y"]);
    }

    #[test]
    fn test_extend_fills_missing_columns() {
        let mut a = ExperimentFrame::new("s", &["x"]).unwrap();
        a.push_row(1, Source::CoreModel, &[0.5]).unwrap();
        let mut b = ExperimentFrame::new("s", &["x", "y"]).unwrap();
        b.push_row(2, Source::CoreModel, &[0.6, 9.0]).unwrap();

        a.extend(&b).unwrap();
        assert_eq!(a.len(), 2);
        assert!(a.column("y").unwrap()[0].is_nan());
        assert!((a.column("y").unwrap()[1] - 9.0).abs() < f64::EPSILON);
    }
}
