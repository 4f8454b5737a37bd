use crate::dataset::Dataset;
use crate::error::{HostError, Result};
use crate::infer::build_row_type_from_samples;
use crate::options::ContextOptions;
use crate::util::expand_glob;
use ahash::RandomState;
use hopper_core::{Field, MemoryDriver, Partition, PartitionSink, Row, Schema, Type};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The engine-side context the host hands work to.
///
/// It owns the partition allocator and the option store, turns prebuilt rows
/// or file contents into partition chains, and wraps everything into
/// [`Dataset`] handles.
#[derive(Debug)]
pub struct BackendContext {
    options: ContextOptions,
    driver: MemoryDriver,
    name: String,
}

impl BackendContext {
    pub fn new(options: ContextOptions) -> BackendContext {
        let driver = MemoryDriver::new(options.partition_size());
        BackendContext {
            options,
            driver,
            name: String::new(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn driver(&self) -> &MemoryDriver {
        &self.driver
    }

    /// Wrap a finished partition chain into a dataset.
    pub fn from_partitions(
        &self,
        schema: Arc<Schema>,
        partitions: Vec<Partition>,
        columns: Vec<String>,
    ) -> Dataset {
        debug_assert!(partitions.iter().all(|p| Arc::ptr_eq(p.schema(), &schema)));
        Dataset::Normal {
            schema,
            partitions,
            columns,
        }
    }

    /// Serialize prebuilt rows into partitions and wrap them.
    pub fn parallelize_rows(
        &self,
        row_type: Type,
        rows: Vec<Row>,
        columns: Vec<String>,
    ) -> Result<Dataset> {
        let schema = Arc::new(Schema::row(row_type));
        if rows.is_empty() {
            return Ok(self.from_partitions(schema, Vec::new(), columns));
        }
        let mut sink = PartitionSink::new(
            &self.driver,
            Arc::clone(&schema),
            self.options.partition_size(),
        )?;
        for row in &rows {
            sink.append_row(row)?;
        }
        Ok(self.from_partitions(schema, sink.finish(), columns))
    }

    /// Produce the distinguished error dataset.
    pub fn make_error(&self, message: impl Into<String>) -> Dataset {
        Dataset::error(message)
    }

    /// Ingest delimited text files matching `pattern`.
    ///
    /// `header` of `None` means autodetect; type hints override the sampled
    /// column types by position or by column name.
    #[allow(clippy::too_many_arguments)]
    pub fn csv(
        &self,
        pattern: &str,
        columns: Vec<String>,
        header: Option<bool>,
        delimiter: Option<char>,
        quotechar: char,
        null_values: &[String],
        index_hints: &HashMap<usize, Type>,
        column_hints: &HashMap<String, Type>,
    ) -> Result<Dataset> {
        let files = expand_glob(pattern)?;
        if files.is_empty() {
            return Err(HostError::invalid_argument(format!(
                "no files found for pattern '{}'",
                pattern
            )));
        }

        let delimiter = match delimiter {
            Some(d) => d,
            None => sniff_delimiter(&files[0])?,
        };
        debug!("reading {} delimited files with '{}'", files.len(), delimiter);

        let mut records: Vec<Vec<String>> = Vec::new();
        for file in &files {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .delimiter(delimiter as u8)
                .quote(quotechar as u8)
                .from_path(file)?;
            for record in reader.records() {
                let record = record?;
                records.push(record.iter().map(str::to_string).collect());
            }
        }
        if records.is_empty() {
            return Ok(self.from_partitions(
                Arc::new(Schema::row(Type::make_tuple(vec![Type::Str]))),
                Vec::new(),
                columns,
            ));
        }

        let has_header = match header {
            Some(explicit) => explicit,
            None => looks_like_header(&records, null_values),
        };
        let mut columns = columns;
        if has_header {
            let head = records.remove(0);
            if columns.is_empty() {
                columns = head;
            }
        }

        if records.is_empty() {
            // header-only input: all we know about the columns is their names
            let column_types = vec![Type::Str; columns.len()];
            return self.parallelize_rows(Type::make_tuple(column_types), Vec::new(), columns);
        }

        let arity = records.first().map_or(columns.len(), Vec::len);
        let sample_rows = records.len().min(self.options.csv_max_detection_rows());
        let mut column_types = Vec::with_capacity(arity);
        for j in 0..arity {
            let mut histogram: HashMap<Type, usize, RandomState> = HashMap::default();
            for record in records.iter().take(sample_rows) {
                let cell = record.get(j).map(String::as_str).unwrap_or_default();
                *histogram.entry(classify_cell(cell, null_values)).or_insert(0) += 1;
            }
            let mut ty = build_row_type_from_samples(
                &histogram,
                sample_rows,
                self.options.optional_threshold(),
            );
            if let Some(hint) = index_hints.get(&j) {
                ty = hint.clone();
            }
            if let Some(hint) = columns.get(j).and_then(|c| column_hints.get(c)) {
                ty = hint.clone();
            }
            column_types.push(ty);
        }
        let row_type = Type::make_tuple(column_types.clone());

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if record.len() != arity {
                return Err(HostError::invalid_argument(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    record.len(),
                    arity
                )));
            }
            let fields = record
                .iter()
                .zip(column_types.iter())
                .map(|(cell, ty)| parse_cell(cell, ty, null_values))
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row::new(row_type.clone(), fields)?);
        }

        info!("parsed {} rows from {} files", rows.len(), files.len());
        self.parallelize_rows(row_type, rows, columns)
    }

    /// Ingest plain text files matching `pattern`, one row per line. Lines
    /// listed in `null_values` become nulls, making the column optional.
    pub fn text(&self, pattern: &str, null_values: &[String]) -> Result<Dataset> {
        let files = expand_glob(pattern)?;
        if files.is_empty() {
            return Err(HostError::invalid_argument(format!(
                "no files found for pattern '{}'",
                pattern
            )));
        }

        let mut lines: Vec<Option<String>> = Vec::new();
        for file in &files {
            let contents = std::fs::read_to_string(file)?;
            for line in contents.lines() {
                if null_values.iter().any(|n| n == line) {
                    lines.push(None);
                } else {
                    lines.push(Some(line.to_string()));
                }
            }
        }

        let row_type = if lines.iter().any(Option::is_none) {
            Type::make_option(Type::Str)
        } else {
            Type::Str
        };
        let rows = lines
            .into_iter()
            .map(|line| {
                let field = match line {
                    Some(text) => Field::Str(text.into()),
                    None => Field::Null,
                };
                Ok(Row::new(row_type.clone(), vec![field])?)
            })
            .collect::<Result<Vec<_>>>()?;

        info!("read {} lines from {} files", rows.len(), files.len());
        self.parallelize_rows(row_type, rows, Vec::new())
    }
}

/// Pick the separator that splits the first line most often.
fn sniff_delimiter(file: &Path) -> Result<char> {
    let contents = std::fs::read_to_string(file)?;
    let first_line = contents.lines().next().unwrap_or_default();
    let mut best = ',';
    let mut best_count = 0;
    for candidate in [',', ';', '\t', '|'] {
        let count = first_line.matches(candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    Ok(best)
}

/// A first row of pure text cells over a first data row that parses to
/// something else is taken as a header.
fn looks_like_header(records: &[Vec<String>], null_values: &[String]) -> bool {
    let (first, rest) = match records.split_first() {
        Some(split) => split,
        None => return false,
    };
    let second = match rest.first() {
        Some(second) => second,
        None => return false,
    };
    first
        .iter()
        .all(|cell| classify_cell(cell, null_values) == Type::Str)
        && second
            .iter()
            .any(|cell| classify_cell(cell, null_values) != Type::Str)
}

fn classify_cell(cell: &str, null_values: &[String]) -> Type {
    if null_values.iter().any(|n| n == cell) {
        return Type::Null;
    }
    if cell == "true" || cell == "false" {
        return Type::Bool;
    }
    if cell.parse::<i64>().is_ok() {
        return Type::I64;
    }
    if cell.parse::<f64>().is_ok() {
        return Type::F64;
    }
    Type::Str
}

fn parse_cell(cell: &str, ty: &Type, null_values: &[String]) -> Result<Field> {
    if null_values.iter().any(|n| n == cell) {
        return match ty {
            Type::Option(_) | Type::Null => Ok(Field::Null),
            other => Err(HostError::invalid_argument(format!(
                "null value in non-nullable column of type {}",
                other
            ))),
        };
    }
    let effective = match ty {
        Type::Option(inner) => inner.as_ref(),
        other => other,
    };
    let parse_error = || {
        HostError::invalid_argument(format!("value '{}' does not parse as {}", cell, effective))
    };
    match effective {
        Type::Bool => match cell {
            "true" => Ok(Field::Bool(true)),
            "false" => Ok(Field::Bool(false)),
            _ => Err(parse_error()),
        },
        Type::I64 => cell.parse().map(Field::Int).map_err(|_| parse_error()),
        Type::F64 => cell
            .parse::<f64>()
            .map(|v| Field::Float(v.into()))
            .map_err(|_| parse_error()),
        Type::Str => Ok(Field::Str(cell.into())),
        other => Err(HostError::unsupported(format!(
            "no delimited-text decoding for column type {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_classification() {
        let nulls = vec!["NA".to_string()];
        assert_eq!(classify_cell("12", &nulls), Type::I64);
        assert_eq!(classify_cell("1.5", &nulls), Type::F64);
        assert_eq!(classify_cell("true", &nulls), Type::Bool);
        assert_eq!(classify_cell("NA", &nulls), Type::Null);
        assert_eq!(classify_cell("hello", &nulls), Type::Str);
    }

    #[test]
    fn test_parse_cell_respects_options() {
        let nulls = vec![String::new()];
        let ty = Type::make_option(Type::I64);
        assert_eq!(parse_cell("4", &ty, &nulls).unwrap(), Field::Int(4));
        assert_eq!(parse_cell("", &ty, &nulls).unwrap(), Field::Null);
        assert!(parse_cell("", &Type::I64, &nulls).is_err());
        assert!(parse_cell("x", &Type::I64, &nulls).is_err());
    }

    #[test]
    fn test_header_heuristic() {
        let nulls = Vec::new();
        let with_header = vec![
            vec!["id".to_string(), "name".to_string()],
            vec!["1".to_string(), "ada".to_string()],
        ];
        assert!(looks_like_header(&with_header, &nulls));

        let no_header = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string(), "d".to_string()],
        ];
        assert!(!looks_like_header(&no_header, &nulls));
    }

    #[test]
    fn test_parallelize_rows_empty_input() {
        let backend = BackendContext::new(ContextOptions::defaults());
        let ds = backend
            .parallelize_rows(Type::I64, Vec::new(), Vec::new())
            .unwrap();
        assert!(!ds.is_error());
        assert_eq!(ds.num_rows(), 0);
        assert!(ds.partitions().is_empty());
    }
}
