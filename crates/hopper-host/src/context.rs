use crate::backend::BackendContext;
use crate::columns::infer_columns_from_dicts;
use crate::dataset::Dataset;
use crate::encode::{
    dict_transfer, fast_bool_transfer, fast_f64_transfer, fast_i64_transfer, fast_str_transfer,
    fast_tuple_transfer, slow_transfer, Quarantine,
};
use crate::error::{HostError, Result};
use crate::infer::infer_type;
use crate::options::{ContextOptions, KEY_RUNTIME_LIBRARY};
use crate::runtime::{HostRuntime, ObjectRef};
use crate::util::{expand_glob, format_size, pluralize};
use hopper_core::Type;
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The host-facing ingestion context.
///
/// This is the single entry point the scripting front-end talks to: it
/// normalizes caller arguments, infers or decodes the normal-case row type,
/// picks an encoder, collects quarantined rows and wraps the produced
/// partitions into a [`Dataset`].
///
/// Locking: [`HostContext::parallelize`] holds the runtime lock for the whole
/// transfer, since every step inspects host objects. The file sources take no
/// host values at all, so they run entirely outside the lock; that is this
/// port's shape of "release the runtime lock around long backend calls".
#[derive(Debug)]
pub struct HostContext {
    runtime: HostRuntime,
    backend: BackendContext,
}

impl HostContext {
    /// Create a context against a host runtime.
    ///
    /// `runtime_library`, when non-empty, overrides the configured library
    /// path. The path is validated here; a missing runtime library is the one
    /// failure that raises instead of producing an error dataset.
    pub fn new(
        runtime: HostRuntime,
        name: &str,
        runtime_library: &str,
        options_json: &str,
    ) -> Result<HostContext> {
        let mut options = ContextOptions::defaults();
        if !runtime_library.is_empty() {
            options.set(KEY_RUNTIME_LIBRARY, runtime_library);
        }
        options.update_from_json(options_json)?;

        let path = options.runtime_library();
        if path.as_os_str().is_empty() || !path.exists() {
            return Err(HostError::startup(format!(
                "could not find runtime library under '{}'",
                path.display()
            )));
        }
        // pin the resolved path so no searching happens again later
        let resolved = path.canonicalize().unwrap_or(path);
        debug!("using runtime library from {}", resolved.display());
        options.set(KEY_RUNTIME_LIBRARY, resolved.to_string_lossy());

        let mut backend = BackendContext::new(options);
        if !name.is_empty() {
            backend.set_name(name);
        }
        Ok(HostContext { runtime, backend })
    }

    pub fn runtime(&self) -> &HostRuntime {
        &self.runtime
    }

    pub fn backend(&self) -> &BackendContext {
        &self.backend
    }

    /// Snapshot of the option store.
    pub fn options(&self) -> BTreeMap<String, String> {
        self.backend.options().store().clone()
    }

    /// Transfer an in-memory sequence of host values to the backend.
    ///
    /// The row type is the caller-supplied schema when given, otherwise the
    /// inferred normal-case type of the sample. Values that do not conform
    /// are quarantined, never fatal; caller mistakes come back as an error
    /// dataset rather than raising.
    pub fn parallelize(
        &self,
        seq: &[ObjectRef],
        columns: Option<Vec<String>>,
        schema: Option<&Type>,
    ) -> Dataset {
        let mut quarantine: Quarantine = Vec::new();
        let guard = self.runtime.lock();
        let options = self.backend.options();
        let auto_upcast = options.auto_upcast_numbers();
        let optional_threshold = options.optional_threshold();
        let normalcase_threshold = options.normalcase_threshold();
        let timer = Instant::now();
        info!("transferring {} elements to the backend", seq.len());

        let mut columns = columns.unwrap_or_default();
        let mut maj_type = match schema {
            Some(row_type) => row_type.clone(),
            None => infer_type(seq, &guard, optional_threshold),
        };

        let result: Result<Dataset> = (|| {
            // string-keyed mappings unpack into one column per key
            if maj_type.is_dict()
                && maj_type != Type::EmptyDict
                && maj_type != Type::GenericDict
                && maj_type.key_type() == Some(&Type::Str)
            {
                let dict_types = infer_columns_from_dicts(
                    seq,
                    &guard,
                    normalcase_threshold,
                    optional_threshold,
                )?;
                if columns.is_empty() {
                    columns = dict_types.keys().cloned().collect();
                }
                let types: Vec<Type> = columns
                    .iter()
                    .map(|column| match dict_types.get(column) {
                        Some(ty) => ty.clone(),
                        None => {
                            warn!(
                                "column {} not found in sample, assuming type any for it",
                                column
                            );
                            Type::Any
                        }
                    })
                    .collect();
                maj_type = Type::make_tuple(types);
                debug!("unpacking mapping rows into columns [{}]", columns.iter().join(", "));
                return dict_transfer(
                    &self.backend,
                    &guard,
                    seq,
                    &maj_type,
                    &columns,
                    &mut quarantine,
                );
            }

            let width = if maj_type.is_tuple() {
                maj_type.params().len()
            } else {
                1
            };
            if !columns.is_empty() && columns.len() != width {
                return Ok(self.backend.make_error(format!(
                    "{} given for rows of width {}",
                    pluralize(columns.len(), "column name"),
                    width
                )));
            }

            match &maj_type {
                Type::Bool => {
                    fast_bool_transfer(&self.backend, &guard, seq, columns.clone(), &mut quarantine)
                }
                Type::I64 => fast_i64_transfer(
                    &self.backend,
                    &guard,
                    seq,
                    columns.clone(),
                    auto_upcast,
                    &mut quarantine,
                ),
                Type::F64 => fast_f64_transfer(
                    &self.backend,
                    &guard,
                    seq,
                    columns.clone(),
                    auto_upcast,
                    &mut quarantine,
                ),
                Type::Str => {
                    fast_str_transfer(&self.backend, &guard, seq, columns.clone(), &mut quarantine)
                }
                row_type if row_type.is_simple_scalar_tuple() => fast_tuple_transfer(
                    &self.backend,
                    &guard,
                    seq,
                    row_type,
                    columns.clone(),
                    &mut quarantine,
                ),
                _ => {
                    if maj_type == Type::Unknown {
                        error!("unknown type detected as default type, can't process normal case");
                    }
                    slow_transfer(
                        &self.backend,
                        &self.runtime,
                        &guard,
                        seq,
                        &maj_type,
                        columns.clone(),
                        &mut quarantine,
                    )
                }
            }
        })();

        let dataset = match result {
            Ok(dataset) => dataset,
            Err(err) => self.backend.make_error(err.to_string()),
        };

        info!("inferred default type is {}", maj_type);
        if !dataset.is_error() {
            info!(
                "data transfer to backend took {:.3}s (materialized: {})",
                timer.elapsed().as_secs_f64(),
                format_size(dataset.size_in_memory())
            );
        }

        if !quarantine.is_empty() {
            warn!(
                "found {} not complying with inferred type {}, ignoring for now",
                pluralize(quarantine.len(), "row"),
                maj_type
            );
            // single drain point: releasing these references is the last
            // thing that happens to quarantined rows for now
            quarantine.clear();
        }

        drop(guard);
        dataset
    }

    /// Ingest delimited text files. Caller mistakes and reader failures come
    /// back as error datasets.
    #[allow(clippy::too_many_arguments)]
    pub fn csv(
        &self,
        pattern: &str,
        columns: Option<Vec<String>>,
        autodetect_header: bool,
        header: bool,
        delimiter: &str,
        quotechar: &str,
        null_values: &[String],
        index_hints: &HashMap<usize, Type>,
        column_hints: &HashMap<String, Type>,
    ) -> Dataset {
        if self.runtime.interrupted() {
            return self.backend.make_error("job aborted via signal");
        }
        let quote = match quotechar.chars().next() {
            Some(quote) if quotechar.chars().count() == 1 => quote,
            _ => {
                return self
                    .backend
                    .make_error("quote character must be exactly one character")
            }
        };
        if delimiter.chars().count() > 1 {
            return self
                .backend
                .make_error("delimiter must be empty or a single character");
        }

        let header = if autodetect_header { None } else { Some(header) };
        let result = self.backend.csv(
            pattern,
            columns.unwrap_or_default(),
            header,
            delimiter.chars().next(),
            quote,
            null_values,
            index_hints,
            column_hints,
        );
        result.unwrap_or_else(|err| {
            error!("{}", err);
            self.backend.make_error(err.to_string())
        })
    }

    /// Ingest plain text files, one row per line.
    pub fn text(&self, pattern: &str, null_values: &[String]) -> Dataset {
        if self.runtime.interrupted() {
            return self.backend.make_error("job aborted via signal");
        }
        let result = self.backend.text(pattern, null_values);
        result.unwrap_or_else(|err| {
            error!("{}", err);
            self.backend.make_error(err.to_string())
        })
    }

    /// List files matching a pattern.
    pub fn ls(&self, pattern: &str) -> Result<Vec<String>> {
        let timer = Instant::now();
        let paths = expand_glob(pattern)?;
        let listed: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        info!(
            "listed {} in {:.3}s",
            pluralize(listed.len(), "file"),
            timer.elapsed().as_secs_f64()
        );
        Ok(listed)
    }

    /// Remove files matching a pattern. Individual failures are logged, not
    /// raised.
    pub fn rm(&self, pattern: &str) -> Result<()> {
        let timer = Instant::now();
        for path in expand_glob(pattern)? {
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            if removed.is_err() {
                error!("failed to remove files from {}", path.display());
            }
        }
        info!("removed files in {:.3}s", timer.elapsed().as_secs_f64());
        Ok(())
    }

    /// Copy files matching a pattern.
    pub fn cp(&self, _pattern: &str, _target: &str) -> Result<()> {
        Err(HostError::unsupported("not yet supported"))
    }
}
