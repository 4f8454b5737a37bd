use hopper_core::Field;
use hopper_host::{Dataset, HostContext, HostRuntime};
use tempfile::NamedTempFile;

/// A context wired to a fresh runtime, with a throwaway runtime library so
/// startup validation passes.
pub struct TestBed {
    pub runtime: HostRuntime,
    pub context: HostContext,
    _runtime_library: NamedTempFile,
}

pub fn test_bed(options_json: &str) -> TestBed {
    let runtime = HostRuntime::new();
    let runtime_library = NamedTempFile::new().expect("temp runtime library");
    let context = HostContext::new(
        runtime.clone(),
        "test",
        runtime_library.path().to_str().unwrap(),
        options_json,
    )
    .expect("context construction");
    TestBed {
        runtime,
        context,
        _runtime_library: runtime_library,
    }
}

/// Flatten a single-column dataset into its field values, in row order.
pub fn column_values(dataset: &Dataset) -> Vec<Field> {
    dataset
        .collect_rows()
        .expect("decode")
        .into_iter()
        .map(|row| {
            let fields = row.into_fields();
            assert_eq!(fields.len(), 1, "expected a single-column dataset");
            fields.into_iter().next().unwrap()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bed_constructs_a_working_context() {
        let bed = test_bed("{}");
        assert_eq!(bed.context.backend().name(), "test");
        assert_eq!(bed.runtime.live_references(), 0);
    }
}
