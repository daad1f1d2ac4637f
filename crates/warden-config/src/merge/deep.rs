use super::{ConfigLayer, FieldSources};

/// Recursively deep-merge `overlay` into `base`.
///
/// Tables merge per key. Scalars and arrays from the overlay replace the
/// base value.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                match base_table.get_mut(key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => {
                        base_table.insert(key.clone(), overlay_val.clone());
                    },
                }
            }
        },
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Deep-merge like [`deep_merge`], recording `layer` as the source of every
/// leaf the overlay sets.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join(prefix, key);
                match base_table.get_mut(key) {
                    Some(base_val) if overlay_val.is_table() => {
                        deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                    },
                    Some(base_val) => {
                        *base_val = overlay_val.clone();
                        sources.insert(path, layer);
                    },
                    None => {
                        base_table.insert(key.clone(), overlay_val.clone());
                        record_leaves(overlay_val, &path, layer, sources);
                    },
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            sources.insert(prefix.to_owned(), layer);
        },
    }
}

/// Record every leaf of `value` under `prefix` as set by `layer`.
///
/// Arrays count as leaves.
pub fn record_leaves(value: &toml::Value, prefix: &str, layer: ConfigLayer, sources: &mut FieldSources) {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                record_leaves(child, &join(prefix, key), layer, sources);
            }
        },
        _ => {
            sources.insert(prefix.to_owned(), layer);
        },
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_tables_merge_and_scalars_replace() {
        let mut base = parse("[gate]\nmax_iterations = 100\nmax_consecutive_engine_errors = 3\n");
        deep_merge(&mut base, &parse("[gate]\nmax_iterations = 20\n"));
        assert_eq!(base["gate"]["max_iterations"].as_integer(), Some(20));
        assert_eq!(base["gate"]["max_consecutive_engine_errors"].as_integer(), Some(3));
    }

    #[test]
    fn test_tracking_records_layer() {
        let mut base = parse("[operator]\nid = \"a\"\n");
        let mut sources = FieldSources::new();
        record_leaves(&base.clone(), "", ConfigLayer::Defaults, &mut sources);
        deep_merge_tracking(
            &mut base,
            &parse("[operator]\nid = \"b\"\n[audit]\ndirectory = \"x\"\n"),
            "",
            ConfigLayer::User,
            &mut sources,
        );
        assert_eq!(sources.get("operator.id"), Some(&ConfigLayer::User));
        assert_eq!(sources.get("audit.directory"), Some(&ConfigLayer::User));
    }
}
