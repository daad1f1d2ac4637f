/// Named read-only probes and the queries each runs.
pub const INTENTS: &[(&str, &[&str])] = &[
    ("check_version", &["SELECT @@VERSION AS full_version"]),
    (
        "list_databases",
        &["SELECT name, state_desc FROM sys.databases ORDER BY name"],
    ),
    (
        "list_tables",
        &["SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
           WHERE TABLE_TYPE='BASE TABLE' ORDER BY TABLE_SCHEMA, TABLE_NAME"],
    ),
    (
        "logins",
        &["SELECT principal_id, name, type_desc FROM sys.server_principals ORDER BY name"],
    ),
    (
        "agent_jobs",
        &["SELECT job_id, name, enabled FROM msdb.dbo.sysjobs ORDER BY name"],
    ),
];

/// Queries for a known intent.
#[must_use]
pub fn intent_queries(intent: &str) -> Option<&'static [&'static str]> {
    INTENTS
        .iter()
        .find(|(name, _)| *name == intent)
        .map(|(_, queries)| *queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_safety::validate_sql;

    #[test]
    fn test_intent_queries_pass_validation() {
        for (name, queries) in INTENTS {
            for q in *queries {
                assert!(validate_sql(q, None).is_safe, "{name}: {q}");
            }
        }
    }

    #[test]
    fn test_unknown_intent() {
        assert!(intent_queries("check_version").is_some());
        assert!(intent_queries("drop_everything").is_none());
    }
}
