//! Safety validator properties seen from outside the crate.

use serde_json::json;
use warden_safety::{FlagFilter, SqlValidator, inspect_arguments, split_args, validate_sql};
use warden_test::args;

#[test]
fn test_validation_is_a_pure_function_of_text_and_schemas() {
    let schemas = vec!["dbo".to_string()];
    let validator = SqlValidator::with_allowed_schemas(schemas.clone());
    let inputs = [
        "SELECT name FROM dbo.accounts",
        "SELECT * FROM audit.logins",
        "DROP TABLE accounts",
        "EXEC xp_cmdshell 'whoami'",
        "",
    ];

    for text in inputs {
        let first = validator.validate(text);
        let second = validator.validate(text);
        assert_eq!(first, second, "{text}");
        assert_eq!(first, validate_sql(text, Some(&schemas)), "{text}");
        assert_eq!(first.is_safe, first.reasons.is_empty());
    }
}

#[test]
fn test_drop_table_is_rejected_with_reasons() {
    let verdict = validate_sql("DROP TABLE accounts", None);
    assert!(!verdict.is_safe);
    assert!(!verdict.reasons.is_empty());
    assert_eq!(verdict.subject, "DROP TABLE accounts");
}

#[test]
fn test_flag_stripping_keeps_unrelated_following_flag() {
    let filtered = FlagFilter::default().filter(&["-p", "id", "--os-shell", "--risk=2"]);
    assert_eq!(filtered, vec!["-p", "id", "--risk=2"]);
}

#[test]
fn test_flag_stripping_from_quoted_argument_string() {
    let tokens = split_args(r#"-u "http://10.0.0.5/item?id=1" --os-cmd whoami --level 3"#).unwrap();
    let report = FlagFilter::default().filter_with_report(&tokens);
    assert_eq!(
        report.kept,
        vec!["-u", "http://10.0.0.5/item?id=1", "--level", "3"]
    );
    assert_eq!(report.removed, vec!["--os-cmd", "whoami"]);
}

#[test]
fn test_inspection_covers_sql_and_flag_arguments() {
    let verdicts = inspect_arguments(
        &args(json!({
            "host": "db.lab.local",
            "custom_queries": ["SELECT 1", "DELETE FROM accounts"],
            "extra_args": "--batch --os-pwn"
        })),
        &SqlValidator::new(),
        &FlagFilter::default(),
    );

    assert_eq!(verdicts.len(), 3);
    assert!(verdicts[0].is_safe);
    assert!(!verdicts[1].is_safe);
    assert!(!verdicts[2].is_safe);
}
