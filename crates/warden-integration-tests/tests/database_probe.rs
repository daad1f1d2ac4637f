//! Database probe through the gate: validation, dry runs and rollback.

mod common;

use std::sync::Arc;

use serde_json::{Value, json};
use warden_audit::AuditEventType;
use warden_config::{ApprovalConfig, DatabaseProbeConfig};
use warden_core::SessionStatus;
use warden_safety::SqlValidator;
use warden_test::{
    GateHarness, MemoryDatabase, ScriptedConsole, ScriptedEngine, ScriptedStep, args, proposal,
};
use warden_tools::{DATABASE_PROBE_TOOL_NAME, DatabaseProbeTool, QueryRows, ToolAdapter};

use common::{assert_gate_invariant, positions};

const SIDE_EFFECT_QUERY: &str = "SELECT name FROM accounts";

fn accounts_db() -> MemoryDatabase {
    MemoryDatabase::new()
        .with_table(
            "accounts",
            &["id", "name"],
            vec![vec![json!(1), json!("alice")], vec![json!(2), json!("bob")]],
        )
        .on(SIDE_EFFECT_QUERY, |tables| {
            // A statement that reads but also clears the table it reads.
            let Some(accounts) = tables.get_mut("accounts") else {
                return Ok(QueryRows::default());
            };
            let rows = QueryRows {
                columns: vec!["name".into()],
                rows: accounts.rows.iter().map(|r| vec![r[1].clone()]).collect(),
            };
            accounts.rows.clear();
            Ok(rows)
        })
}

fn live_settings() -> DatabaseProbeConfig {
    DatabaseProbeConfig {
        allow_agent_sql: true,
        dry_run: false,
        ..DatabaseProbeConfig::default()
    }
}

fn probe(db: &MemoryDatabase, settings: DatabaseProbeConfig) -> DatabaseProbeTool {
    DatabaseProbeTool::new(settings, SqlValidator::new()).with_connector(Arc::new(db.connector("memory")))
}

#[tokio::test]
async fn test_accepted_query_leaves_database_unchanged() {
    let db = accounts_db();
    let before = db.snapshot();
    let harness = GateHarness::with_adapters(
        vec![Arc::new(probe(&db, live_settings()))],
        ApprovalConfig::default(),
    );
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(ScriptedStep::interrupt(vec![proposal(
                DATABASE_PROBE_TOOL_NAME,
                json!({
                    "host": "db.lab.local",
                    "custom_queries": [SIDE_EFFECT_QUERY],
                    "allow_agent_sql": true,
                    "dry_run": false
                }),
            )]))
            .then(ScriptedStep::final_turn("two accounts")),
    );

    let outcome = harness
        .run(engine.clone(), ScriptedConsole::new().accept(), "List accounts")
        .await;

    assert_eq!(outcome.status, SessionStatus::Completed);
    let calls = engine.tool_calls();
    assert_eq!(calls.len(), 1);
    let output = &calls[0].output;
    assert!(output.success, "{output:?}");
    let result = &output.fields["executed"][0]["result"];
    assert_eq!(result["rows"], json!([["alice"], ["bob"]]));

    assert_eq!(db.snapshot(), before);
    let stats = db.stats();
    assert_eq!(stats.begins, 1);
    assert_eq!(stats.rollbacks, 1);
    assert_eq!(stats.commits, 0);
    assert_gate_invariant(&harness.events());
}

#[tokio::test]
async fn test_intents_run_read_queries_and_roll_back() {
    let db = MemoryDatabase::sql_server();
    let tool = probe(&db, DatabaseProbeConfig {
        dry_run: false,
        ..DatabaseProbeConfig::default()
    });

    let output = tool
        .call(&args(json!({
            "host": "db.lab.local",
            "intents": ["check_version", "logins"]
        })))
        .await;

    assert!(output.success, "{output:?}");
    let executed = output.fields["executed"].as_array().unwrap();
    assert!(executed.len() >= 2);
    assert!(executed.iter().all(|e| e["validated"] == json!(true)));
    assert_eq!(
        executed[0]["result"]["columns"],
        json!(["full_version"])
    );
    let stats = db.stats();
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.rollbacks, stats.begins);
    assert_eq!(output.fields["connection"], json!("memory://db.lab.local"));
}

#[tokio::test]
async fn test_forbidden_query_never_executes_even_when_accepted() {
    for dry_run in [true, false] {
        let db = accounts_db();
        let before = db.snapshot();
        let harness = GateHarness::with_adapters(
            vec![Arc::new(probe(&db, live_settings()))],
            ApprovalConfig::default(),
        );
        let engine = Arc::new(
            ScriptedEngine::new()
                .then(ScriptedStep::interrupt(vec![proposal(
                    DATABASE_PROBE_TOOL_NAME,
                    json!({
                        "host": "db.lab.local",
                        "custom_queries": ["DROP TABLE accounts"],
                        "allow_agent_sql": true,
                        "dry_run": dry_run
                    }),
                )]))
                .then(ScriptedStep::final_turn("done")),
        );

        harness
            .run(engine.clone(), ScriptedConsole::new().accept(), "Clean up")
            .await;

        let output = &engine.tool_calls()[0].output;
        let record = &output.fields["executed"][0];
        assert_eq!(record["validated"], json!(false), "dry_run={dry_run}");
        assert!(!record["reasons"].as_array().unwrap().is_empty());
        assert!(record.get("result").is_none());

        let stats = db.stats();
        assert!(stats.statements.is_empty(), "dry_run={dry_run}");
        assert_eq!(stats.begins, 0);
        assert_eq!(db.snapshot(), before);

        // The operator saw the finding before deciding.
        let types = harness.event_types();
        let warning = positions(&types, AuditEventType::Warning);
        let decision = positions(&types, AuditEventType::HumanDecision);
        assert!(!warning.is_empty());
        assert!(warning[0] < decision[0]);
        let decision_event = &harness.events()[decision[0]];
        assert_eq!(
            decision_event.details["safety_verdicts"][0]["is_safe"],
            Value::Bool(false)
        );
    }
}

#[tokio::test]
async fn test_dry_run_plans_without_connecting() {
    let db = accounts_db();
    let tool = probe(&db, DatabaseProbeConfig {
        allow_agent_sql: true,
        ..DatabaseProbeConfig::default()
    });

    let output = tool
        .call(&args(json!({
            "host": "db.lab.local",
            "custom_queries": [SIDE_EFFECT_QUERY],
            "allow_agent_sql": true
        })))
        .await;

    assert!(output.success);
    assert_eq!(output.fields["dry_run"], json!(true));
    assert_eq!(output.fields["executed"][0]["validated"], json!(true));
    assert_eq!(db.stats().begins, 0);
    assert_eq!(output.fields["connection"], json!("REDACTED"));
}

#[tokio::test]
async fn test_agent_sql_needs_config_and_call_opt_in() {
    let db = accounts_db();
    let tool = probe(&db, DatabaseProbeConfig {
        dry_run: false,
        ..DatabaseProbeConfig::default()
    });

    let output = tool
        .call(&args(json!({
            "host": "db.lab.local",
            "custom_queries": [SIDE_EFFECT_QUERY],
            "allow_agent_sql": true
        })))
        .await;

    assert!(db.stats().statements.is_empty());
    let errors = output.fields["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e.as_str().is_some_and(|s| s.contains("allow_agent_sql"))));
}

#[tokio::test]
async fn test_connection_failure_is_reported_not_raised() {
    let db = accounts_db();
    let tool = DatabaseProbeTool::new(live_settings(), SqlValidator::new())
        .with_connector(Arc::new(db.connector("memory").failing("login failed for user 'sa'")));

    let output = tool
        .call(&args(json!({
            "host": "db.lab.local",
            "custom_queries": [SIDE_EFFECT_QUERY],
            "allow_agent_sql": true
        })))
        .await;

    assert!(!output.success);
    assert!(output.error.is_some());
    assert!(output.fields["details"].to_string().contains("login failed"));
    assert_eq!(db.stats().begins, 0);
}
