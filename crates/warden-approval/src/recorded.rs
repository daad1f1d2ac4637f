//! Audit recording around any decision source.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use warden_audit::AuditLog;

use crate::decision::{DecisionKind, OperatorDecision, ProposalView};
use crate::error::{DecisionError, DecisionResult};
use crate::source::DecisionSource;

/// Context recorded when the interrupt carried no proposal.
pub const NO_PROPOSAL_CONTEXT: &str = "no proposal";

/// Wraps a [`DecisionSource`] and writes a `human_decision` record for
/// every decision it produces.
///
/// An interrupted prompt is recorded as an abort before the error is
/// returned, so every surfaced proposal has exactly one decision record.
pub struct RecordedDecisions<S> {
    inner: S,
    audit: Arc<AuditLog>,
}

impl<S: DecisionSource> RecordedDecisions<S> {
    /// Wrap `inner`, recording into `audit`.
    #[must_use]
    pub fn new(inner: S, audit: Arc<AuditLog>) -> Self {
        Self { inner, audit }
    }

    fn record(
        &self,
        kind: DecisionKind,
        proposal: Option<&ProposalView>,
        mut extra: Map<String, Value>,
    ) {
        let context = proposal.map_or_else(
            || NO_PROPOSAL_CONTEXT.to_string(),
            |view| view.action.tool_name.clone(),
        );
        if let Some(view) = proposal {
            extra.insert(
                "proposal".into(),
                serde_json::to_value(&view.action).unwrap_or(Value::Null),
            );
            if !view.verdicts.is_empty() {
                extra.insert(
                    "safety_verdicts".into(),
                    serde_json::to_value(&view.verdicts).unwrap_or(Value::Null),
                );
            }
            if let Some(warning) = &view.roster_warning {
                extra.insert("roster_warning".into(), warning.clone().into());
            }
        }
        self.audit
            .log_human_decision(kind.as_str(), &context, self.audit.operator(), extra);
    }
}

#[async_trait]
impl<S: DecisionSource> DecisionSource for RecordedDecisions<S> {
    async fn prompt(&self, proposal: Option<&ProposalView>) -> DecisionResult<OperatorDecision> {
        match self.inner.prompt(proposal).await {
            Ok(decision) => {
                let mut extra = Map::new();
                let payload = decision.payload_value();
                if !payload.is_null() {
                    extra.insert("payload".into(), payload);
                }
                self.record(decision.kind(), proposal, extra);
                Ok(decision)
            },
            Err(DecisionError::Interrupted) => {
                let mut extra = Map::new();
                extra.insert("interrupted".into(), true.into());
                self.record(DecisionKind::Abort, proposal, extra);
                Err(DecisionError::Interrupted)
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit::{AuditEventType, read_events};
    use warden_core::{ProposedAction, SessionId, ToolArgs};
    use warden_safety::validate_sql;

    struct Fixed(DecisionResult<OperatorDecision>);

    #[async_trait]
    impl DecisionSource for Fixed {
        async fn prompt(&self, _: Option<&ProposalView>) -> DecisionResult<OperatorDecision> {
            match &self.0 {
                Ok(d) => Ok(d.clone()),
                Err(DecisionError::Interrupted) => Err(DecisionError::Interrupted),
                Err(_) => Err(DecisionError::Exhausted("fixed".into())),
            }
        }
    }

    fn view() -> ProposalView {
        let mut args = ToolArgs::new();
        args.insert("query".into(), "DROP TABLE accounts".into());
        ProposalView::new(ProposedAction::new("mssql_agent_tool", args))
            .with_verdicts(vec![validate_sql("DROP TABLE accounts", None)])
    }

    #[tokio::test]
    async fn test_decision_is_recorded_with_verdicts() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::create(dir.path(), SessionId::new(), "alice").unwrap());
        let source = RecordedDecisions::new(
            Fixed(Ok(OperatorDecision::Respond("no".into()))),
            Arc::clone(&audit),
        );

        source.prompt(Some(&view())).await.unwrap();

        let events = read_events(audit.path()).unwrap().events;
        let decision = events
            .iter()
            .find(|e| e.event_type == AuditEventType::HumanDecision)
            .unwrap();
        assert_eq!(decision.actor, "alice");
        assert_eq!(decision.details["decision"], "respond");
        assert_eq!(decision.details["context"], "mssql_agent_tool");
        assert_eq!(decision.details["payload"], "no");
        assert_eq!(decision.details["safety_verdicts"][0]["is_safe"], false);
    }

    #[tokio::test]
    async fn test_interrupt_recorded_as_abort() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::create(dir.path(), SessionId::new(), "alice").unwrap());
        let source = RecordedDecisions::new(Fixed(Err(DecisionError::Interrupted)), Arc::clone(&audit));

        let err = source.prompt(None).await.unwrap_err();
        assert!(matches!(err, DecisionError::Interrupted));

        let events = read_events(audit.path()).unwrap().events;
        let decision = events.last().unwrap();
        assert_eq!(decision.details["decision"], "abort");
        assert_eq!(decision.details["context"], NO_PROPOSAL_CONTEXT);
        assert_eq!(decision.details["interrupted"], true);
    }

    #[tokio::test]
    async fn test_console_error_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::create(dir.path(), SessionId::new(), "alice").unwrap());
        let source = RecordedDecisions::new(
            Fixed(Err(DecisionError::Exhausted(String::new()))),
            Arc::clone(&audit),
        );

        assert!(source.prompt(None).await.is_err());
        let events = read_events(audit.path()).unwrap().events;
        assert!(
            events
                .iter()
                .all(|e| e.event_type != AuditEventType::HumanDecision)
        );
    }
}
