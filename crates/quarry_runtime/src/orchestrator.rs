//! Recovery orchestrator.
//!
//! Drives one request from raw candidate to a terminal outcome:
//!
//! ```text
//! Validating -> Executing -> Success
//!      |            |
//!      |            +-> Retrying -> Executing      (timeout: LIMIT injected)
//!      |            +-> Regenerating -> Executing  (malformed, first attempt)
//!      +-> Regenerating
//!      +-> Failed
//! ```
//!
//! Retries are bounded by `max_retries`. Regeneration happens at most once,
//! and a regenerated statement gets exactly one execution.

use crate::monitor::RecoveryMetrics;
use crate::outcome::{FailureKind, FailureOutcome, RecoveryOutcome, RecoveryTrace, SuccessOutcome};
use crate::regenerate::{RegenerationRequest, Regenerator};
use crate::state::RecoveryState;
use quarry_core::{
    ErrorClass, QuarryConfig, RequestId, ValidationReason, DEFAULT_MAX_RETRIES, DEFAULT_ROW_LIMIT,
};
use quarry_engine::{EngineAdapter, Table};
use quarry_log::{FailureRecord, FailureSink, JsonlFailureLog};
use quarry_policy::PolicyValidator;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Per-request bookkeeping threaded through transitions
struct Run<'a> {
    candidate: &'a str,
    question: Option<&'a str>,
    retries_left: u32,
    regenerated: bool,
    trace: RecoveryTrace,
}

/// Validate, execute, retry and regenerate, in one bounded loop
///
/// Holds no per-request state, so one instance can serve concurrent
/// requests behind an `Arc`.
pub struct RecoveryOrchestrator {
    adapter: EngineAdapter,
    validator: PolicyValidator,
    regenerator: Option<Arc<dyn Regenerator>>,
    sink: Option<Arc<dyn FailureSink>>,
    row_limit: u64,
    max_retries: u32,
    metrics: Arc<RecoveryMetrics>,
}

impl RecoveryOrchestrator {
    /// Orchestrator with default limits, no regenerator and no failure log
    #[must_use]
    pub fn new(adapter: EngineAdapter) -> Self {
        Self {
            adapter,
            validator: PolicyValidator::default(),
            regenerator: None,
            sink: None,
            row_limit: DEFAULT_ROW_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            metrics: Arc::new(RecoveryMetrics::new()),
        }
    }

    /// Orchestrator configured from `config`
    ///
    /// Installs a JSON-lines failure log when `log_failures` is set.
    #[must_use]
    pub fn from_config(adapter: EngineAdapter, config: &QuarryConfig) -> Self {
        let orchestrator = Self::new(adapter)
            .with_validator(PolicyValidator::new(config.table_name.clone()))
            .with_row_limit(config.row_limit)
            .with_max_retries(config.max_retries);
        if config.log_failures {
            orchestrator.with_sink(Arc::new(JsonlFailureLog::new(config.failure_log_path.clone())))
        } else {
            orchestrator
        }
    }

    /// Use a specific policy validator
    #[must_use]
    pub fn with_validator(mut self, validator: PolicyValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Enable regeneration
    #[must_use]
    pub fn with_regenerator(mut self, regenerator: Arc<dyn Regenerator>) -> Self {
        self.regenerator = Some(regenerator);
        self
    }

    /// Record terminal failures to `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Disable failure logging
    #[must_use]
    pub fn without_sink(mut self) -> Self {
        self.sink = None;
        self
    }

    /// Row limit injected on timeout retries
    #[must_use]
    pub fn with_row_limit(mut self, row_limit: u64) -> Self {
        self.row_limit = row_limit;
        self
    }

    /// Local retry budget per request
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Share metrics with another owner
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<RecoveryMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Engine adapter
    #[must_use]
    pub fn adapter(&self) -> &EngineAdapter {
        &self.adapter
    }

    /// Live counters
    #[must_use]
    pub fn metrics(&self) -> &RecoveryMetrics {
        &self.metrics
    }

    /// Run one request to completion
    ///
    /// `question` is the original natural-language question; regeneration
    /// is only possible when it is present and non-blank and a regenerator
    /// is installed. Never returns an error: every failure is folded into
    /// [`RecoveryOutcome::Failed`].
    #[instrument(skip_all, fields(request = %RequestId::new()))]
    pub async fn run(&self, candidate: &str, question: Option<&str>) -> RecoveryOutcome {
        self.metrics.record_request();
        let mut run = Run {
            candidate,
            question: question.filter(|q| !q.trim().is_empty()),
            retries_left: self.max_retries,
            regenerated: false,
            trace: RecoveryTrace::default(),
        };

        let mut state = RecoveryState::Validating;
        run.trace.states.push(state.kind());
        while !state.is_terminal() {
            state = self.step(state, &mut run).await;
            debug!(state = %state.kind(), retries_left = run.retries_left, "transition");
            run.trace.states.push(state.kind());
        }

        self.finish(state, run).await
    }

    /// The transition function
    async fn step(&self, state: RecoveryState, run: &mut Run<'_>) -> RecoveryState {
        match state {
            RecoveryState::Validating => {
                let screening = self.validator.screen(run.candidate);
                run.trace.last_statement = screening.statement.as_ref().map(ToString::to_string);
                match (screening.verdict.reason, screening.statement) {
                    (None, Some(statement)) => RecoveryState::Executing { statement },
                    (reason, _) => {
                        let reason = reason.unwrap_or(ValidationReason::Empty);
                        if self.can_regenerate(run) {
                            RecoveryState::Regenerating {
                                cause: format!("Validation error: {}", reason.describe()),
                            }
                        } else {
                            RecoveryState::Failed {
                                kind: FailureKind::Rejected(reason),
                                message: format!("Query rejected by policy: {}", reason.describe()),
                            }
                        }
                    }
                }
            }

            RecoveryState::Executing { statement } => {
                run.trace.executions += 1;
                run.trace.last_statement = Some(statement.to_string());
                self.metrics.record_execution();

                let outcome = self.adapter.execute(statement.as_str()).await;
                if outcome.success {
                    return RecoveryState::Success {
                        statement,
                        table: outcome.table,
                    };
                }

                let class = outcome.error_class.unwrap_or(ErrorClass::Other);
                let message = outcome.raw_message.unwrap_or_default();
                let first_attempt = run.trace.executions == 1;

                if run.regenerated {
                    RecoveryState::Failed {
                        kind: FailureKind::RegenerationFailed,
                        message: format!("Regeneration execution failed: {}", message),
                    }
                } else if class == ErrorClass::Timeout && run.retries_left > 0 {
                    RecoveryState::Retrying { statement, class }
                } else if class.is_malformed() && first_attempt && self.can_regenerate(run) {
                    RecoveryState::Regenerating { cause: message }
                } else if run.retries_left > 0 {
                    RecoveryState::Retrying { statement, class }
                } else {
                    RecoveryState::Failed {
                        kind: FailureKind::Execution(class),
                        message: format!("Execution failed: {}", message),
                    }
                }
            }

            RecoveryState::Retrying { statement, class } => {
                run.retries_left = run.retries_left.saturating_sub(1);
                run.trace.retries += 1;
                self.metrics.record_retry();

                let statement = if class == ErrorClass::Timeout {
                    let limited = statement.with_limit(self.row_limit);
                    if limited != statement {
                        run.trace.limit_injected = true;
                    }
                    limited
                } else {
                    statement
                };
                debug!(%class, retries_left = run.retries_left, "retrying");
                RecoveryState::Executing { statement }
            }

            RecoveryState::Regenerating { cause } => self.regenerate(cause, run).await,

            terminal @ (RecoveryState::Success { .. } | RecoveryState::Failed { .. }) => terminal,
        }
    }

    fn can_regenerate(&self, run: &Run<'_>) -> bool {
        self.regenerator.is_some() && run.question.is_some() && !run.regenerated
    }

    async fn regenerate(&self, cause: String, run: &mut Run<'_>) -> RecoveryState {
        let (Some(regenerator), Some(question)) = (self.regenerator.as_ref(), run.question) else {
            return RecoveryState::Failed {
                kind: FailureKind::RegenerationFailed,
                message: format!("Regeneration unavailable: {}", cause),
            };
        };

        run.regenerated = true;
        run.trace.regeneration_attempted = true;
        self.metrics.record_regeneration();
        info!(cause = %cause, "regenerating statement");

        let request = RegenerationRequest {
            question: question.to_string(),
            last_statement: run.trace.last_statement.clone(),
            last_error: cause,
        };
        let candidate = match regenerator.regenerate(&request).await {
            Ok(candidate) => candidate,
            Err(err) => {
                return RecoveryState::Failed {
                    kind: FailureKind::RegenerationFailed,
                    message: format!("Regeneration failed: {}", err),
                };
            }
        };

        let screening = self.validator.screen(&candidate);
        if let Some(statement) = screening.statement.as_ref() {
            run.trace.last_statement = Some(statement.to_string());
        }
        match (screening.verdict.reason, screening.statement) {
            (None, Some(statement)) => RecoveryState::Executing { statement },
            (reason, _) => {
                let reason = reason.unwrap_or(ValidationReason::Empty);
                if run.trace.last_statement.is_none() {
                    run.trace.last_statement = Some(candidate);
                }
                RecoveryState::Failed {
                    kind: FailureKind::RegenerationInvalid(reason),
                    message: format!("Regeneration failed validation: {}", reason.describe()),
                }
            }
        }
    }

    async fn finish(&self, state: RecoveryState, run: Run<'_>) -> RecoveryOutcome {
        match state {
            RecoveryState::Success { statement, table } => {
                self.metrics.record_success();
                let message = success_message(&table, run.regenerated);
                info!(rows = table.len(), regenerated = run.regenerated, "{}", message);
                RecoveryOutcome::Success(SuccessOutcome {
                    table,
                    statement: statement.into_inner(),
                    regenerated: run.regenerated,
                    message,
                    trace: run.trace,
                })
            }
            RecoveryState::Failed { kind, message } => {
                self.metrics
                    .record_failure(matches!(kind, FailureKind::Rejected(_)));
                info!(code = %kind.code(), "{}", message);
                self.record_failure(&run, &message).await;
                RecoveryOutcome::Failed(FailureOutcome {
                    kind,
                    message,
                    trace: run.trace,
                })
            }
            other => {
                // The loop only exits on terminal states.
                let message = format!("Execution failed: request stopped in {} state", other.kind());
                self.metrics.record_failure(false);
                RecoveryOutcome::Failed(FailureOutcome {
                    kind: FailureKind::Execution(ErrorClass::Other),
                    message,
                    trace: run.trace,
                })
            }
        }
    }

    /// Best effort: sink errors are logged and dropped
    ///
    /// Sinks may block on file I/O, so the write runs on the blocking pool.
    async fn record_failure(&self, run: &Run<'_>, message: &str) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let sql = run
            .trace
            .last_statement
            .clone()
            .unwrap_or_else(|| run.candidate.to_string());
        let record = FailureRecord::new(run.question.unwrap_or_default(), sql, message);
        match tokio::task::spawn_blocking(move || sink.record(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "failed to record failure"),
            Err(err) => warn!(error = %err, "failure log task aborted"),
        }
    }
}

impl std::fmt::Debug for RecoveryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryOrchestrator")
            .field("adapter", &self.adapter)
            .field("validator", &self.validator)
            .field("regenerator", &self.regenerator.is_some())
            .field("sink", &self.sink.is_some())
            .field("row_limit", &self.row_limit)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

fn success_message(table: &Table, regenerated: bool) -> String {
    match (regenerated, table.is_empty()) {
        (false, true) => "No data found".to_string(),
        (false, false) => format!("Success: {} rows", table.len()),
        (true, true) => "Regenerated: No data found".to_string(),
        (true, false) => format!("Regenerated: Success ({} rows)", table.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regenerate::{FnRegenerator, RegenerationError};
    use crate::state::StateKind;
    use quarry_core::FailureCode;
    use quarry_engine::adapter::builtin::ScriptedEngine;
    use quarry_engine::EngineError;
    use quarry_log::{LogError, MemoryFailureLog};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn one_row() -> Table {
        Table::new(vec!["total".to_string()]).with_row(vec![json!(1234.5)])
    }

    fn timeout() -> EngineError {
        EngineError::Timeout { millis: 30_000 }
    }

    fn parse_error() -> EngineError {
        EngineError::Parse("Expected: an expression, found: FROM".to_string())
    }

    fn orchestrator(engine: &Arc<ScriptedEngine>) -> RecoveryOrchestrator {
        RecoveryOrchestrator::new(EngineAdapter::new(engine.clone()))
    }

    /// Regenerator that counts calls and always returns `sql`
    fn counting(sql: &'static str) -> (Arc<AtomicUsize>, Arc<dyn Regenerator>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let regen = FnRegenerator::new(move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(sql.to_string())
        });
        (calls, Arc::new(regen))
    }

    #[tokio::test]
    async fn test_plain_select_scenario() {
        let engine = Arc::new(ScriptedEngine::new().then_ok(one_row()));
        let outcome = orchestrator(&engine)
            .run("SELECT SUM(Value) FROM trade WHERE Year = 2080", None)
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.message(), "Success: 1 rows");
        assert_eq!(outcome.table().unwrap().len(), 1);
        assert_eq!(
            engine.statements(),
            vec!["SELECT SUM(Value) FROM trade WHERE Year = 2080;"]
        );
        assert_eq!(
            outcome.trace().states,
            vec![StateKind::Validating, StateKind::Executing, StateKind::Success]
        );
    }

    #[tokio::test]
    async fn test_drop_scenario_never_executes() {
        let engine = Arc::new(ScriptedEngine::new());
        let sink = Arc::new(MemoryFailureLog::new());
        let outcome = orchestrator(&engine)
            .with_sink(sink.clone())
            .run("DROP TABLE trade;", None)
            .await;

        assert_eq!(
            outcome.failure(),
            Some(FailureKind::Rejected(ValidationReason::ForbiddenKeyword))
        );
        assert!(outcome.message().starts_with("Query rejected by policy"));
        assert_eq!(engine.calls(), 0);
        assert_eq!(outcome.trace().executions, 0);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].sql, "DROP TABLE trade;");
    }

    #[tokio::test]
    async fn test_empty_result_message() {
        let engine = Arc::new(ScriptedEngine::new().then_ok(Table::new(vec!["x".to_string()])));
        let outcome = orchestrator(&engine)
            .run("SELECT * FROM trade WHERE Year = 1900", None)
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.message(), "No data found");
    }

    #[tokio::test]
    async fn test_timeout_retried_with_limit() {
        let engine = Arc::new(ScriptedEngine::new().then_err(timeout()).then_ok(one_row()));
        let outcome = orchestrator(&engine).run("SELECT * FROM trade", None).await;

        assert!(outcome.is_success());
        let statements = engine.statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "SELECT * FROM trade;");
        assert_eq!(statements[1], "SELECT * FROM trade LIMIT 1000;");
        assert!(outcome.trace().limit_injected);
        assert_eq!(outcome.trace().retries, 1);
    }

    #[tokio::test]
    async fn test_timeout_bounded_by_max_retries() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .then_err(timeout())
                .then_err(timeout())
                .then_err(timeout())
                .then_ok(one_row()),
        );
        let (calls, regen) = counting("SELECT 1 FROM trade;");
        let outcome = orchestrator(&engine)
            .with_regenerator(regen)
            .run("SELECT * FROM trade", Some("everything"))
            .await;

        assert_eq!(outcome.failure(), Some(FailureKind::Execution(ErrorClass::Timeout)));
        assert!(outcome.message().starts_with("Execution failed:"));
        assert_eq!(engine.calls(), 3);
        assert_eq!(outcome.trace().retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_retry_budget() {
        let engine = Arc::new(ScriptedEngine::new().then_err(timeout()));
        let outcome = orchestrator(&engine)
            .with_max_retries(0)
            .run("SELECT * FROM trade", None)
            .await;
        assert_eq!(outcome.code(), Some(FailureCode::Timeout));
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_limit_kept_on_timeout() {
        let engine = Arc::new(ScriptedEngine::new().then_err(timeout()).then_ok(one_row()));
        let outcome = orchestrator(&engine)
            .run("SELECT * FROM trade LIMIT 5", None)
            .await;
        assert!(outcome.is_success());
        assert_eq!(engine.statements()[1], "SELECT * FROM trade LIMIT 5;");
        assert!(!outcome.trace().limit_injected);
    }

    #[tokio::test]
    async fn test_other_failure_retried_unchanged() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .then_err(EngineError::Execution("IO error: resource busy".to_string()))
                .then_ok(one_row()),
        );
        let outcome = orchestrator(&engine).run("SELECT * FROM trade", None).await;
        assert!(outcome.is_success());
        assert_eq!(engine.statements()[0], engine.statements()[1]);
        assert!(!outcome.trace().limit_injected);
    }

    #[tokio::test]
    async fn test_invalid_without_regenerator_fails_without_execution() {
        let engine = Arc::new(ScriptedEngine::new());
        let outcome = orchestrator(&engine).run("SELECT * FROM exports", Some("q")).await;
        assert_eq!(
            outcome.failure(),
            Some(FailureKind::Rejected(ValidationReason::WrongTable))
        );
        assert_eq!(engine.calls(), 0);
        assert_eq!(outcome.trace().retries, 0);
    }

    #[tokio::test]
    async fn test_unextractable_candidate_is_empty() {
        let engine = Arc::new(ScriptedEngine::new());
        let outcome = orchestrator(&engine)
            .run("I cannot answer that question.", None)
            .await;
        assert_eq!(outcome.code(), Some(FailureCode::Empty));
    }

    #[tokio::test]
    async fn test_syntax_error_regenerated_success() {
        let engine = Arc::new(ScriptedEngine::new().then_err(parse_error()).then_ok(one_row()));
        let (calls, regen) = counting("```sql\nSELECT SUM(Value) AS total FROM trade;\n```");
        let outcome = orchestrator(&engine)
            .with_regenerator(regen)
            .run("SELECT SUM(Value FROM trade", Some("total trade value"))
            .await;

        assert!(outcome.is_success());
        assert!(outcome.message().starts_with("Regenerated:"));
        assert_eq!(outcome.message(), "Regenerated: Success (1 rows)");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            engine.statements()[1],
            "SELECT SUM(Value) AS total FROM trade;"
        );
        match outcome {
            RecoveryOutcome::Success(s) => assert!(s.regenerated),
            RecoveryOutcome::Failed(_) => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn test_regenerator_receives_question_and_context() {
        struct Capture(std::sync::Mutex<Vec<RegenerationRequest>>);

        #[async_trait::async_trait]
        impl Regenerator for Capture {
            async fn regenerate(
                &self,
                request: &RegenerationRequest,
            ) -> Result<String, RegenerationError> {
                self.0.lock().unwrap().push(request.clone());
                Ok("SELECT 1 FROM trade;".to_string())
            }
        }

        let engine = Arc::new(ScriptedEngine::new().then_err(parse_error()));
        let capture = Arc::new(Capture(std::sync::Mutex::new(Vec::new())));
        orchestrator(&engine)
            .with_regenerator(capture.clone())
            .run("SELECT FROM trade", Some("how many rows?"))
            .await;

        let seen = capture.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].question, "how many rows?");
        assert_eq!(seen[0].last_statement.as_deref(), Some("SELECT FROM trade;"));
        assert!(seen[0].last_error.starts_with("Parser Error"));
    }

    #[tokio::test]
    async fn test_failure_after_regeneration_is_terminal() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .then_err(parse_error())
                .then_err(timeout())
                .then_ok(one_row()),
        );
        let (calls, regen) = counting("SELECT * FROM trade;");
        let outcome = orchestrator(&engine)
            .with_regenerator(regen)
            .run("SELECT * FROM trade WHERE", Some("all rows"))
            .await;

        assert_eq!(outcome.failure(), Some(FailureKind::RegenerationFailed));
        assert!(outcome.message().starts_with("Regeneration execution failed:"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.calls(), 2);
        assert_eq!(outcome.trace().visits(StateKind::Regenerating), 1);
        assert_eq!(outcome.trace().retries, 0);
    }

    #[tokio::test]
    async fn test_second_syntax_error_after_regeneration_not_regenerated() {
        let engine = Arc::new(ScriptedEngine::new().then_err(parse_error()).then_err(parse_error()));
        let (calls, regen) = counting("SELECT broken FROM trade;");
        let outcome = orchestrator(&engine)
            .with_regenerator(regen)
            .run("SELECT x FROM trade", Some("q"))
            .await;
        assert_eq!(outcome.code(), Some(FailureCode::RegenerationFailed));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_regeneration() {
        let engine = Arc::new(ScriptedEngine::new().then_err(parse_error()));
        let (calls, regen) = counting("DELETE FROM trade;");
        let outcome = orchestrator(&engine)
            .with_regenerator(regen)
            .run("SELECT x FROM trade", Some("q"))
            .await;
        assert_eq!(
            outcome.failure(),
            Some(FailureKind::RegenerationInvalid(ValidationReason::ForbiddenKeyword))
        );
        assert!(outcome.message().starts_with("Regeneration failed validation:"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_regenerates_with_question() {
        let engine = Arc::new(ScriptedEngine::new().then_ok(one_row()));
        let (calls, regen) = counting("SELECT COUNT(*) FROM trade;");
        let outcome = orchestrator(&engine)
            .with_regenerator(regen)
            .run("SHOW TABLES", Some("how many rows?"))
            .await;
        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.calls(), 1);
        assert_eq!(
            outcome.trace().states,
            vec![
                StateKind::Validating,
                StateKind::Regenerating,
                StateKind::Executing,
                StateKind::Success
            ]
        );
    }

    #[tokio::test]
    async fn test_no_regeneration_without_question() {
        let engine = Arc::new(ScriptedEngine::new().then_err(parse_error()));
        let (calls, regen) = counting("SELECT 1 FROM trade;");
        let outcome = orchestrator(&engine)
            .with_regenerator(regen)
            .with_max_retries(0)
            .run("SELECT x FROM trade", Some("   "))
            .await;
        assert_eq!(outcome.code(), Some(FailureCode::ParserError));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_syntax_error_after_retry_not_regenerated() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .then_err(EngineError::Execution("connection reset".to_string()))
                .then_err(parse_error())
                .then_err(parse_error()),
        );
        let (calls, regen) = counting("SELECT 1 FROM trade;");
        let outcome = orchestrator(&engine)
            .with_regenerator(regen)
            .run("SELECT x FROM trade", Some("q"))
            .await;
        assert_eq!(outcome.code(), Some(FailureCode::ParserError));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.calls(), 3);
    }

    #[tokio::test]
    async fn test_regenerator_error() {
        let engine = Arc::new(ScriptedEngine::new().then_err(parse_error()));
        let regen = FnRegenerator::new(|_: &str| Err(RegenerationError::new("model offline")));
        let outcome = orchestrator(&engine)
            .with_regenerator(Arc::new(regen))
            .run("SELECT x FROM trade", Some("q"))
            .await;
        assert_eq!(outcome.failure(), Some(FailureKind::RegenerationFailed));
        assert!(outcome.message().contains("model offline"));
    }

    #[tokio::test]
    async fn test_failure_record_contents() {
        let engine = Arc::new(ScriptedEngine::new().then_err(EngineError::Execution("boom".to_string())));
        let sink = Arc::new(MemoryFailureLog::new());
        orchestrator(&engine)
            .with_sink(sink.clone())
            .with_max_retries(0)
            .run("SELECT * FROM trade", Some("what?"))
            .await;

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "what?");
        assert_eq!(records[0].sql, "SELECT * FROM trade;");
        assert_eq!(records[0].error, "Execution failed: boom");
    }

    #[tokio::test]
    async fn test_success_not_logged() {
        let engine = Arc::new(ScriptedEngine::new().then_ok(one_row()));
        let sink = Arc::new(MemoryFailureLog::new());
        orchestrator(&engine)
            .with_sink(sink.clone())
            .run("SELECT * FROM trade", None)
            .await;
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_sink_errors_are_swallowed() {
        struct Broken;
        impl FailureSink for Broken {
            fn record(&self, _: &FailureRecord) -> Result<(), LogError> {
                Err(LogError::Poisoned)
            }
        }

        let engine = Arc::new(ScriptedEngine::new());
        let outcome = orchestrator(&engine)
            .with_sink(Arc::new(Broken))
            .run("DROP TABLE trade", None)
            .await;
        assert_eq!(outcome.code(), Some(FailureCode::ForbiddenKeyword));
    }

    #[tokio::test]
    async fn test_sink_runs_off_the_request_thread() {
        struct WriterThread(std::sync::Mutex<Option<std::thread::ThreadId>>);
        impl FailureSink for WriterThread {
            fn record(&self, _: &FailureRecord) -> Result<(), LogError> {
                *self.0.lock().unwrap() = Some(std::thread::current().id());
                Ok(())
            }
        }

        let sink = Arc::new(WriterThread(std::sync::Mutex::new(None)));
        let engine = Arc::new(ScriptedEngine::new());
        orchestrator(&engine)
            .with_sink(sink.clone())
            .run("DROP TABLE trade", None)
            .await;

        let writer = sink.0.lock().unwrap().expect("sink was called");
        assert_ne!(writer, std::thread::current().id());
    }

    #[tokio::test]
    async fn test_jsonl_sink_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.jsonl");
        let config = QuarryConfig::default()
            .with_failure_log_path(&path)
            .with_max_retries(0);
        let engine = Arc::new(ScriptedEngine::new());
        let outcome = RecoveryOrchestrator::from_config(EngineAdapter::new(engine), &config)
            .run("UPDATE trade SET Value = 0", Some("zero it"))
            .await;
        assert!(!outcome.is_success());

        let contents = std::fs::read_to_string(&path).unwrap();
        let record: FailureRecord = serde_json::from_str(contents.trim_end()).unwrap();
        assert_eq!(record.question, "zero it");
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_orchestrator() {
        let engine = Arc::new(ScriptedEngine::new());
        let orchestrator = Arc::new(orchestrator(&engine));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    let sql = if i % 2 == 0 {
                        "SELECT * FROM trade".to_string()
                    } else {
                        "DROP TABLE trade".to_string()
                    };
                    orchestrator.run(&sql, None).await
                })
            })
            .collect();

        let outcomes: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 8);

        let snap = orchestrator.metrics().snapshot();
        assert_eq!(snap.requests, 16);
        assert_eq!(snap.successes, 8);
        assert_eq!(snap.rejections, 8);
        assert_eq!(engine.calls(), 8);
    }

    const TRADE_CSV: &str = "\
Year,Month,Direction,HS_Code,Description,Country,Value,Quantity,Unit,Revenue
2080,1,Exports,0101,Live horses,Japan,120.5,10,Number,1000
2080,2,Imports,0202,Frozen beef,Chile,80.0,5,Tonnes,400
2081,1,Exports,0303,Frozen fish,Japan,40.0,2,Tonnes,90
";

    async fn datafusion_adapter(file: &tempfile::NamedTempFile) -> EngineAdapter {
        let adapter = EngineAdapter::new(Arc::new(quarry_engine::DataFusionEngine::new(
            "trade",
            file.path(),
        )));
        adapter.open().await.unwrap();
        adapter
    }

    fn trade_csv() -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(TRADE_CSV.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_datafusion_fenced_candidate_to_rows() {
        let file = trade_csv();
        let sink = Arc::new(MemoryFailureLog::new());
        let orchestrator = RecoveryOrchestrator::new(datafusion_adapter(&file).await)
            .with_sink(sink.clone());

        let outcome = orchestrator
            .run(
                "Here you go:\n```sql\nSELECT SUM(Value) AS total FROM trade WHERE Year = 2080\n```",
                Some("What was the total trade value in 2080?"),
            )
            .await;

        assert!(outcome.is_success(), "{}", outcome.message());
        assert_eq!(outcome.message(), "Success: 1 rows");
        assert_eq!(outcome.table().unwrap().get(0, "total"), Some(&json!(200.5)));
        assert!(sink.is_empty());
        orchestrator.adapter().close().await.unwrap();
    }

    #[tokio::test]
    async fn test_datafusion_parser_error_regenerated() {
        let file = trade_csv();
        let (calls, regen) = counting("SELECT SUM(Value) AS total FROM trade;");
        let orchestrator =
            RecoveryOrchestrator::new(datafusion_adapter(&file).await).with_regenerator(regen);

        let outcome = orchestrator
            .run("SELECT SUM(Value FROM trade;", Some("Total trade value?"))
            .await;

        assert!(outcome.is_success(), "{}", outcome.message());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.table().unwrap().get(0, "total"), Some(&json!(240.5)));
        assert_eq!(outcome.trace().visits(StateKind::Regenerating), 1);
        assert_eq!(outcome.trace().executions, 2);
    }

    #[tokio::test]
    async fn test_datafusion_unknown_column_fails_after_retries() {
        let file = trade_csv();
        let sink = Arc::new(MemoryFailureLog::new());
        let orchestrator = RecoveryOrchestrator::new(datafusion_adapter(&file).await)
            .with_sink(sink.clone())
            .with_max_retries(1);

        let outcome = orchestrator.run("SELECT Tariff FROM trade", None).await;

        assert_eq!(outcome.failure(), Some(FailureKind::Execution(ErrorClass::Other)));
        assert_eq!(outcome.trace().executions, 2);
        assert_eq!(sink.records()[0].sql, "SELECT Tariff FROM trade;");
    }
}
