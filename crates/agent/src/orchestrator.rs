//! The research pipeline: plan, search, write, email.
//!
//! `run` returns immediately with a [`ResearchStream`]; the pipeline runs on
//! its own task and pushes progress chunks as each stage finishes. A
//! successful run always ends with the report markdown.

use crate::invoker::AgentInvoker;
use crate::roles::{AgentOutput, AgentTask};
use crate::stream::{ChunkSender, ResearchStream};
use deepresearch_config::ResearchConfig;
use deepresearch_core::error::{AgentError, Error};
use deepresearch_core::event::{DomainEvent, EventBus};
use deepresearch_core::research::{EmailReceipt, ReportData, SearchItem};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchOptions {
    /// Planned searches beyond this are dropped
    pub max_searches: usize,

    /// Searches in flight at once
    pub search_concurrency: usize,

    pub send_email: bool,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self::from(&ResearchConfig::default())
    }
}

impl From<&ResearchConfig> for ResearchOptions {
    fn from(config: &ResearchConfig) -> Self {
        Self {
            max_searches: config.max_searches,
            search_concurrency: config.search_concurrency,
            send_email: config.send_email,
        }
    }
}

pub struct ResearchOrchestrator {
    invoker: Arc<dyn AgentInvoker>,
    options: ResearchOptions,
    event_bus: Arc<EventBus>,
}

impl ResearchOrchestrator {
    pub fn new(invoker: Arc<dyn AgentInvoker>, options: ResearchOptions, event_bus: Arc<EventBus>) -> Self {
        Self {
            invoker,
            options,
            event_bus,
        }
    }

    /// Start a run. Must be called within a tokio runtime.
    pub fn run(self, prompt: impl Into<String>) -> ResearchStream {
        let (tx, stream) = ResearchStream::channel();
        self.spawn(prompt.into(), tx);
        stream
    }

    /// Start a run that writes into an existing stream.
    pub fn spawn(self, prompt: String, tx: ChunkSender) -> JoinHandle<()> {
        let _ = tx.status("🔎 Planning searches...");
        tokio::spawn(self.run_with_sender(prompt, tx))
    }

    pub(crate) async fn run_with_sender(self, prompt: String, tx: ChunkSender) {
        let start = Instant::now();
        match self.execute(&prompt, &tx).await {
            Ok(()) => info!(duration_ms = start.elapsed().as_millis() as u64, "Research run complete"),
            Err(Error::Agent(AgentError::Cancelled)) => info!("Research run cancelled"),
            Err(e) => {
                error!(error = %e, "Research run failed");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "research".into(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                let _ = tx.error(format!("❌ Research failed: {e}"));
            }
        }
    }

    async fn execute(&self, prompt: &str, tx: &ChunkSender) -> Result<(), Error> {
        let items = self.timed("plan", self.plan(prompt, tx)).await?;
        tx.status(format!("Searches planned, starting {} searches...", items.len()))?;

        let summaries = self.timed("search", self.search(items, tx)).await?;
        tx.status("Searches complete, writing report...")?;

        let report = self.timed("write", self.write(prompt, summaries, tx)).await?;

        if self.options.send_email {
            tx.status("Report written, sending email...")?;
            self.timed("email", self.email(&report, tx)).await?;
        } else {
            tx.status("Report written, research complete")?;
        }

        tx.report(report.markdown_report)?;
        Ok(())
    }

    async fn timed<T>(&self, stage: &str, fut: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        let start = Instant::now();
        let result = fut.await?;
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(stage, duration_ms, "Stage complete");
        self.event_bus.publish(DomainEvent::StageCompleted {
            stage: stage.to_string(),
            duration_ms,
            timestamp: chrono::Utc::now(),
        });
        Ok(result)
    }

    /// Invoke an agent, giving up as soon as the consumer goes away.
    async fn invoke(&self, task: AgentTask, tx: &ChunkSender) -> Result<AgentOutput, Error> {
        tokio::select! {
            biased;
            _ = tx.cancelled() => Err(AgentError::Cancelled.into()),
            result = self.invoker.invoke(task) => result,
        }
    }

    async fn plan(&self, prompt: &str, tx: &ChunkSender) -> Result<Vec<SearchItem>, Error> {
        let plan = self
            .invoke(AgentTask::Plan { prompt: prompt.to_string() }, tx)
            .await?
            .into_plan()?;

        let mut items: Vec<SearchItem> = plan
            .searches
            .into_iter()
            .filter(|item| !item.query.trim().is_empty())
            .collect();
        if items.is_empty() {
            return Err(AgentError::EmptyPlan.into());
        }
        if items.len() > self.options.max_searches {
            info!(planned = items.len(), max = self.options.max_searches, "Truncating search plan");
            items.truncate(self.options.max_searches.max(1));
        }
        Ok(items)
    }

    async fn search(&self, items: Vec<SearchItem>, tx: &ChunkSender) -> Result<Vec<String>, Error> {
        let total = items.len();
        let searches = futures::stream::iter(items)
            .map(|item| {
                let invoker = self.invoker.clone();
                async move {
                    let query = item.query.clone();
                    let result = invoker.invoke(AgentTask::Search { item }).await;
                    (query, result.and_then(|output| output.into_summary().map_err(Error::from)))
                }
            })
            .buffer_unordered(self.options.search_concurrency.max(1));
        let mut searches = std::pin::pin!(searches);

        let mut summaries = Vec::with_capacity(total);
        let mut done = 0;
        let mut failed = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = tx.cancelled() => return Err(AgentError::Cancelled.into()),
                next = searches.next() => next,
            };
            let Some((query, result)) = next else { break };

            done += 1;
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    failed += 1;
                    warn!(%query, error = %e, "Search failed, skipping");
                }
            }

            if failed == 0 {
                tx.status(format!("Searching... {done}/{total} completed"))?;
            } else {
                tx.status(format!("Searching... {done}/{total} completed ({failed} failed)"))?;
            }
        }

        if summaries.is_empty() {
            return Err(AgentError::AllSearchesFailed { attempted: total }.into());
        }
        Ok(summaries)
    }

    async fn write(&self, prompt: &str, summaries: Vec<String>, tx: &ChunkSender) -> Result<ReportData, Error> {
        let task = AgentTask::Write {
            prompt: prompt.to_string(),
            summaries,
        };
        Ok(self.invoke(task, tx).await?.into_report()?)
    }

    /// Email failures become a warning chunk; only cancellation aborts.
    async fn email(&self, report: &ReportData, tx: &ChunkSender) -> Result<(), Error> {
        let task = AgentTask::Email {
            report: report.markdown_report.clone(),
        };
        let receipt = match self.invoke(task, tx).await {
            Ok(output) => output.into_receipt().map_err(Error::from),
            Err(e) => Err(e),
        };

        match receipt {
            Ok(EmailReceipt::Success { id }) => {
                info!(%id, "Report emailed");
                tx.status("Email sent, research complete")?;
            }
            Ok(EmailReceipt::Error { message }) => {
                warn!(%message, "Email tool reported a failure");
                tx.warning(format!("⚠️ Email not sent: {message}"))?;
            }
            Err(Error::Agent(AgentError::Cancelled)) => return Err(AgentError::Cancelled.into()),
            Err(e) => {
                warn!(error = %e, "Emailer failed");
                tx.warning(format!("⚠️ Email not sent: {e}"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ResearchEvent;
    use crate::test_helpers::ScriptedInvoker;
    use deepresearch_core::error::ProviderError;
    use deepresearch_core::research::SearchPlan;
    use std::time::Duration;

    fn plan(queries: &[&str]) -> AgentOutput {
        AgentOutput::Plan(SearchPlan {
            searches: queries
                .iter()
                .map(|q| SearchItem {
                    reason: format!("covers {q}"),
                    query: q.to_string(),
                })
                .collect(),
        })
    }

    fn report() -> AgentOutput {
        AgentOutput::Report(ReportData {
            short_summary: "short".into(),
            markdown_report: "# Final Report".into(),
            follow_up_questions: vec![],
        })
    }

    /// Happy-path script: three searches, every stage succeeds.
    fn happy(task: &AgentTask) -> Result<AgentOutput, Error> {
        Ok(match task {
            AgentTask::Plan { .. } => plan(&["a", "b", "c"]),
            AgentTask::Search { item } => AgentOutput::Summary(format!("summary of {}", item.query)),
            AgentTask::Write { .. } => report(),
            AgentTask::Email { .. } => AgentOutput::Email(EmailReceipt::Success { id: "em_1".into() }),
            AgentTask::Clarify { .. } => unreachable!(),
        })
    }

    fn orchestrator(invoker: Arc<ScriptedInvoker>, options: ResearchOptions) -> ResearchOrchestrator {
        ResearchOrchestrator::new(invoker, options, Arc::new(EventBus::default()))
    }

    fn options() -> ResearchOptions {
        ResearchOptions {
            max_searches: 5,
            search_concurrency: 2,
            send_email: true,
        }
    }

    #[tokio::test]
    async fn successful_run_ends_with_the_report() {
        let invoker = Arc::new(ScriptedInvoker::new(happy));
        let events = orchestrator(invoker.clone(), options()).run("prompt").collect_all().await;

        assert_eq!(events.first().unwrap().text(), "🔎 Planning searches...");
        assert_eq!(
            events.last().unwrap(),
            &ResearchEvent::Report { markdown: "# Final Report".into() }
        );
        assert!(events.iter().any(|e| e.text() == "Searching... 3/3 completed"));
        assert!(events.iter().any(|e| e.text() == "Email sent, research complete"));
        assert!(events.iter().all(|e| !matches!(e, ResearchEvent::Error { .. } | ResearchEvent::Warning { .. })));
        // plan + 3 searches + write + email
        assert_eq!(invoker.call_count(), 6);
    }

    #[tokio::test]
    async fn writer_sees_every_summary() {
        let invoker = Arc::new(ScriptedInvoker::new(happy));
        orchestrator(invoker.clone(), options()).run("prompt").collect_all().await;

        let write = invoker
            .calls()
            .into_iter()
            .find_map(|t| match t {
                AgentTask::Write { prompt, mut summaries } => {
                    summaries.sort();
                    Some((prompt, summaries))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(write.0, "prompt");
        assert_eq!(write.1, vec!["summary of a", "summary of b", "summary of c"]);
    }

    #[tokio::test]
    async fn plan_is_capped_at_max_searches() {
        let invoker = Arc::new(ScriptedInvoker::new(|task| match task {
            AgentTask::Plan { .. } => Ok(plan(&["1", "2", "3", "4", "5", "6", "7"])),
            other => happy(other),
        }));
        let mut opts = options();
        opts.max_searches = 2;
        let events = orchestrator(invoker.clone(), opts).run("p").collect_all().await;

        let searches = invoker.calls().iter().filter(|t| matches!(t, AgentTask::Search { .. })).count();
        assert_eq!(searches, 2);
        assert!(events.iter().any(|e| e.text() == "Searching... 2/2 completed"));
    }

    #[tokio::test]
    async fn plan_failure_is_one_error_chunk() {
        let invoker = Arc::new(ScriptedInvoker::new(|task| match task {
            AgentTask::Plan { .. } => Err(ProviderError::Timeout("planner".into()).into()),
            other => happy(other),
        }));
        let events = orchestrator(invoker.clone(), options()).run("p").collect_all().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], ResearchEvent::Error { message } if message.starts_with("❌ Research failed:")));
        assert_eq!(invoker.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_plan_is_an_error() {
        let invoker = Arc::new(ScriptedInvoker::new(|task| match task {
            AgentTask::Plan { .. } => Ok(plan(&[])),
            other => happy(other),
        }));
        let events = orchestrator(invoker, options()).run("p").collect_all().await;
        assert_eq!(
            events.last().unwrap(),
            &ResearchEvent::Error {
                message: "❌ Research failed: Agent error: planner returned no searches".into()
            }
        );
    }

    #[tokio::test]
    async fn failed_searches_are_skipped() {
        let invoker = Arc::new(ScriptedInvoker::new(|task| match task {
            AgentTask::Search { item } if item.query == "b" => {
                Err(ProviderError::Network("reset".into()).into())
            }
            other => happy(other),
        }));
        let mut opts = options();
        opts.search_concurrency = 1;
        let events = orchestrator(invoker.clone(), opts).run("p").collect_all().await;

        assert!(events.iter().any(|e| e.text() == "Searching... 3/3 completed (1 failed)"));
        assert!(matches!(events.last().unwrap(), ResearchEvent::Report { .. }));
        let summaries = invoker
            .calls()
            .into_iter()
            .find_map(|t| match t {
                AgentTask::Write { summaries, .. } => Some(summaries),
                _ => None,
            })
            .unwrap();
        assert_eq!(summaries.len(), 2);
    }

    #[tokio::test]
    async fn all_searches_failing_is_an_error() {
        let invoker = Arc::new(ScriptedInvoker::new(|task| match task {
            AgentTask::Search { .. } => Err(AgentError::UnexpectedOutput {
                role: "researcher".into(),
                reason: "empty summary".into(),
            }
            .into()),
            other => happy(other),
        }));
        let events = orchestrator(invoker.clone(), options()).run("p").collect_all().await;

        assert_eq!(
            events.last().unwrap().text(),
            "❌ Research failed: Agent error: all 3 searches failed"
        );
        assert!(!invoker.calls().iter().any(|t| matches!(t, AgentTask::Write { .. })));
    }

    #[tokio::test]
    async fn writer_failure_is_one_error_chunk() {
        let invoker = Arc::new(ScriptedInvoker::new(|task| match task {
            AgentTask::Write { .. } => Err(AgentError::UnexpectedOutput {
                role: "writer".into(),
                reason: "invalid JSON".into(),
            }
            .into()),
            other => happy(other),
        }));
        let events = orchestrator(invoker, options()).run("p").collect_all().await;

        let errors = events.iter().filter(|e| matches!(e, ResearchEvent::Error { .. })).count();
        assert_eq!(errors, 1);
        assert!(matches!(events.last().unwrap(), ResearchEvent::Error { .. }));
        assert!(!events.iter().any(|e| matches!(e, ResearchEvent::Report { .. })));
    }

    #[tokio::test]
    async fn email_failure_warns_and_still_reports() {
        let invoker = Arc::new(ScriptedInvoker::new(|task| match task {
            AgentTask::Email { .. } => Ok(AgentOutput::Email(EmailReceipt::Error {
                message: "HTTP 401: API key is invalid".into(),
            })),
            other => happy(other),
        }));
        let events = orchestrator(invoker, options()).run("p").collect_all().await;

        let n = events.len();
        assert_eq!(
            events[n - 2],
            ResearchEvent::Warning {
                message: "⚠️ Email not sent: HTTP 401: API key is invalid".into()
            }
        );
        assert_eq!(events[n - 1], ResearchEvent::Report { markdown: "# Final Report".into() });
    }

    #[tokio::test]
    async fn email_is_skipped_when_disabled() {
        let invoker = Arc::new(ScriptedInvoker::new(happy));
        let mut opts = options();
        opts.send_email = false;
        let events = orchestrator(invoker.clone(), opts).run("p").collect_all().await;

        assert!(!invoker.calls().iter().any(|t| matches!(t, AgentTask::Email { .. })));
        assert!(matches!(events.last().unwrap(), ResearchEvent::Report { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_stops_the_pipeline() {
        let invoker = Arc::new(ScriptedInvoker::new(happy).with_delay(Duration::from_secs(10)));
        let orchestrator = orchestrator(invoker.clone(), options());
        let (tx, stream) = ResearchStream::channel();
        let handle = orchestrator.spawn("p".into(), tx);

        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(stream);
        handle.await.unwrap();

        // Only the planner was reached before the consumer left.
        assert_eq!(invoker.call_count(), 1);
    }

    #[tokio::test]
    async fn stages_publish_events() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let invoker = Arc::new(ScriptedInvoker::new(happy));
        ResearchOrchestrator::new(invoker, options(), bus)
            .run("p")
            .collect_all()
            .await;

        let mut stages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::StageCompleted { stage, .. } = event.as_ref() {
                stages.push(stage.clone());
            }
        }
        assert_eq!(stages, vec!["plan", "search", "write", "email"]);
    }
}
