//! Engine session
//!
//! Built once from a validated [`EngineConfig`] and shared by every
//! evaluation through an `Arc`. It owns the worker pool, the type catalogue
//! and the metrics; nothing in the engine reaches for a global instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::config::EngineConfig;
use crate::cluster::Cluster;
use crate::context::DynamicContext;
use crate::errors::EngineResult;
use crate::expression::{analyse, ExplainPlan, QueryModule};
use crate::item::Sequence;
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry, ObservationScope, Timer};
use crate::runtime::{evaluate, Compiler};
use crate::types::TypeCatalogue;

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    config: EngineConfig,
    catalogue: TypeCatalogue,
    metrics: MetricsRegistry,
    cluster: Cluster,
    logger: Logger,
}

impl Session {
    /// Validates the configuration and brings up the worker pool
    pub fn start(config: EngineConfig) -> EngineResult<Arc<Self>> {
        config.validate()?;
        let logger = Logger::new(config.severity());
        let _log = logger.attach();

        let id = Uuid::new_v4();
        let session_id = id.to_string();
        log_event_with_fields(Event::SessionStart, &[("session_id", &session_id)]);

        let cluster = Cluster::new(config.worker_threads, config.default_partitions, logger)?;

        let mut catalogue = TypeCatalogue::new();
        catalogue.declare_all(&config.type_declarations)?;
        log_event_with_fields(
            Event::TypesDeclared,
            &[("count", &catalogue.declared_count().to_string())],
        );

        let session = Self {
            id,
            started_at: Utc::now(),
            config,
            catalogue,
            metrics: MetricsRegistry::new(),
            cluster,
            logger,
        };

        log_event_with_fields(
            Event::SessionReady,
            &[
                ("default_partitions", &session.cluster.default_partitions().to_string()),
                ("session_id", &session_id),
                ("worker_threads", &session.cluster.worker_threads().to_string()),
            ],
        );
        Ok(Arc::new(session))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &TypeCatalogue {
        &self.catalogue
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// The logger this session's threads write through
    pub fn logger(&self) -> Logger {
        self.logger
    }

    /// Analyses, compiles and evaluates a module to a local sequence
    pub fn evaluate(self: &Arc<Self>, module: &QueryModule) -> EngineResult<Sequence> {
        let _log = self.logger.attach();
        let timer = Timer::new();
        log_event_with_fields(
            Event::QueryReceived,
            &[("functions", &module.functions.len().to_string())],
        );

        match self.run(module) {
            Ok(items) => {
                self.metrics.increment_queries_executed();
                log_event_with_fields(
                    Event::QueryExecuted,
                    &[
                        ("duration_ms", &timer.elapsed_ms()),
                        ("items", &items.len().to_string()),
                    ],
                );
                Ok(items)
            }
            Err(e) => {
                self.metrics.increment_queries_rejected();
                let position = e.position().map(|p| p.to_string()).unwrap_or_default();
                log_event_with_fields(
                    Event::QueryRejected,
                    &[
                        ("code", e.code().code()),
                        ("duration_ms", &timer.elapsed_ms()),
                        ("message", e.message()),
                        ("position", &position),
                    ],
                );
                Err(e)
            }
        }
    }

    fn run(self: &Arc<Self>, module: &QueryModule) -> EngineResult<Sequence> {
        analyse(module)?;
        log_event_with_fields(
            Event::QueryAnalysed,
            &[("mode", module.body.mode()?.as_str())],
        );

        let scope = ObservationScope::new("COMPILE");
        let (registry, body) = match Compiler::new(&self.catalogue).compile_module(module) {
            Ok(compiled) => {
                scope.complete();
                compiled
            }
            Err(e) => {
                scope.fail(e.message());
                return Err(e);
            }
        };

        let context = DynamicContext::root(Arc::clone(self), registry);
        self.cluster.install(|| evaluate(body.as_ref(), &context))
    }

    /// Analyses a module and reports the mode of every node
    pub fn explain(&self, module: &QueryModule) -> ExplainPlan {
        let _log = self.logger.attach();
        log_event_with_fields(Event::ExplainBegin, &[]);
        let plan = match analyse(module) {
            Ok(()) => ExplainPlan::from_module(module),
            Err(e) => ExplainPlan::from_error(&e),
        };
        log_event_with_fields(
            Event::ExplainComplete,
            &[("accepted", if plan.accepted { "true" } else { "false" })],
        );
        plan
    }

    /// Logs teardown with the final counters
    pub fn shutdown(&self) {
        let _log = self.logger.attach();
        let metrics = self.metrics.to_json();
        let uptime = (Utc::now() - self.started_at).num_milliseconds().to_string();
        log_event_with_fields(
            Event::SessionShutdown,
            &[
                ("metrics", &metrics),
                ("session_id", &self.id.to_string()),
                ("uptime_ms", &uptime),
            ],
        );
    }
}
