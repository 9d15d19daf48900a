use crate::{
    config::DeleteConfig,
    delete::{
        CancelToken, DeleteError, DeletePlan, DeleteReport, DeleteRequest, DeleteWarning,
        executor::Executor, gate::Gate, options::apply_options, resolve::Resolver,
    },
    error::{ErrorClass, ErrorOrigin, InternalError},
    obs::sink::{self, MetricsEvent, MetricsSink, with_metrics_sink},
    security::{PermissionOracle, Principal},
    spec::{DeleteSpecRegistry, UnshareablePolicy},
    store::EntityStore,
};
use tracing::{debug, info};

///
/// DeleteSession
///
/// Session-scoped delete handle: one principal acting on one store.
///
/// ```ignore
/// let report = DeleteSession::new(&registry, &mut store, &oracle, &principal)
///     .config(DeleteConfig::new().with_resolve_workers(4))
///     .delete(&DeleteRequest::new(EntityKind::Dataset, [1, 2]))?;
/// ```
///

pub struct DeleteSession<'a> {
    registry: &'a DeleteSpecRegistry,
    store: &'a mut dyn EntityStore,
    oracle: &'a dyn PermissionOracle,
    principal: &'a Principal,
    config: DeleteConfig,
    debug: bool,
    metrics: Option<&'static dyn MetricsSink>,
    cancel: CancelToken,
}

impl<'a> DeleteSession<'a> {
    #[must_use]
    pub fn new(
        registry: &'a DeleteSpecRegistry,
        store: &'a mut dyn EntityStore,
        oracle: &'a dyn PermissionOracle,
        principal: &'a Principal,
    ) -> Self {
        Self {
            registry,
            store,
            oracle,
            principal,
            config: DeleteConfig::default(),
            debug: false,
            metrics: None,
            cancel: CancelToken::new(),
        }
    }

    #[must_use]
    pub fn config(mut self, config: DeleteConfig) -> Self {
        self.config = config;
        self
    }

    /// Dump every settled plan node at debug level.
    #[must_use]
    pub const fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    #[must_use]
    pub const fn metrics_sink(mut self, sink: &'static dyn MetricsSink) -> Self {
        self.metrics = Some(sink);
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub const fn delete_config(&self) -> &DeleteConfig {
        &self.config
    }

    fn with_metrics<T>(&self, f: impl FnOnce() -> T) -> T {
        if let Some(sink) = self.metrics {
            with_metrics_sink(sink, f)
        } else {
            f()
        }
    }

    // ---------------------------------------------------------------------
    // Entrypoints
    // ---------------------------------------------------------------------

    /// Resolve, filter, and authorize `request` without touching the store.
    pub fn plan(&self, request: &DeleteRequest) -> Result<DeletePlan, DeleteError> {
        self.with_metrics(|| self.prepare(request).map(|(plan, _)| plan))
    }

    /// Delete the requested roots and everything that depends on them.
    pub fn delete(&mut self, request: &DeleteRequest) -> Result<DeleteReport, DeleteError> {
        let metrics = self.metrics;
        match metrics {
            Some(sink) => with_metrics_sink(sink, || self.execute(request)),
            None => self.execute(request),
        }
    }

    fn execute(&mut self, request: &DeleteRequest) -> Result<DeleteReport, DeleteError> {
        let (mut plan, warnings) = self.prepare(request)?;

        let execution = Executor::new(&mut *self.store, &self.config, &self.cancel)
            .execute(&mut plan)?;

        let mut report = DeleteReport::new(
            execution.state,
            &plan,
            execution.root_status,
            execution.outcomes,
        );
        report.nulled = execution.nulled;
        report.errors = execution.errors;
        report.warnings = warnings;

        sink::record(MetricsEvent::RequestFinish {
            kind: request.kind,
            kept: report.kept_refs.len() as u64,
        });
        info!(
            kind = %request.kind,
            state = %report.state,
            deleted = report.deleted_refs.len(),
            kept = report.kept_refs.len(),
            failed_roots = report.errors.len(),
            "delete finished"
        );

        Ok(report)
    }

    // Resolving and authorizing; nothing is written.
    fn prepare(
        &self,
        request: &DeleteRequest,
    ) -> Result<(DeletePlan, Vec<DeleteWarning>), DeleteError> {
        self.config.validate().map_err(|err| {
            InternalError::new(ErrorClass::Configuration, ErrorOrigin::Config, err.to_string())
        })?;

        let roots = request.roots();
        sink::record(MetricsEvent::RequestStart {
            kind: request.kind,
            roots: roots.len() as u64,
        });
        debug!(
            kind = %request.kind,
            roots = roots.len(),
            skip_head = request.skip_head,
            options = request.options.len(),
            "delete requested"
        );

        let store: &dyn EntityStore = &*self.store;
        let mut plan = Resolver::new(self.registry, store, &self.config, &self.cancel)
            .resolve(request)?;

        let kept = apply_options(&mut plan, &request.options, &self.policy());
        sink::record(MetricsEvent::PlanResolved {
            kind: request.kind,
            nodes: plan.len() as u64,
            lookups: plan.lookups(),
        });
        debug!(nodes = plan.len(), lookups = plan.lookups(), kept, "plan resolved");

        let warnings = Gate::new(
            store,
            self.oracle,
            self.principal,
            self.config.mode,
            request.skip_head,
            &self.cancel,
        )
        .authorize(&mut plan)?;

        if self.debug {
            dump_plan(&plan);
        }

        Ok((plan, warnings))
    }

    fn policy(&self) -> UnshareablePolicy {
        self.registry
            .policy()
            .clone()
            .with_namespaces(self.config.unshareable_namespaces.iter().cloned())
    }
}

fn dump_plan(plan: &DeletePlan) {
    for node in plan.nodes() {
        debug!(
            entity = %node.entity,
            action = %node.action,
            role = %node.role(),
            cause = ?node.cause(),
            depth = node.depth(),
            shared = node.shared_outside_set,
            authorized = node.authorized,
            reachable_from = ?node.reachable_from,
            "plan node"
        );
    }
}
