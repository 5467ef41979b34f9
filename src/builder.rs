//! Reconciliation run orchestration.

use crate::admin::SharedAdmin;
use crate::admin::rest::RestProxyAdmin;
use crate::config::{BuilderConfig, Properties};
use crate::producers::{AccessControlManager, DiffProducer, TopicManager};
use crate::topology::{Topology, parser};
use crate::validate::TopologyValidator;
use reconcile::{
    BackendSettings, ExecutionPlan, PlanSummary, ReportSink, Result, StateController,
};
use std::io::Write;
use std::rc::Rc;

/// One configured reconciliation: parsed topology, admin client, producers.
///
/// The admin client is closed exactly once, by [`TopologyBuilder::close`] or
/// on drop, whichever comes first.
pub struct TopologyBuilder {
    config: BuilderConfig,
    properties: Properties,
    backend: BackendSettings,
    topology: Topology,
    admin: SharedAdmin,
    topic_manager: Box<dyn DiffProducer>,
    access_control_manager: Box<dyn DiffProducer>,
    sink: ReportSink,
    closed: bool,
}

impl TopologyBuilder {
    /// Build against the REST proxy named in the client configuration.
    pub fn build(config: BuilderConfig, sink: ReportSink) -> Result<Self> {
        Self::build_with(config, sink, |properties| {
            let admin = RestProxyAdmin::new(properties.rest_proxy_url());
            log::debug!("Using the REST proxy at {}", admin.base_url());
            let admin: SharedAdmin = Rc::new(admin);
            admin
        })
    }

    /// Build with a caller-supplied admin client.
    ///
    /// `connect` only runs once both input files are known to exist.
    pub fn build_with<F>(config: BuilderConfig, sink: ReportSink, connect: F) -> Result<Self>
    where
        F: FnOnce(&Properties) -> SharedAdmin,
    {
        config.verify_required_parameters()?;
        let properties = config.load_properties()?;
        let admin = connect(&properties);

        let mut builder = Self {
            topic_manager: Box::new(TopicManager::new(Rc::clone(&admin), config.allow_delete)),
            access_control_manager: Box::new(AccessControlManager::new(
                Rc::clone(&admin),
                config.allow_delete,
            )),
            backend: BackendSettings::default(),
            topology: Topology::default(),
            config,
            properties,
            admin,
            sink,
            closed: false,
        };

        // From here on a failure drops the builder, which closes the admin
        builder.backend = builder.properties.backend_settings()?;
        builder.topology = parser::parse_path(&builder.config.topology)?;
        TopologyValidator::new().validate_or_err(&builder.topology)?;

        log::debug!(
            "Built topology '{}' with {} projects ({} state backend)",
            builder.topology.context,
            builder.topology.projects.len(),
            builder.backend.kind()
        );
        Ok(builder)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn backend(&self) -> &BackendSettings {
        &self.backend
    }

    pub fn set_topic_manager(&mut self, producer: Box<dyn DiffProducer>) {
        self.topic_manager = producer;
    }

    pub fn set_access_control_manager(&mut self, producer: Box<dyn DiffProducer>) {
        self.access_control_manager = producer;
    }

    /// Run once against the configured state backend.
    pub fn run(&mut self) -> Result<PlanSummary> {
        let controller = StateController::from_settings(&self.backend);
        let plan = ExecutionPlan::init(controller, self.sink.clone())?;
        self.run_with_plan(plan)
    }

    /// Populate, run and report on a caller-provided plan.
    pub fn run_with_plan(&mut self, mut plan: ExecutionPlan) -> Result<PlanSummary> {
        let result = self.reconcile(&mut plan);
        let flushed = self.sink.flush();
        let summary = result?;
        flushed?;
        Ok(summary)
    }

    fn reconcile(&mut self, plan: &mut ExecutionPlan) -> Result<PlanSummary> {
        for producer in [&mut self.topic_manager, &mut self.access_control_manager] {
            log::debug!("Running the {} diff producer", producer.name());
            producer.apply(&self.topology, plan)?;
        }

        let summary = plan.run(self.config.dry_run)?;

        if !self.config.quiet && !self.config.dry_run {
            let mut out = self.sink.clone();
            for producer in [&self.topic_manager, &self.access_control_manager] {
                producer.print_current_state(plan, &mut out)?;
            }
        }

        Ok(summary)
    }

    /// Release the admin client. Later calls are no-ops.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.admin.close();
        }
    }
}

impl Drop for TopologyBuilder {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::testing::RecordingAdmin;
    use reconcile::{AccessBinding, Backend, Error, SharedBuffer};
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    /// Client config persisting state inside `dir`.
    fn client_config(dir: &Path) -> PathBuf {
        let path = dir.join("client.properties");
        fs::write(
            &path,
            format!(
                "bootstrap.servers=localhost:9092\ntopology.state.file={}\n",
                dir.join("cluster-state").display()
            ),
        )
        .unwrap();
        path
    }

    fn config(topology: PathBuf, client: PathBuf) -> BuilderConfig {
        BuilderConfig::new(topology, client)
    }

    fn build(
        config: BuilderConfig,
        admin: &Rc<RecordingAdmin>,
        output: &SharedBuffer,
    ) -> TopologyBuilder {
        let shared: SharedAdmin = admin.clone();
        TopologyBuilder::build_with(config, output.sink(), move |_| shared).unwrap()
    }

    #[derive(Clone, Default)]
    struct CountingProducer {
        applies: Rc<Cell<usize>>,
        prints: Rc<Cell<usize>>,
    }

    impl DiffProducer for CountingProducer {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn apply(&mut self, _topology: &Topology, _plan: &mut ExecutionPlan) -> Result<()> {
            self.applies.set(self.applies.get() + 1);
            Ok(())
        }

        fn print_current_state(&self, _plan: &ExecutionPlan, out: &mut dyn Write) -> Result<()> {
            self.prints.set(self.prints.get() + 1);
            writeln!(out, "counting report")?;
            Ok(())
        }
    }

    /// Producer appending its name to a log shared with other producers.
    struct OrderedProducer {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl DiffProducer for OrderedProducer {
        fn name(&self) -> &'static str {
            self.name
        }

        fn apply(&mut self, _topology: &Topology, _plan: &mut ExecutionPlan) -> Result<()> {
            self.log.borrow_mut().push(self.name);
            Ok(())
        }

        fn print_current_state(&self, _plan: &ExecutionPlan, _out: &mut dyn Write) -> Result<()> {
            self.log.borrow_mut().push(self.name);
            Ok(())
        }
    }

    /// Remote-store stand-in counting lifecycle calls.
    #[derive(Clone, Default)]
    struct CountingBackend {
        opens: Arc<Mutex<usize>>,
        stored: Arc<Mutex<HashSet<AccessBinding>>>,
    }

    impl Backend for CountingBackend {
        fn name(&self) -> &'static str {
            "redis"
        }

        fn create_or_open(&mut self) -> Result<()> {
            *self.opens.lock().unwrap() += 1;
            Ok(())
        }

        fn save_type(&mut self, _tag: &str) -> Result<()> {
            Ok(())
        }

        fn save_bindings(&mut self, bindings: &HashSet<AccessBinding>) -> Result<()> {
            *self.stored.lock().unwrap() = bindings.clone();
            Ok(())
        }

        fn load(&mut self) -> Result<HashSet<AccessBinding>> {
            Ok(self.stored.lock().unwrap().clone())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_missing_topology_fails_before_connecting() {
        let dir = TempDir::new().unwrap();
        let connected = Cell::new(false);

        let result = TopologyBuilder::build_with(
            config(dir.path().join("missing.yaml"), client_config(dir.path())),
            ReportSink::discard(),
            |_| {
                connected.set(true);
                let admin: SharedAdmin = RecordingAdmin::with_topics(Vec::<String>::new());
                admin
            },
        );

        assert!(result.err().unwrap().is_config());
        assert!(!connected.get());
    }

    #[test]
    fn test_missing_client_config() {
        let dir = TempDir::new().unwrap();
        let result = TopologyBuilder::build(
            config(fixture("descriptor.yaml"), dir.path().join("missing.properties")),
            ReportSink::discard(),
        );

        let err = result.err().unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("client configuration"));
    }

    #[test]
    fn test_build_from_directory() {
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let builder = build(
            config(fixture("dir"), fixture("client-config.properties")),
            &admin,
            &SharedBuffer::new(),
        );

        assert_eq!(builder.topology().projects.len(), 4);
        assert_eq!(builder.properties().get("bootstrap.servers"), Some("localhost:9092"));
    }

    #[test]
    fn test_redis_backend_selected_from_properties() {
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let builder = build(
            config(fixture("descriptor.yaml"), fixture("client-config-redis.properties")),
            &admin,
            &SharedBuffer::new(),
        );

        assert_eq!(
            builder.backend(),
            &BackendSettings::Redis {
                host: "localhost".into(),
                port: 6379,
            }
        );
    }

    #[test]
    fn test_validation_failure_closes_admin() {
        let dir = TempDir::new().unwrap();
        let topology = dir.path().join("bad.yaml");
        fs::write(
            &topology,
            "context: ctx\nprojects:\n  - name: p\n    topics:\n      - name: \"bad topic\"\n        partitions: 0\n",
        )
        .unwrap();
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let shared: SharedAdmin = admin.clone();

        let result = TopologyBuilder::build_with(
            config(topology, client_config(dir.path())),
            ReportSink::discard(),
            move |_| shared,
        );

        match result.err().unwrap() {
            Error::Validation { findings } => assert_eq!(findings.len(), 2),
            other => panic!("expected validation error, got {other}"),
        }
        assert_eq!(admin.close_count(), 1);
        assert!(admin.mutations().is_empty());
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let dir = TempDir::new().unwrap();
        let client = dir.path().join("client.properties");
        fs::write(&client, "topology.state.backend=zookeeper\n").unwrap();

        let result = TopologyBuilder::build_with(
            config(fixture("descriptor.yaml"), client),
            ReportSink::discard(),
            |_| -> SharedAdmin { RecordingAdmin::with_topics(Vec::<String>::new()) },
        );
        assert!(result.err().unwrap().is_config());
    }

    #[test]
    fn test_close_is_idempotent() {
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let mut builder = build(
            config(fixture("descriptor.yaml"), fixture("client-config.properties")),
            &admin,
            &SharedBuffer::new(),
        );

        builder.close();
        builder.close();
        drop(builder);
        assert_eq!(admin.close_count(), 1);
    }

    #[test]
    fn test_run_invokes_each_producer_once_and_reports() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let output = SharedBuffer::new();
        let mut builder = build(
            config(fixture("descriptor.yaml"), client_config(dir.path())),
            &admin,
            &output,
        );

        let topics = CountingProducer::default();
        let acls = CountingProducer::default();
        builder.set_topic_manager(Box::new(topics.clone()));
        builder.set_access_control_manager(Box::new(acls.clone()));

        builder.run().unwrap();

        assert_eq!(topics.applies.get(), 1);
        assert_eq!(acls.applies.get(), 1);
        assert_eq!(topics.prints.get(), 1);
        assert_eq!(acls.prints.get(), 1);
        assert_eq!(output.contents().matches("counting report").count(), 2);
    }

    #[test]
    fn test_topics_run_before_acls() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let mut builder = build(
            config(fixture("descriptor.yaml"), client_config(dir.path())),
            &admin,
            &SharedBuffer::new(),
        );

        let log = Rc::new(RefCell::new(Vec::new()));
        builder.set_access_control_manager(Box::new(OrderedProducer {
            name: "acls",
            log: Rc::clone(&log),
        }));
        builder.set_topic_manager(Box::new(OrderedProducer {
            name: "topics",
            log: Rc::clone(&log),
        }));

        builder.run().unwrap();

        // apply, then report, both in topic-then-acl order
        assert_eq!(*log.borrow(), vec!["topics", "acls", "topics", "acls"]);
    }

    #[test]
    fn test_remote_backend_opened_twice_per_run() {
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let mut builder = build(
            config(fixture("descriptor.yaml"), fixture("client-config-redis.properties")),
            &admin,
            &SharedBuffer::new(),
        );
        let topics = CountingProducer::default();
        let acls = CountingProducer::default();
        builder.set_topic_manager(Box::new(topics.clone()));
        builder.set_access_control_manager(Box::new(acls.clone()));

        let backend = CountingBackend::default();
        let controller = StateController::new(Box::new(backend.clone()));
        let plan = ExecutionPlan::init(controller, ReportSink::discard()).unwrap();
        builder.run_with_plan(plan).unwrap();

        assert_eq!(*backend.opens.lock().unwrap(), 2);
        assert_eq!(topics.applies.get(), 1);
        assert_eq!(acls.applies.get(), 1);
    }

    #[test]
    fn test_quiet_run_skips_report() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let output = SharedBuffer::new();
        let mut cfg = config(fixture("descriptor.yaml"), client_config(dir.path()));
        cfg.quiet = true;
        let mut builder = build(cfg, &admin, &output);
        let topics = CountingProducer::default();
        builder.set_topic_manager(Box::new(topics.clone()));

        builder.run().unwrap();

        assert_eq!(topics.applies.get(), 1);
        assert_eq!(topics.prints.get(), 0);
        assert!(output.contents().is_empty());
    }

    #[test]
    fn test_dry_run_previews_without_mutating() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let output = SharedBuffer::new();
        let mut cfg = config(fixture("descriptor.yaml"), client_config(dir.path()));
        cfg.dry_run = true;
        let mut builder = build(cfg, &admin, &output);

        let summary = builder.run().unwrap();

        assert_eq!(summary.executed, 0);
        assert!(summary.previewed > 0);
        assert!(admin.mutations().is_empty());
        assert!(!dir.path().join("cluster-state").exists());

        let report = output.contents();
        assert!(report.contains("Execution plan (dry run)"));
        assert!(report.contains("create topic contextOrg.source.foo.foo"));
        assert!(!report.contains("List of Topics:"));
    }

    #[test]
    fn test_end_to_end_apply_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());

        let output = SharedBuffer::new();
        let mut builder = build(
            config(fixture("descriptor.yaml"), client_config(dir.path())),
            &admin,
            &output,
        );
        let first = builder.run().unwrap();
        drop(builder);

        // foo: foo, bar; bar: bar
        assert_eq!(admin.topics.borrow().len(), 3);
        assert!(first.granted > 0);
        assert!(dir.path().join("cluster-state").exists());
        let report = output.contents();
        assert!(report.contains("List of Topics:"));
        assert!(report.contains("List of ACLs:"));

        let mut again = build(
            config(fixture("descriptor.yaml"), client_config(dir.path())),
            &admin,
            &SharedBuffer::new(),
        );
        let second = again.run().unwrap();
        assert_eq!(second.total(), 0);
        drop(again);
        assert_eq!(admin.close_count(), 2);
    }
}
