use super::DiffProducer;
use crate::actions::{ClearBindings, CreateBindings};
use crate::admin::SharedAdmin;
use crate::topology::{Project, Topology};
use reconcile::{AccessBinding, ExecutionPlan, Operation, Result};
use std::collections::{BTreeSet, HashSet};
use std::io::Write;
use std::rc::Rc;

/// Converges access bindings onto the ones each project's principals need.
///
/// Compares against the bindings persisted by earlier runs, not against the
/// cluster's full ACL list, so bindings managed elsewhere are left alone.
pub struct AccessControlManager {
    admin: SharedAdmin,
    allow_delete: bool,
}

impl AccessControlManager {
    pub fn new(admin: SharedAdmin, allow_delete: bool) -> Self {
        Self {
            admin,
            allow_delete,
        }
    }
}

/// Bindings required by one project, in a stable order.
pub fn project_bindings(prefix: &str, project: &Project) -> BTreeSet<AccessBinding> {
    let mut bindings = BTreeSet::new();

    for consumer in &project.consumers {
        let principal = consumer.principal.as_str();
        bindings.insert(AccessBinding::prefixed_topic(prefix, principal, Operation::Read));
        bindings.insert(AccessBinding::prefixed_topic(
            prefix,
            principal,
            Operation::Describe,
        ));
        bindings.insert(AccessBinding::group(
            consumer.group(),
            principal,
            Operation::Read,
        ));
    }

    for producer in &project.producers {
        let principal = producer.principal.as_str();
        bindings.insert(AccessBinding::prefixed_topic(prefix, principal, Operation::Write));
        bindings.insert(AccessBinding::prefixed_topic(
            prefix,
            principal,
            Operation::Describe,
        ));
    }

    bindings
}

impl DiffProducer for AccessControlManager {
    fn name(&self) -> &'static str {
        "acls"
    }

    fn apply(&mut self, topology: &Topology, plan: &mut ExecutionPlan) -> Result<()> {
        let applied = plan.bindings().clone();
        let mut desired = HashSet::new();

        for project in &topology.projects {
            let prefix = topology.project_prefix(project);
            let mut missing = Vec::new();
            for binding in project_bindings(&prefix, project) {
                if !applied.contains(&binding) && !desired.contains(&binding) {
                    missing.push(binding.clone());
                }
                desired.insert(binding);
            }

            if !missing.is_empty() {
                log::debug!("Project {prefix} needs {} new bindings", missing.len());
                plan.add(Box::new(CreateBindings::new(Rc::clone(&self.admin), missing)))?;
            }
        }

        if self.allow_delete {
            let stale: BTreeSet<AccessBinding> = applied
                .into_iter()
                .filter(|b| !desired.contains(b))
                .collect();

            if !stale.is_empty() {
                plan.add(Box::new(ClearBindings::new(
                    Rc::clone(&self.admin),
                    stale.into_iter().collect(),
                )))?;
            }
        }

        Ok(())
    }

    fn print_current_state(&self, plan: &ExecutionPlan, out: &mut dyn Write) -> Result<()> {
        let bindings: BTreeSet<_> = plan.bindings().iter().collect();
        writeln!(out, "List of ACLs:")?;
        for binding in bindings {
            writeln!(out, "  {binding}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::testing::RecordingAdmin;
    use crate::producers::testing::{file_plan, sample_topology};
    use reconcile::{ActionKind, BindingEffect, PatternType, ResourceType};
    use tempfile::TempDir;

    fn all_desired(topology: &Topology) -> Vec<AccessBinding> {
        topology
            .projects
            .iter()
            .flat_map(|p| project_bindings(&topology.project_prefix(p), p))
            .collect()
    }

    #[test]
    fn test_project_bindings() {
        let topology = sample_topology();
        let billing = &topology.projects[0];
        let bindings = project_bindings("ctx.src.billing.", billing);

        // reader: 3, auditor: 3, writer: 2
        assert_eq!(bindings.len(), 8);
        assert!(bindings.contains(&AccessBinding::group("*", "User:reader", Operation::Read)));
        assert!(bindings.contains(&AccessBinding::prefixed_topic(
            "ctx.src.billing.",
            "User:writer",
            Operation::Write
        )));

        let audit_group = bindings
            .iter()
            .find(|b| b.resource_type == ResourceType::Group && b.principal == "User:auditor")
            .unwrap();
        assert_eq!(audit_group.resource_name, "audit");
        assert_eq!(audit_group.pattern, PatternType::Prefixed);
    }

    #[test]
    fn test_creates_missing_bindings_once() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let mut plan = file_plan(dir.path(), &[]);

        AccessControlManager::new(admin, false)
            .apply(&sample_topology(), &mut plan)
            .unwrap();

        assert_eq!(plan.len(), 2);
        let granted: Vec<AccessBinding> = plan
            .actions()
            .iter()
            .flat_map(|a| match a.effect() {
                BindingEffect::Grant(bindings) => bindings,
                other => panic!("unexpected effect {other:?}"),
            })
            .collect();

        // shipping's reader shares the any-group binding with billing's reader
        assert_eq!(granted.len(), 8 + 2);
        let unique: HashSet<_> = granted.iter().collect();
        assert_eq!(unique.len(), granted.len());
    }

    #[test]
    fn test_already_applied_yields_no_actions() {
        let dir = TempDir::new().unwrap();
        let topology = sample_topology();
        let mut plan = file_plan(dir.path(), &all_desired(&topology));

        AccessControlManager::new(RecordingAdmin::with_topics(Vec::<String>::new()), true)
            .apply(&topology, &mut plan)
            .unwrap();

        assert!(plan.is_empty());
    }

    #[test]
    fn test_stale_bindings_cleared_only_with_allow_delete() {
        let dir = TempDir::new().unwrap();
        let topology = sample_topology();
        let stale = AccessBinding::prefixed_topic("ctx.src.gone.", "User:old", Operation::Read);
        let mut applied = all_desired(&topology);
        applied.push(stale.clone());

        let mut keep = file_plan(dir.path(), &applied);
        AccessControlManager::new(RecordingAdmin::with_topics(Vec::<String>::new()), false)
            .apply(&topology, &mut keep)
            .unwrap();
        assert!(keep.is_empty());
        drop(keep);

        let mut clear = file_plan(dir.path(), &[]);
        AccessControlManager::new(RecordingAdmin::with_topics(Vec::<String>::new()), true)
            .apply(&topology, &mut clear)
            .unwrap();

        assert_eq!(clear.len(), 1);
        assert_eq!(clear.actions()[0].kind(), ActionKind::ClearBindings);
        assert_eq!(clear.actions()[0].effect(), BindingEffect::Revoke(vec![stale]));
    }

    #[test]
    fn test_apply_run_and_print() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let mut plan = file_plan(dir.path(), &[]);
        let mut manager = AccessControlManager::new(admin.clone(), false);

        manager.apply(&sample_topology(), &mut plan).unwrap();
        plan.run(false).unwrap();

        assert_eq!(admin.bindings.borrow().len(), 10);
        assert_eq!(plan.bindings().len(), 10);

        let mut out = Vec::new();
        manager.print_current_state(&plan, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("List of ACLs:"));
        assert!(out.contains("User:writer ALLOW WRITE:TOPIC:PREFIXED ctx.src.billing."));
    }
}
