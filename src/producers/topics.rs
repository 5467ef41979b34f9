use super::DiffProducer;
use crate::actions::{CreateTopic, DeleteTopics, UpdateTopicConfig};
use crate::admin::{SharedAdmin, TopicSpec};
use crate::topology::Topology;
use reconcile::{ExecutionPlan, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::rc::Rc;

/// Converges the cluster's topics onto the described ones.
pub struct TopicManager {
    admin: SharedAdmin,
    allow_delete: bool,
}

impl TopicManager {
    pub fn new(admin: SharedAdmin, allow_delete: bool) -> Self {
        Self {
            admin,
            allow_delete,
        }
    }
}

impl DiffProducer for TopicManager {
    fn name(&self) -> &'static str {
        "topics"
    }

    fn apply(&mut self, topology: &Topology, plan: &mut ExecutionPlan) -> Result<()> {
        let live = self.admin.list_topics()?;
        let mut described = BTreeSet::new();

        for (name, topic) in topology.topics() {
            described.insert(name.clone());

            if !live.contains(&name) {
                let spec = TopicSpec {
                    name,
                    partitions: topic.partitions,
                    replication_factor: topic.replication_factor,
                    config: topic.config.clone(),
                };
                plan.add(Box::new(CreateTopic::new(Rc::clone(&self.admin), spec)))?;
                continue;
            }

            if topic.config.is_empty() {
                continue;
            }
            let current = self.admin.topic_config(&name)?;
            let changes: BTreeMap<String, String> = topic
                .config
                .iter()
                .filter(|(key, value)| current.get(*key) != Some(*value))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            if !changes.is_empty() {
                plan.add(Box::new(UpdateTopicConfig::new(
                    Rc::clone(&self.admin),
                    name,
                    changes,
                )))?;
            }
        }

        if self.allow_delete {
            let prefix = topology.prefix();
            let stale: BTreeSet<String> = live
                .into_iter()
                .filter(|t| t.starts_with(&prefix) && !described.contains(t))
                .collect();

            if !stale.is_empty() {
                log::debug!("{} topics under {prefix} are no longer described", stale.len());
                plan.add(Box::new(DeleteTopics::new(Rc::clone(&self.admin), stale)))?;
            }
        }

        Ok(())
    }

    fn print_current_state(&self, _plan: &ExecutionPlan, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "List of Topics:")?;
        for topic in self.admin.list_topics()? {
            writeln!(out, "  {topic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::testing::RecordingAdmin;
    use crate::producers::testing::{file_plan, sample_topology};
    use reconcile::ActionKind;
    use tempfile::TempDir;

    fn kinds(plan: &ExecutionPlan) -> Vec<ActionKind> {
        plan.actions().iter().map(|a| a.kind()).collect()
    }

    #[test]
    fn test_creates_missing_topics() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics(["ctx.src.billing.payments"]);
        let mut plan = file_plan(dir.path(), &[]);

        TopicManager::new(admin.clone(), false)
            .apply(&sample_topology(), &mut plan)
            .unwrap();

        let descriptions: Vec<_> = plan.actions().iter().map(|a| a.description()).collect();
        assert_eq!(
            descriptions,
            vec![
                "create topic ctx.src.billing.invoices (partitions=3, replication=1, retention.ms=1000)",
                "create topic ctx.src.shipping.parcels",
            ]
        );
        assert!(admin.mutations().is_empty());
    }

    #[test]
    fn test_updates_only_differing_config() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics([
            "ctx.src.billing.invoices",
            "ctx.src.billing.payments",
            "ctx.src.shipping.parcels",
        ]);
        admin
            .topics
            .borrow_mut()
            .get_mut("ctx.src.billing.invoices")
            .unwrap()
            .insert("retention.ms".into(), "5".into());

        let mut plan = file_plan(dir.path(), &[]);
        TopicManager::new(admin, false)
            .apply(&sample_topology(), &mut plan)
            .unwrap();

        assert_eq!(kinds(&plan), vec![ActionKind::UpdateTopicConfig]);
        assert_eq!(
            plan.actions()[0].description(),
            "update topic ctx.src.billing.invoices config (retention.ms=1000)"
        );
    }

    #[test]
    fn test_converged_cluster_yields_no_actions() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics([
            "ctx.src.billing.invoices",
            "ctx.src.billing.payments",
            "ctx.src.shipping.parcels",
            "ctx.src.legacy.old",
        ]);
        admin
            .topics
            .borrow_mut()
            .get_mut("ctx.src.billing.invoices")
            .unwrap()
            .insert("retention.ms".into(), "1000".into());

        let mut plan = file_plan(dir.path(), &[]);
        TopicManager::new(admin, false)
            .apply(&sample_topology(), &mut plan)
            .unwrap();

        assert!(plan.is_empty());
    }

    #[test]
    fn test_deletes_only_with_allow_delete_and_within_prefix() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics([
            "ctx.src.billing.invoices",
            "ctx.src.billing.payments",
            "ctx.src.shipping.parcels",
            "ctx.src.legacy.old",
            "other.team.topic",
        ]);
        admin
            .topics
            .borrow_mut()
            .get_mut("ctx.src.billing.invoices")
            .unwrap()
            .insert("retention.ms".into(), "1000".into());

        let mut plan = file_plan(dir.path(), &[]);
        TopicManager::new(admin, true)
            .apply(&sample_topology(), &mut plan)
            .unwrap();

        assert_eq!(kinds(&plan), vec![ActionKind::DeleteTopics]);
        assert_eq!(plan.actions()[0].description(), "delete topics ctx.src.legacy.old");
    }

    #[test]
    fn test_apply_then_print() {
        let dir = TempDir::new().unwrap();
        let admin = RecordingAdmin::with_topics(Vec::<String>::new());
        let mut plan = file_plan(dir.path(), &[]);
        let mut manager = TopicManager::new(admin, false);

        manager.apply(&sample_topology(), &mut plan).unwrap();
        plan.run(false).unwrap();

        let mut out = Vec::new();
        manager.print_current_state(&plan, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("List of Topics:"));
        assert!(out.contains("ctx.src.billing.payments"));
        assert!(out.contains("ctx.src.shipping.parcels"));
    }
}
