//! Applying plans to a provider.
//!
//! A [`Plan`] works on whole record sets, while providers only store single-valued records.
//! The executor first compiles every action of a plan into provider [`Operation`]s, resolving
//! all names against the managed domains, and only then starts changing records.
//! A name outside the managed domains therefore fails the whole plan before anything is modified,
//! no matter if it is to be created, updated or deleted.
//!
//! Existing records are always addressed through the domain they were listed from.
//! Only new records are placed by resolving their name.
//!
//! Operations run one after another, the first failure aborts the run. There is no rollback:
//! operations that already went through stay applied and are picked up by the next reconciliation pass.

use std::{collections::HashSet, fmt::Display};

use log::{debug, error, info, trace};
use thiserror::Error;

use crate::{
    config::Ttl,
    endpoint::{Changes, Endpoint},
    fqdn::{ManagedDomains, ResolveError},
    plan::{Action, Plan},
    provider::{
        self, NewRecord, Provider, ProviderError, RecordId, RecordRef, RecordSet, RemoteRecord,
    },
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("no provider record id known for record set `{0}`")]
    MissingRecordId(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A single call against the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Delete { domain: String, id: RecordId },
    Update(RemoteRecord),
    Add { domain: String, record: NewRecord },
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Delete { domain, id } => write!(f, "delete #{} in {}", id, domain),
            Operation::Update(r) => write!(f, "update {}", r),
            Operation::Add { domain, record } => write!(f, "add {} in {}", record, domain),
        }
    }
}

/// Summary of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunResult {
    pub deleted: usize,
    pub updated: usize,
    pub added: usize,
}

impl RunResult {
    pub fn total(&self) -> usize {
        self.deleted + self.updated + self.added
    }
}

/// An executor performs the complete set of provider calls needed to bring records up-to-date
pub struct Executor<'a> {
    provider: &'a dyn Provider,
    domains: &'a ManagedDomains,
    default_ttl: Ttl,
}

impl<'a> Executor<'a> {
    pub fn new(provider: &'a dyn Provider, domains: &'a ManagedDomains, default_ttl: Ttl) -> Self {
        Executor {
            provider,
            domains,
            default_ttl,
        }
    }

    /// Perform a full reconciliation pass for an ExternalDNS change set:
    /// read the current state, derive the desired state from it and apply the difference.
    pub fn sync(&self, changes: &Changes) -> Result<RunResult, ExecutorError> {
        for ep in changes.endpoints() {
            self.domains.resolve(&ep.dns_name)?;
        }

        let current = provider::current_state(self.provider, self.domains)?;
        let current_endpoints = current
            .iter()
            .map(|s| s.endpoint.to_owned())
            .collect::<Vec<_>>();
        let desired = changes.desired_state(&current_endpoints);

        let plan = Plan::generate(&current, &desired, self.default_ttl);
        info!(
            "Plan: {} creates, {} updates, {} deletes",
            plan.creates.len(),
            plan.updates.len(),
            plan.deletes.len()
        );
        self.apply(&plan)
    }

    /// Apply all actions of `plan` in order
    pub fn apply(&self, plan: &Plan) -> Result<RunResult, ExecutorError> {
        if plan.is_empty() {
            info!("Nothing to do");
            return Ok(RunResult::default());
        }

        let mut operations = Vec::new();
        for action in plan.actions() {
            operations.extend(self.compile(&action)?);
        }
        debug!("Compiled plan into {} operations", operations.len());

        let mut result = RunResult::default();
        for op in operations {
            self.run(&op)?;
            match op {
                Operation::Delete { .. } => result.deleted += 1,
                Operation::Update(_) => result.updated += 1,
                Operation::Add { .. } => result.added += 1,
            }
        }
        info!(
            "Plan applied: {} records deleted, {} updated, {} added",
            result.deleted, result.updated, result.added
        );
        Ok(result)
    }

    fn run(&self, op: &Operation) -> Result<(), ProviderError> {
        debug!("Running {}", op);
        match op {
            Operation::Delete { domain, id } => self.provider.delete_record(domain, *id),
            Operation::Update(record) => self.provider.update_record(&record.domain, record),
            Operation::Add { domain, record } => self.provider.add_record(domain, record),
        }
        .map_err(|e| {
            error!("Failed to {}: {}", op, e);
            e
        })
    }

    /// Translate an action into the provider calls realizing it
    pub fn compile(&self, action: &Action) -> Result<Vec<Operation>, ExecutorError> {
        let ops = match action {
            Action::Create(desired) => self.compile_create(desired)?,
            Action::Update { current, desired } => self.compile_update(current, desired)?,
            Action::Delete(current) => self.compile_delete(current)?,
        };
        trace!("Action {:?} compiled into {:?}", action, ops);
        Ok(ops)
    }

    fn compile_create(&self, desired: &Endpoint) -> Result<Vec<Operation>, ExecutorError> {
        let name = self.domains.resolve(&desired.dns_name)?;
        let ttl = self.ttl(desired);

        Ok(unique_targets(desired)
            .into_iter()
            .map(|target| Operation::Add {
                domain: name.domain.to_owned(),
                record: NewRecord {
                    host: name.host.to_owned(),
                    record_type: desired.record_type.to_owned(),
                    data: target.to_owned(),
                    ttl,
                },
            })
            .collect())
    }

    fn compile_delete(&self, current: &RecordSet) -> Result<Vec<Operation>, ExecutorError> {
        if current.records.is_empty() {
            return Err(ExecutorError::MissingRecordId(current.endpoint.to_string()));
        }
        self.domains.resolve(&current.endpoint.dns_name)?;

        Ok(current
            .records
            .iter()
            .map(|r| Operation::Delete {
                domain: r.domain.to_owned(),
                id: r.id,
            })
            .collect())
    }

    /// Update a record set target by target.
    ///
    /// Records whose target is still desired are kept, and only rewritten if their ttl differs.
    /// Records of targets that went away are reused for new targets through an update,
    /// leftover records are deleted and leftover targets added.
    /// Kept and reused records stay in the domain they were listed from.
    fn compile_update(
        &self,
        current: &RecordSet,
        desired: &Endpoint,
    ) -> Result<Vec<Operation>, ExecutorError> {
        if current.records.is_empty() {
            return Err(ExecutorError::MissingRecordId(current.endpoint.to_string()));
        }
        let name = self.domains.resolve(&desired.dns_name)?;
        let ttl = self.ttl(desired);
        let wanted = unique_targets(desired);

        let record = |r: &RecordRef, data: &str| RemoteRecord {
            id: r.id,
            host: r.host.to_owned(),
            domain: r.domain.to_owned(),
            record_type: desired.record_type.to_owned(),
            data: data.to_owned(),
            ttl,
        };

        let mut kept = HashSet::new();
        let mut stale = Vec::new();
        let mut updates = Vec::new();
        for r in &current.records {
            if wanted.contains(&r.target.as_str()) && kept.insert(r.target.as_str()) {
                if r.ttl != ttl {
                    updates.push(Operation::Update(record(r, &r.target)));
                }
            } else {
                stale.push(r);
            }
        }

        let mut missing = wanted.into_iter().filter(|t| !kept.contains(t));
        let mut deletes = Vec::new();
        for r in stale {
            match missing.next() {
                Some(target) => updates.push(Operation::Update(record(r, target))),
                None => deletes.push(Operation::Delete {
                    domain: r.domain.to_owned(),
                    id: r.id,
                }),
            }
        }
        let adds = missing.map(|target| Operation::Add {
            domain: name.domain.to_owned(),
            record: NewRecord {
                host: name.host.to_owned(),
                record_type: desired.record_type.to_owned(),
                data: target.to_owned(),
                ttl,
            },
        });

        Ok(deletes.into_iter().chain(updates).chain(adds).collect())
    }

    fn ttl(&self, ep: &Endpoint) -> Ttl {
        match ep.record_ttl {
            0 => self.default_ttl,
            ttl => ttl,
        }
    }
}

// Targets of an endpoint in order, without duplicates
fn unique_targets(ep: &Endpoint) -> Vec<&str> {
    let mut seen = HashSet::new();
    ep.targets
        .iter()
        .map(String::as_str)
        .filter(|t| seen.insert(*t))
        .collect()
}

#[cfg(test)]
mod tests {
    use mockall::{predicate::eq, Sequence};

    use super::*;
    use crate::provider::{MockProvider, RecordRef};

    fn domains() -> ManagedDomains {
        ManagedDomains::new(["example.com", "dev.example.com"])
    }

    fn ep(name: &str, t: &str, targets: &[&str], ttl: Ttl) -> Endpoint {
        Endpoint::new(name, t, targets.iter().map(|s| s.to_string()).collect(), ttl)
    }

    // Records of a set listed from the domain the name resolves to
    fn set(name: &str, t: &str, records: &[(RecordId, &str)], ttl: Ttl) -> RecordSet {
        let origin = domains().resolve(name).unwrap();
        RecordSet {
            endpoint: ep(name, t, &records.iter().map(|r| r.1).collect::<Vec<_>>(), ttl),
            records: records
                .iter()
                .map(|(id, target)| RecordRef {
                    id: *id,
                    host: origin.host.to_owned(),
                    domain: origin.domain.to_owned(),
                    target: target.to_string(),
                    ttl,
                })
                .collect(),
        }
    }

    fn remote(id: RecordId, host: &str, domain: &str, t: &str, data: &str, ttl: Ttl) -> RemoteRecord {
        RemoteRecord {
            id,
            host: host.to_owned(),
            domain: domain.to_owned(),
            record_type: t.to_owned(),
            data: data.to_owned(),
            ttl,
        }
    }

    fn new_record(host: &str, t: &str, data: &str, ttl: Ttl) -> NewRecord {
        NewRecord {
            host: host.to_owned(),
            record_type: t.to_owned(),
            data: data.to_owned(),
            ttl,
        }
    }

    #[test]
    fn should_compile_create_per_target() {
        let provider = MockProvider::new();
        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);

        let ops = ex
            .compile(&Action::Create(ep(
                "api.dev.example.com",
                "A",
                &["1.1.1.1", "2.2.2.2", "1.1.1.1"],
                0,
            )))
            .unwrap();
        assert_eq!(
            ops,
            vec![
                Operation::Add {
                    domain: "dev.example.com".to_owned(),
                    record: new_record("api", "A", "1.1.1.1", 3600)
                },
                Operation::Add {
                    domain: "dev.example.com".to_owned(),
                    record: new_record("api", "A", "2.2.2.2", 3600)
                },
            ]
        );
    }

    #[test]
    fn should_compile_apex_create() {
        let provider = MockProvider::new();
        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);

        let ops = ex
            .compile(&Action::Create(ep("example.com", "MX", &["mail.example.com"], 300)))
            .unwrap();
        assert_eq!(
            ops,
            vec![Operation::Add {
                domain: "example.com".to_owned(),
                record: new_record("@", "MX", "mail.example.com", 300)
            }]
        );
    }

    #[test]
    fn should_reuse_record_id_for_changed_target() {
        let provider = MockProvider::new();
        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);

        let ops = ex
            .compile(&Action::Update {
                current: set("a.example.com", "A", &[(17, "1.1.1.1")], 300),
                desired: ep("a.example.com", "A", &["2.2.2.2"], 300),
            })
            .unwrap();
        assert_eq!(
            ops,
            vec![Operation::Update(remote(17, "a", "example.com", "A", "2.2.2.2", 300))]
        );
    }

    #[test]
    fn should_update_multi_target_sets_per_record() {
        let provider = MockProvider::new();
        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);

        // one target stays, one is replaced, one disappears
        let current = set(
            "m.example.com",
            "A",
            &[(1, "1.1.1.1"), (2, "2.2.2.2"), (3, "3.3.3.3")],
            300,
        );
        let ops = ex
            .compile(&Action::Update {
                current,
                desired: ep("m.example.com", "A", &["1.1.1.1", "4.4.4.4"], 300),
            })
            .unwrap();
        assert_eq!(
            ops,
            vec![
                Operation::Delete {
                    domain: "example.com".to_owned(),
                    id: 3
                },
                Operation::Update(remote(2, "m", "example.com", "A", "4.4.4.4", 300)),
            ]
        );

        // growing the set adds records, a ttl change rewrites kept records
        let ops = ex
            .compile(&Action::Update {
                current: set("m.example.com", "A", &[(1, "1.1.1.1")], 300),
                desired: ep("m.example.com", "A", &["1.1.1.1", "5.5.5.5"], 60),
            })
            .unwrap();
        assert_eq!(
            ops,
            vec![
                Operation::Update(remote(1, "m", "example.com", "A", "1.1.1.1", 60)),
                Operation::Add {
                    domain: "example.com".to_owned(),
                    record: new_record("m", "A", "5.5.5.5", 60)
                },
            ]
        );
    }

    #[test]
    fn should_rewrite_only_records_with_diverging_ttl() {
        let provider = MockProvider::new();
        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);

        let mut current = set("a.example.com", "A", &[(1, "1.1.1.1"), (2, "2.2.2.2")], 60);
        current.records[1].ttl = 300;
        let ops = ex
            .compile(&Action::Update {
                current,
                desired: ep("a.example.com", "A", &["1.1.1.1", "2.2.2.2"], 60),
            })
            .unwrap();
        assert_eq!(
            ops,
            vec![Operation::Update(remote(2, "a", "example.com", "A", "2.2.2.2", 60))]
        );
    }

    #[test]
    fn should_address_records_in_their_listed_domain() {
        let provider = MockProvider::new();
        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);

        // listed from example.com, but the name resolves to dev.example.com
        let current = RecordSet::group(vec![remote(5, "api.dev", "example.com", "A", "1.1.1.1", 300)]);
        assert_eq!(
            ex.compile(&Action::Delete(current[0].clone())).unwrap(),
            vec![Operation::Delete {
                domain: "example.com".to_owned(),
                id: 5
            }]
        );
        assert_eq!(
            ex.compile(&Action::Update {
                current: current[0].clone(),
                desired: ep("api.dev.example.com", "A", &["2.2.2.2"], 300),
            })
            .unwrap(),
            vec![Operation::Update(remote(5, "api.dev", "example.com", "A", "2.2.2.2", 300))]
        );
        assert_eq!(
            ex.compile(&Action::Update {
                current: current[0].clone(),
                desired: ep("api.dev.example.com", "A", &["1.1.1.1", "3.3.3.3"], 300),
            })
            .unwrap(),
            vec![Operation::Add {
                domain: "dev.example.com".to_owned(),
                record: new_record("api", "A", "3.3.3.3", 300)
            }]
        );
    }

    #[test]
    fn should_delete_nested_host_from_its_own_domain() {
        let mut provider = MockProvider::new();
        provider
            .expect_list_records()
            .with(eq("example.com"))
            .returning(|_| Ok(vec![remote(5, "api.dev", "", "A", "1.1.1.1", 300)]));
        provider
            .expect_list_records()
            .with(eq("dev.example.com"))
            .returning(|_| Ok(vec![]));
        provider
            .expect_delete_record()
            .with(eq("example.com"), eq(5u64))
            .times(1)
            .returning(|_, _| Ok(()));

        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);
        let changes = Changes {
            delete: vec![ep("api.dev.example.com", "A", &["1.1.1.1"], 300)],
            ..Default::default()
        };
        assert_eq!(ex.sync(&changes).unwrap().deleted, 1);
    }

    #[test]
    fn should_reject_unmanaged_names_in_any_part_of_the_change_set() {
        // no expectations: not even the current state may be read
        let provider = MockProvider::new();
        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);
        let unmanaged = ep("www.example.net", "A", &["1.1.1.1"], 300);

        let change_sets = [
            Changes {
                delete: vec![unmanaged.clone()],
                ..Default::default()
            },
            Changes {
                update_old: vec![unmanaged.clone()],
                update_new: vec![ep("www.example.com", "A", &["1.1.1.1"], 300)],
                ..Default::default()
            },
            Changes {
                create: vec![unmanaged.clone()],
                ..Default::default()
            },
        ];
        for changes in &change_sets {
            assert_eq!(
                ex.sync(changes),
                Err(ExecutorError::Resolve(ResolveError::NoMatchingDomain(
                    "www.example.net".to_owned()
                )))
            );
        }
    }

    #[test]
    fn should_fail_update_and_delete_without_record_ids() {
        let provider = MockProvider::new();
        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);
        let mut current = set("a.example.com", "A", &[], 300);
        current.endpoint.targets = vec!["1.1.1.1".to_owned()];

        assert!(matches!(
            ex.compile(&Action::Delete(current.clone())),
            Err(ExecutorError::MissingRecordId(_))
        ));
        assert!(matches!(
            ex.compile(&Action::Update {
                current,
                desired: ep("a.example.com", "A", &["2.2.2.2"], 300)
            }),
            Err(ExecutorError::MissingRecordId(_))
        ));
    }

    #[test]
    fn should_not_touch_provider_if_any_name_is_unmanaged() {
        // no expectations: any provider call fails the test
        let provider = MockProvider::new();
        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);

        let plan = Plan {
            creates: vec![
                ep("ok.example.com", "A", &["1.1.1.1"], 300),
                ep("www.example.org", "A", &["1.1.1.1"], 300),
            ],
            updates: vec![],
            deletes: vec![set("old.example.com", "A", &[(1, "1.1.1.1")], 300)],
        };
        assert_eq!(
            ex.apply(&plan),
            Err(ExecutorError::Resolve(ResolveError::NoMatchingDomain(
                "www.example.org".to_owned()
            )))
        );
    }

    #[test]
    fn should_apply_deletes_before_updates_before_creates() {
        let mut provider = MockProvider::new();
        let mut seq = Sequence::new();
        provider
            .expect_delete_record()
            .with(eq("example.com"), eq(1u64))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        provider
            .expect_update_record()
            .withf(|d, r| d == "example.com" && r.id == 2 && r.data == "2.2.2.2")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        provider
            .expect_add_record()
            .withf(|d, r| d == "example.com" && r.host == "host" && r.record_type == "CNAME")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);
        let current = vec![
            set("host.example.com", "A", &[(1, "1.2.3.4")], 300),
            set("b.example.com", "A", &[(2, "1.1.1.1")], 300),
        ];
        let desired = vec![
            ep("host.example.com", "CNAME", &["target.example.com"], 300),
            ep("b.example.com", "A", &["2.2.2.2"], 300),
        ];

        let result = ex.apply(&Plan::generate(&current, &desired, 3600)).unwrap();
        assert_eq!(
            result,
            RunResult {
                deleted: 1,
                updated: 1,
                added: 1
            }
        );
        assert_eq!(result.total(), 3);
    }

    #[test]
    fn should_stop_at_first_failure() {
        let mut provider = MockProvider::new();
        provider
            .expect_delete_record()
            .times(1)
            .returning(|_, _| Err(ProviderError::NotFound("record 1".to_owned())));
        provider.expect_add_record().times(0);

        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);
        let plan = Plan {
            creates: vec![ep("new.example.com", "A", &["1.1.1.1"], 300)],
            updates: vec![],
            deletes: vec![set("old.example.com", "A", &[(1, "1.1.1.1")], 300)],
        };

        assert_eq!(
            ex.apply(&plan),
            Err(ExecutorError::Provider(ProviderError::NotFound(
                "record 1".to_owned()
            )))
        );
    }

    #[test]
    fn should_sync_change_set_against_fresh_state() {
        let mut provider = MockProvider::new();
        provider
            .expect_list_records()
            .with(eq("dev.example.com"))
            .returning(|_| Ok(vec![]));
        provider
            .expect_list_records()
            .with(eq("example.com"))
            .returning(|_| {
                Ok(vec![
                    remote(10, "a", "example.com", "A", "1.1.1.1", 300),
                    remote(11, "stale", "example.com", "TXT", "x", 300),
                ])
            });
        provider
            .expect_delete_record()
            .with(eq("example.com"), eq(11u64))
            .times(1)
            .returning(|_, _| Ok(()));
        provider
            .expect_update_record()
            .withf(|_, r| r.id == 10 && r.data == "2.2.2.2")
            .times(1)
            .returning(|_, _| Ok(()));
        provider
            .expect_add_record()
            .withf(|d, r| d == "dev.example.com" && r.host == "api" && r.ttl == 3600)
            .times(1)
            .returning(|_, _| Ok(()));

        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);
        let changes = Changes {
            create: vec![ep("api.dev.example.com", "A", &["3.3.3.3"], 0)],
            update_old: vec![ep("a.example.com", "A", &["1.1.1.1"], 300)],
            update_new: vec![ep("a.example.com", "A", &["2.2.2.2"], 300)],
            delete: vec![ep("stale.example.com", "TXT", &["x"], 300)],
        };

        let result = ex.sync(&changes).unwrap();
        assert_eq!(result.total(), 3);
    }

    #[test]
    fn should_converge_when_changes_are_already_applied() {
        let mut provider = MockProvider::new();
        provider
            .expect_list_records()
            .returning(|d| match d {
                "example.com" => Ok(vec![remote(1, "b", "example.com", "A", "5.6.7.8", 300)]),
                _ => Ok(vec![]),
            });

        let d = domains();
        let ex = Executor::new(&provider, &d, 3600);
        let changes = Changes {
            create: vec![ep("b.example.com", "A", &["5.6.7.8"], 300)],
            ..Default::default()
        };
        assert_eq!(ex.sync(&changes), Ok(RunResult::default()));
    }
}
