use std::collections::BTreeMap;

use log::{debug, info, trace};

use crate::{
    config::Ttl,
    endpoint::{Endpoint, RecordKey},
    provider::RecordSet,
};

/// A single change to a record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create a record set that doesn't exist yet
    Create(Endpoint),
    /// Change the targets or ttl of an existing record set.
    /// `current` carries the provider records the update applies to
    Update {
        current: RecordSet,
        desired: Endpoint,
    },
    /// Remove an existing record set with all its records
    Delete(RecordSet),
}

/// The changes needed to move the provider from its current state to a desired state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    pub creates: Vec<Endpoint>,
    pub updates: Vec<(RecordSet, Endpoint)>,
    pub deletes: Vec<RecordSet>,
}

impl Plan {
    /// Compare `current` against `desired` and generate the actions that reconcile them.
    ///
    /// Record sets are matched by their `(name, type)` identity. A changed record type is therefore
    /// never an update but a deletion of the old set and the creation of a new one.
    /// Desired endpoints without a TTL get `default_ttl`, so that they compare equal to the
    /// records created from them on the next pass.
    pub fn generate(current: &[RecordSet], desired: &[Endpoint], default_ttl: Ttl) -> Plan {
        let mut plan = Plan::default();

        let current = current
            .iter()
            .map(|s| (s.key(), s))
            .collect::<BTreeMap<RecordKey, _>>();
        let desired = desired
            .iter()
            .map(|e| {
                let mut e = e.clone().normalized();
                if e.record_ttl == 0 {
                    e.record_ttl = default_ttl;
                }
                (e.key(), e)
            })
            .collect::<BTreeMap<RecordKey, _>>();
        debug!(
            "Planning with {} current and {} desired record sets",
            current.len(),
            desired.len()
        );

        for (key, want) in &desired {
            trace!("Processing record set {}", key);
            match current.get(key) {
                None => {
                    info!("Creating new record set {}", want);
                    plan.creates.push(want.to_owned());
                }
                Some(have) if have.is_current(want) => {
                    debug!("No action needed for record set {}", key);
                }
                Some(have) => {
                    info!("Found outdated record set {}, updating to {}", have.endpoint, want);
                    plan.updates.push(((*have).to_owned(), want.to_owned()));
                }
            }
        }

        for (key, have) in &current {
            if !desired.contains_key(key) {
                info!("Record set {} is no longer desired, deleting", have.endpoint);
                plan.deletes.push((*have).to_owned());
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// All actions of this plan in the order they must be applied: deletions, then updates, then creations.
    ///
    /// Deleting first frees up names before anything new is created under them,
    /// which is what turns a record type change into a clean replacement.
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        let deletes = self.deletes.iter().cloned().map(Action::Delete);
        let updates = self
            .updates
            .iter()
            .cloned()
            .map(|(current, desired)| Action::Update { current, desired });
        let creates = self.creates.iter().cloned().map(Action::Create);
        deletes.chain(updates).chain(creates)
    }
}
