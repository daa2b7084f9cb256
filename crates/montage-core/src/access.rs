//! Access scoping for jobs and invoices.
//!
//! A shop sees only its own records, a manager sees the shops assigned to
//! it, an administrator sees everything. Edit and delete rights are two
//! independent predicates: managers may edit any job they can see but
//! may never delete one.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::error::{MontageError, MontageResult};
use crate::models::account::{Account, Role};
use crate::models::job::Job;

/// The set of owner (shop) accounts whose records an actor may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibleOwners {
    /// No owner filter.
    All,
    Only(BTreeSet<Uuid>),
}

impl VisibleOwners {
    pub fn contains(&self, owner_id: Uuid) -> bool {
        match self {
            VisibleOwners::All => true,
            VisibleOwners::Only(ids) => ids.contains(&owner_id),
        }
    }

    /// True when nothing at all is visible.
    pub fn is_empty(&self) -> bool {
        match self {
            VisibleOwners::All => false,
            VisibleOwners::Only(ids) => ids.is_empty(),
        }
    }
}

pub fn visible_owners(actor: &Account) -> VisibleOwners {
    match actor.role {
        Role::Admin => VisibleOwners::All,
        Role::Manager => VisibleOwners::Only(actor.assigned_shop_ids.iter().copied().collect()),
        Role::Client => VisibleOwners::Only(BTreeSet::from([actor.id])),
    }
}

/// Fail with `Forbidden` unless `owner_id` is within the actor's scope.
pub fn ensure_visible(actor: &Account, owner_id: Uuid) -> MontageResult<()> {
    if visible_owners(actor).contains(owner_id) {
        Ok(())
    } else {
        Err(MontageError::forbidden(format!(
            "account {} cannot access records of shop {owner_id}",
            actor.id
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRights {
    pub can_edit: bool,
    pub can_delete: bool,
}

/// Edit and delete rights of `actor` on `job`, evaluated separately.
///
/// Ownership is not checked here; pair with [`ensure_visible`].
pub fn can_mutate(actor: &Account, job: &Job) -> MutationRights {
    let early = job.status.is_early();
    let (can_edit, can_delete) = match actor.role {
        Role::Manager => (true, false),
        Role::Admin => (true, early),
        Role::Client => (early, early),
    };
    MutationRights {
        can_edit,
        can_delete,
    }
}

/// Validate a manager's shop assignment and return the ids in
/// first-seen order with duplicates removed.
///
/// `shops` are the resolved accounts for the requested ids, in request
/// order.
pub fn validate_assignments(manager_id: Uuid, shops: &[Account]) -> MontageResult<Vec<Uuid>> {
    let mut seen = BTreeSet::new();
    let mut ids = Vec::with_capacity(shops.len());
    for shop in shops {
        if shop.id == manager_id {
            return Err(MontageError::validation(
                "a manager cannot be assigned to itself",
            ));
        }
        if !shop.is_client() {
            return Err(MontageError::validation(format!(
                "account {} is a {} account, only shops can be assigned",
                shop.id, shop.role
            )));
        }
        if seen.insert(shop.id) {
            ids.push(shop.id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{account, job, job_for};
    use crate::models::job::JobStatus;

    #[test]
    fn admin_sees_everything() {
        let admin = account(Role::Admin);
        let scope = visible_owners(&admin);
        assert_eq!(scope, VisibleOwners::All);
        assert!(scope.contains(Uuid::new_v4()));
        assert!(!scope.is_empty());
    }

    #[test]
    fn manager_sees_exactly_its_shops() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut manager = account(Role::Manager);
        manager.assigned_shop_ids = vec![a, b];
        assert_eq!(
            visible_owners(&manager),
            VisibleOwners::Only(BTreeSet::from([a, b]))
        );

        manager.assigned_shop_ids.clear();
        let scope = visible_owners(&manager);
        assert_eq!(scope, VisibleOwners::Only(BTreeSet::new()));
        assert!(scope.is_empty());
    }

    #[test]
    fn client_sees_only_itself() {
        let client = account(Role::Client);
        assert_eq!(
            visible_owners(&client),
            VisibleOwners::Only(BTreeSet::from([client.id]))
        );
        assert!(ensure_visible(&client, client.id).is_ok());
        assert!(matches!(
            ensure_visible(&client, Uuid::new_v4()),
            Err(MontageError::Forbidden { .. })
        ));
    }

    #[test]
    fn manager_edits_but_never_deletes() {
        let manager = account(Role::Manager);
        for status in JobStatus::ALL {
            let rights = can_mutate(&manager, &job(status));
            assert!(rights.can_edit);
            assert!(!rights.can_delete);
        }
        let shipped = can_mutate(&manager, &job(JobStatus::Shipped));
        assert_eq!(
            shipped,
            MutationRights {
                can_edit: true,
                can_delete: false
            }
        );
    }

    #[test]
    fn client_rights_end_when_production_starts() {
        let client = account(Role::Client);
        for status in JobStatus::ALL {
            let rights = can_mutate(&client, &job_for(client.id, status));
            assert_eq!(rights.can_edit, status.is_early());
            assert_eq!(rights.can_delete, status.is_early());
        }
    }

    #[test]
    fn admin_edits_always_and_deletes_early_jobs() {
        let admin = account(Role::Admin);
        assert!(can_mutate(&admin, &job(JobStatus::Completed)).can_edit);
        assert!(!can_mutate(&admin, &job(JobStatus::InProgress)).can_delete);
        assert!(can_mutate(&admin, &job(JobStatus::Received)).can_delete);
    }

    #[test]
    fn assignments_reject_self_and_non_shops() {
        let manager = account(Role::Manager);
        assert!(validate_assignments(manager.id, std::slice::from_ref(&manager)).is_err());

        let other_manager = account(Role::Manager);
        assert!(validate_assignments(manager.id, &[other_manager]).is_err());
    }

    #[test]
    fn assignments_collapse_duplicates_in_order() {
        let manager = account(Role::Manager);
        let a = account(Role::Client);
        let b = account(Role::Client);
        let ids =
            validate_assignments(manager.id, &[a.clone(), b.clone(), a.clone()]).unwrap();
        assert_eq!(ids, vec![a.id, b.id]);
    }
}
