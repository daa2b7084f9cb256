//! Account administration: registration and manager shop assignment.

use montage_core::access;
use montage_core::error::{MontageError, MontageResult};
use montage_core::models::account::{Account, CreateAccount, Role, UpdateAccount};
use montage_core::repository::AccountRepository;
use tracing::info;
use uuid::Uuid;

/// Resolve a shop account through the directory.
///
/// Unknown ids and non-shop accounts are validation failures of the
/// request that named them.
pub(crate) async fn lookup_shop<A: AccountRepository>(
    accounts: &A,
    id: Uuid,
) -> MontageResult<Account> {
    let account = match accounts.get_by_id(id).await {
        Ok(account) => account,
        Err(MontageError::NotFound { .. }) => {
            return Err(MontageError::validation(format!("unknown shop account {id}")));
        }
        Err(e) => return Err(e),
    };
    if !account.is_client() {
        return Err(MontageError::validation(format!(
            "account {id} is a {} account, not a shop",
            account.role
        )));
    }
    Ok(account)
}

/// Resolve every id through the directory, in request order.
async fn resolve_all<A: AccountRepository>(
    accounts: &A,
    ids: &[Uuid],
) -> MontageResult<Vec<Account>> {
    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        match accounts.get_by_id(*id).await {
            Ok(account) => resolved.push(account),
            Err(MontageError::NotFound { .. }) => {
                return Err(MontageError::validation(format!("unknown account {id}")));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(resolved)
}

pub struct AccountService<A: AccountRepository> {
    accounts: A,
}

impl<A: AccountRepository> AccountService<A> {
    pub fn new(accounts: A) -> Self {
        Self { accounts }
    }

    /// Create an account.
    ///
    /// Only managers carry shop assignments; those are validated before
    /// anything is written.
    pub async fn register(&self, mut input: CreateAccount) -> MontageResult<Account> {
        input.name = input.name.trim().to_string();
        input.email = input.email.trim().to_lowercase();
        if input.name.is_empty() {
            return Err(MontageError::validation("account name must not be empty"));
        }
        if input.email.is_empty() || !input.email.contains('@') {
            return Err(MontageError::validation(format!(
                "invalid e-mail address '{}'",
                input.email
            )));
        }

        if input.role == Role::Manager {
            let shops = resolve_all(&self.accounts, &input.assigned_shop_ids).await?;
            // The new account has no id yet, so self-assignment cannot occur.
            input.assigned_shop_ids = access::validate_assignments(Uuid::nil(), &shops)?;
        } else if !input.assigned_shop_ids.is_empty() {
            return Err(MontageError::validation(format!(
                "only managers can be assigned shops, not a {} account",
                input.role
            )));
        }

        let account = self.accounts.create(input).await?;
        info!(account_id = %account.id, role = %account.role, "Account registered");
        Ok(account)
    }

    /// Replace a manager's shop assignment. Administrators only.
    pub async fn assign_shops(
        &self,
        actor: &Account,
        manager_id: Uuid,
        shop_ids: &[Uuid],
    ) -> MontageResult<Account> {
        if actor.role != Role::Admin {
            return Err(MontageError::forbidden(
                "only administrators can assign shops to managers",
            ));
        }

        let manager = self.accounts.get_by_id(manager_id).await?;
        if manager.role != Role::Manager {
            return Err(MontageError::validation(format!(
                "account {manager_id} is not a manager"
            )));
        }

        let shops = resolve_all(&self.accounts, shop_ids).await?;
        let assigned = access::validate_assignments(manager.id, &shops)?;

        let updated = self
            .accounts
            .update(
                manager_id,
                UpdateAccount {
                    assigned_shop_ids: Some(assigned),
                    ..Default::default()
                },
            )
            .await?;
        info!(
            manager_id = %manager_id,
            actor = %actor.id,
            shops = updated.assigned_shop_ids.len(),
            "Manager shops assigned"
        );
        Ok(updated)
    }

    /// Fetch an account. Non-administrators may only read themselves.
    pub async fn get_account(&self, actor: &Account, id: Uuid) -> MontageResult<Account> {
        if actor.role != Role::Admin && actor.id != id {
            return Err(MontageError::forbidden(format!(
                "account {} cannot read account {id}",
                actor.id
            )));
        }
        self.accounts.get_by_id(id).await
    }
}
