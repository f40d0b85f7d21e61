//! Account resolution
//!
//! Maps an (identifier, currency) pair to the ledger's account id, creating
//! the account when it does not exist yet. The mapping table belongs to the
//! resolver instance; callers may seed it with known ids.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::config::AccountsConfig;
use crate::error::{Error, Result};
use crate::ledger::AccountDirectory;
use crate::models::{AccountId, NewAccount};

/// Key of the mapping table
pub type AccountKey = (String, String);

/// Resolves and creates check accounts
pub struct AccountResolver<'a, D: AccountDirectory + ?Sized> {
    directory: &'a D,
    name_template: String,
    /// When false, a missing account is an error instead of being created
    create_missing: bool,
    mapping: HashMap<AccountKey, AccountId>,
    /// Pairs already looked up and not found while creation is disabled
    missing: HashSet<AccountKey>,
}

impl<'a, D: AccountDirectory + ?Sized> AccountResolver<'a, D> {
    pub fn new(directory: &'a D, config: &AccountsConfig) -> Self {
        Self {
            directory,
            name_template: config.name_template.clone(),
            create_missing: true,
            mapping: HashMap::new(),
            missing: HashSet::new(),
        }
    }

    /// Never create accounts (dry runs)
    pub fn without_creation(mut self) -> Self {
        self.create_missing = false;
        self
    }

    /// Seed the mapping table with already known ids
    pub fn with_mapping(mut self, mapping: HashMap<AccountKey, AccountId>) -> Self {
        self.mapping.extend(mapping);
        self
    }

    pub fn mapping(&self) -> &HashMap<AccountKey, AccountId> {
        &self.mapping
    }

    /// Display name for the account of an (identifier, currency) pair
    pub fn account_name(&self, identifier: &str, currency: &str) -> String {
        self.name_template
            .replace("{currency}", currency)
            .replace("{identifier}", identifier)
    }

    /// Find the account for `(identifier, currency)` or create it.
    ///
    /// Repeated calls with the same pair return the same id and never create
    /// twice. Without creation, a pair that was not found is not looked up
    /// again.
    pub fn resolve_or_create(&mut self, identifier: &str, currency: &str) -> Result<AccountId> {
        let key = (identifier.to_string(), currency.to_string());
        if let Some(id) = self.mapping.get(&key) {
            return Ok(id.clone());
        }

        let name = self.account_name(identifier, currency);
        if !self.create_missing && self.missing.contains(&key) {
            return Err(Self::not_created(&name));
        }
        info!("Looking for ledger account named '{}'", name);

        let existing = self
            .directory
            .list_accounts()?
            .into_iter()
            .find(|a| !a.is_register() && a.name.as_deref() == Some(name.as_str()));

        let id = match existing {
            Some(account) => {
                let id = account.account_id();
                info!("Found existing account with ID {}", id);
                id
            }
            None if !self.create_missing => {
                self.missing.insert(key);
                return Err(Self::not_created(&name));
            }
            None => {
                info!("Creating new account '{}'", name);
                let created = self
                    .directory
                    .create_account(&NewAccount {
                        name: name.clone(),
                        currency: currency.to_uppercase(),
                        account_number: identifier.to_string(),
                    })
                    .map_err(|e| match e {
                        Error::AccountCreation { .. } => e,
                        other => Error::AccountCreation {
                            name: name.clone(),
                            reason: other.to_string(),
                        },
                    })?;
                let id = created.account_id();
                info!("Created account with ID {}", id);
                id
            }
        };

        self.mapping.insert(key, id.clone());
        Ok(id)
    }

    fn not_created(name: &str) -> Error {
        Error::NotFound(format!("account '{}' (not created in dry run)", name))
    }
}
