use serde_json::Value;

use campux_types::models::Account;

use crate::error::Result;
use crate::store::{Document, Filter, from_document, to_document};
use crate::{ACCOUNT_COLLECTION, Database};

impl Database {
    /// Fails with a duplicate error when the uin is already registered.
    pub fn add_account(&self, account: &Account) -> Result<()> {
        self.store.insert(ACCOUNT_COLLECTION, to_document(account)?)?;
        Ok(())
    }

    pub fn get_account_by_uin(&self, uin: i64) -> Result<Option<Account>> {
        let doc = self
            .store
            .find_one(ACCOUNT_COLLECTION, &Filter::new().eq("uin", uin), None)?;

        Ok(doc.map(from_document::<Account>).transpose()?)
    }

    /// Returns `false` when no account has this uin.
    pub fn update_password(&self, uin: i64, pwd: &str, salt: &str) -> Result<bool> {
        let mut fields = Document::new();
        fields.insert("pwd".to_string(), Value::String(pwd.to_string()));
        fields.insert("salt".to_string(), Value::String(salt.to_string()));

        let matched = self
            .store
            .update_one_set(ACCOUNT_COLLECTION, &Filter::new().eq("uin", uin), fields)?;
        Ok(matched > 0)
    }
}
