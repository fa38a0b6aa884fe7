use tracing::debug;

use crate::{ResultEngine, TransactionFields, TransactionId};

use super::Engine;

// Writes go to the store only; the change shows up through the next snapshot.
impl Engine {
    /// Records a transaction in the active workspace, signed with the
    /// current user's email.
    pub async fn add_transaction(&self, fields: TransactionFields) -> ResultEngine<TransactionId> {
        fields.validate()?;
        let user = self.require_user()?;
        let workspace = self.require_workspace()?;
        let id = self
            .store
            .insert_transaction(&workspace, &fields, &user.email)
            .await?;
        debug!(%workspace, transaction = %id, "transaction added");
        Ok(id)
    }

    pub async fn update_transaction(
        &self,
        id: &TransactionId,
        fields: TransactionFields,
    ) -> ResultEngine<()> {
        fields.validate()?;
        let workspace = self.require_workspace()?;
        self.store.update_transaction(&workspace, id, &fields).await
    }

    pub async fn delete_transaction(&self, id: &TransactionId) -> ResultEngine<()> {
        let workspace = self.require_workspace()?;
        self.store.delete_transaction(&workspace, id).await
    }
}
