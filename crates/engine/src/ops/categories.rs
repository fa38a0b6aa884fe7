use crate::{Category, CategoryId, ResultEngine, categories};

use super::Engine;

impl Engine {
    pub async fn add_category(&self, name: &str, is_income: bool) -> ResultEngine<Category> {
        let name = categories::normalize_category_name(name)?;
        let workspace = self.require_workspace()?;
        self.store.insert_category(&workspace, &name, is_income).await
    }

    /// Income or expense categories of the active workspace, by name.
    pub async fn categories(&self, is_income: bool) -> ResultEngine<Vec<Category>> {
        let workspace = self.require_workspace()?;
        self.store.categories(&workspace, is_income).await
    }

    pub async fn delete_category(&self, id: &CategoryId) -> ResultEngine<()> {
        let workspace = self.require_workspace()?;
        self.store.delete_category(&workspace, id).await
    }
}
