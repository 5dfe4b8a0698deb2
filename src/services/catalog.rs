use failure::Error as FailureError;

use super::types::*;
use models::*;
use repos::*;

/// Read-only access to categories, recipes, spice levels and snacks
pub trait CatalogService {
    fn categories(&self) -> ServiceFuture<Vec<Category>>;
    /// Every category with the recipes filed under it
    fn categories_with_recipes(&self) -> ServiceFuture<Vec<CategoryWithRecipes>>;
    fn recipes(&self, category_id: Option<CategoryId>) -> ServiceFuture<Vec<Recipe>>;
    fn spice_levels(&self) -> ServiceFuture<Vec<SpiceLevel>>;
    fn snacks(&self) -> ServiceFuture<Vec<Snack>>;
}

/// Recipes whose category is among `categories`, as allocation candidates.
pub fn recipe_pool(conn: &mut dyn RepoConnection, categories: &[CategoryId]) -> Result<Vec<PoolEntry>, FailureError> {
    let recipes = conn.select_recipes(RecipeFilter::from(categories.to_vec()))?;
    Ok(recipes.iter().map(PoolEntry::from).collect())
}

pub struct CatalogServiceImpl {
    ctx: ServiceContext,
}

impl CatalogServiceImpl {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    fn read<T, F>(&self, f: F) -> ServiceFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn RepoConnection) -> Result<T, FailureError> + Send + 'static,
    {
        let db_pool = self.ctx.db_pool.clone();
        self.ctx.spawn(move || with_transaction(&*db_pool, f))
    }
}

impl CatalogService for CatalogServiceImpl {
    fn categories(&self) -> ServiceFuture<Vec<Category>> {
        debug!("Listing categories");
        self.read(|conn| Ok(conn.select_categories()?))
    }

    fn categories_with_recipes(&self) -> ServiceFuture<Vec<CategoryWithRecipes>> {
        debug!("Listing categories with recipes");
        self.read(|conn| {
            let categories = conn.select_categories()?;
            let recipes = conn.select_recipes(RecipeFilter::default())?;

            Ok(categories
                .into_iter()
                .map(|category| CategoryWithRecipes {
                    recipes: recipes
                        .iter()
                        .filter(|r| r.category_id == category.category_id)
                        .cloned()
                        .collect(),
                    category,
                })
                .collect())
        })
    }

    fn recipes(&self, category_id: Option<CategoryId>) -> ServiceFuture<Vec<Recipe>> {
        debug!("Listing recipes of category {:?}", category_id);
        self.read(move |conn| {
            Ok(conn.select_recipes(RecipeFilter {
                category_ids: category_id.map(|id| vec![id]),
                ..Default::default()
            })?)
        })
    }

    fn spice_levels(&self) -> ServiceFuture<Vec<SpiceLevel>> {
        self.read(|conn| Ok(conn.select_spice_levels()?))
    }

    fn snacks(&self) -> ServiceFuture<Vec<Snack>> {
        self.read(|conn| Ok(conn.select_snacks()?))
    }
}
