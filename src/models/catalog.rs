use postgres::Row;

use super::common::*;
use errors::*;
use repos::types::*;
use util::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: CategoryId,
    pub category_name: String,
}

impl FromRow for Category {
    fn from_row(row: &Row) -> RepoResult<Self> {
        Ok(Self {
            category_id: CategoryId(row.try_get("category_id")?),
            category_name: row.try_get("category_name")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub recipe_id: RecipeId,
    pub category_id: CategoryId,
    pub title: String,
    pub price: f64,
    pub image_url: Option<String>,
}

impl FromRow for Recipe {
    fn from_row(row: &Row) -> RepoResult<Self> {
        Ok(Self {
            recipe_id: RecipeId(row.try_get("recipe_id")?),
            category_id: CategoryId(row.try_get("category_id")?),
            title: row.try_get("title")?,
            price: row.try_get("price")?,
            image_url: row.try_get("image_url")?,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecipeFilter {
    pub recipe_id: Option<RecipeId>,
    pub category_ids: Option<Vec<CategoryId>>,
}

impl RecipeFilter {
    pub fn matches(&self, recipe: &Recipe) -> bool {
        self.recipe_id.map_or(true, |v| v == recipe.recipe_id)
            && self.category_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&recipe.category_id))
    }
}

impl From<Vec<CategoryId>> for RecipeFilter {
    fn from(v: Vec<CategoryId>) -> Self {
        Self {
            category_ids: Some(v),
            ..Default::default()
        }
    }
}

impl Filter for RecipeFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.recipe_id {
            b = b.with_filter("recipe_id", v.0);
        }

        if let Some(v) = self.category_ids {
            b = b.with_any("category_id", v.into_iter().map(|id| id.0).collect::<Vec<i32>>());
        }

        b.with_extra("ORDER BY recipe_id")
    }
}

/// Allocation candidate: a recipe together with its current price.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoolEntry {
    pub recipe_id: RecipeId,
    pub price: f64,
}

impl<'a> From<&'a Recipe> for PoolEntry {
    fn from(recipe: &'a Recipe) -> Self {
        Self {
            recipe_id: recipe.recipe_id,
            price: recipe.price,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpiceLevel {
    pub spice_level_id: SpiceLevelId,
    pub spice_level_name: String,
}

impl FromRow for SpiceLevel {
    fn from_row(row: &Row) -> RepoResult<Self> {
        Ok(Self {
            spice_level_id: SpiceLevelId(row.try_get("spice_level_id")?),
            spice_level_name: row.try_get("spice_level_name")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snack {
    pub snacks_id: SnackId,
    pub name: String,
    pub price: f64,
}

impl FromRow for Snack {
    fn from_row(row: &Row) -> RepoResult<Self> {
        Ok(Self {
            snacks_id: SnackId(row.try_get("snacks_id")?),
            name: row.try_get("name")?,
            price: row.try_get("price")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryWithRecipes {
    #[serde(flatten)]
    pub category: Category,
    pub recipes: Vec<Recipe>,
}
