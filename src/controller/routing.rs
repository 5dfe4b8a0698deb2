use regex::{Error as RegexError, Regex};

use models::*;

/// List of all routes with params for the app
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Healthcheck,
    PlaceOrder,
    UpdateOrder,
    PlanSetting,
    FetchOrder,
    ActiveOrder,
    AddSelectedRecipes,
    DeleteOrder,
    OrderDetailsByCustomer { customer_id: CustomerId },
    Categories,
    CategoriesWithRecipes,
    Recipes,
    RecipesByCategory { category_id: CategoryId },
    Spices,
    Snacks,
    SnackOrder,
    AddSnacks,
    PaymentWebhook,
    PauseSubscription,
    ResumeSubscription,
    CancelSubscription,
}

type Matcher<T> = Box<dyn Fn(Vec<&str>) -> Option<T> + Send + Sync>;

/// Matches request paths against regexes, first match wins.
pub struct RouteParser<T> {
    routes: Vec<(Regex, Matcher<T>)>,
}

impl<T> Default for RouteParser<T> {
    fn default() -> Self {
        Self { routes: vec![] }
    }
}

impl<T: 'static> RouteParser<T> {
    pub fn add_route<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self, RegexError>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.add_route_with_params(pattern, move |_| Some(f()))
    }

    /// Adds a route whose capture groups are handed to `f` in order.
    pub fn add_route_with_params<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self, RegexError>
    where
        F: Fn(Vec<&str>) -> Option<T> + Send + Sync + 'static,
    {
        self.routes.push((Regex::new(pattern)?, Box::new(f)));
        Ok(self)
    }

    pub fn test(&self, path: &str) -> Option<T> {
        self.routes.iter().filter_map(|(regex, matcher)| {
            regex.captures(path).and_then(|captures| {
                let params = captures.iter().skip(1).filter_map(|m| m.map(|m| m.as_str())).collect();
                matcher(params)
            })
        }).next()
    }
}

pub fn make_router() -> Result<RouteParser<Route>, RegexError> {
    let mut route_parser: RouteParser<Route> = Default::default();
    route_parser
        .add_route(r"^/healthcheck$", || Route::Healthcheck)?
        .add_route(r"^/orders/place-order$", || Route::PlaceOrder)?
        .add_route(r"^/orders/update-order$", || Route::UpdateOrder)?
        .add_route(r"^/orders/getPlanSetting$", || Route::PlanSetting)?
        .add_route(r"^/orders/fetch-order$", || Route::FetchOrder)?
        .add_route(r"^/orders/activeOrder$", || Route::ActiveOrder)?
        .add_route(r"^/orders/add-selected-recipes$", || Route::AddSelectedRecipes)?
        .add_route(r"^/orders/delete-order$", || Route::DeleteOrder)?
        .add_route_with_params(r"^/orders/getOrderDetails/(\d+)$", |params| {
            params
                .get(0)
                .and_then(|string_id| string_id.parse().ok())
                .map(|customer_id| Route::OrderDetailsByCustomer { customer_id })
        })?
        .add_route(r"^/categories$", || Route::Categories)?
        .add_route(r"^/categories/categorieswithrecipes$", || Route::CategoriesWithRecipes)?
        .add_route(r"^/recipes$", || Route::Recipes)?
        .add_route_with_params(r"^/recipes/(\d+)$", |params| {
            params
                .get(0)
                .and_then(|string_id| string_id.parse().ok())
                .map(|category_id| Route::RecipesByCategory { category_id })
        })?
        .add_route(r"^/spices$", || Route::Spices)?
        .add_route(r"^/snacks$", || Route::Snacks)?
        .add_route(r"^/snacks/getSnackOrder$", || Route::SnackOrder)?
        .add_route(r"^/snacks/addSnacksMapping$", || Route::AddSnacks)?
        .add_route(r"^/stripe/webhook$", || Route::PaymentWebhook)?
        .add_route(r"^/stripe/pauseSubscription$", || Route::PauseSubscription)?
        .add_route(r"^/stripe/resumeSubscription$", || Route::ResumeSubscription)?
        .add_route(r"^/stripe/cancelSubscription$", || Route::CancelSubscription)?;

    Ok(route_parser)
}
