use std::sync::Arc;

use failure::Error as FailureError;
use futures::future;
use futures::prelude::*;

use clients::payment::PaymentGateway;
use clients::webhook::{WebhookVerifier, SIGNATURE_HEADER};
use errors::*;
use models::*;
use services::*;

pub mod routing;
pub mod types;

use self::routing::*;
pub use self::types::*;

pub trait Controller {
    fn call(&self, request: Request) -> ControllerFuture;
}

pub struct ServiceFactory {
    pub system_factory: Arc<dyn Fn() -> Box<dyn SystemService> + Send + Sync>,
    pub catalog_factory: Arc<dyn Fn() -> Box<dyn CatalogService> + Send + Sync>,
    pub order_factory: Arc<dyn Fn() -> Box<dyn OrderService> + Send + Sync>,
    pub snack_factory: Arc<dyn Fn() -> Box<dyn SnackService> + Send + Sync>,
    pub payment_factory: Arc<dyn Fn() -> Box<dyn PaymentService> + Send + Sync>,
}

impl ServiceFactory {
    pub fn new(ctx: ServiceContext, gateway: Arc<dyn PaymentGateway>, verifier: WebhookVerifier) -> Self {
        Self {
            system_factory: Arc::new(|| Box::new(SystemServiceImpl::default()) as Box<dyn SystemService>),
            catalog_factory: Arc::new({
                let ctx = ctx.clone();
                move || Box::new(CatalogServiceImpl::new(ctx.clone())) as Box<dyn CatalogService>
            }),
            order_factory: Arc::new({
                let ctx = ctx.clone();
                move || Box::new(OrderServiceImpl::new(ctx.clone())) as Box<dyn OrderService>
            }),
            snack_factory: Arc::new({
                let ctx = ctx.clone();
                move || Box::new(SnackServiceImpl::new(ctx.clone())) as Box<dyn SnackService>
            }),
            payment_factory: Arc::new(move || {
                Box::new(PaymentServiceImpl::new(ctx.clone(), gateway.clone(), verifier.clone())) as Box<dyn PaymentService>
            }),
        }
    }
}

pub struct ControllerImpl {
    route_parser: Arc<RouteParser<Route>>,
    service_factory: Arc<ServiceFactory>,
}

impl ControllerImpl {
    pub fn new(service_factory: ServiceFactory) -> Result<Self, FailureError> {
        Ok(Self {
            route_parser: Arc::new(make_router()?),
            service_factory: Arc::new(service_factory),
        })
    }
}

fn missing_param(what: &str) -> ControllerFuture {
    let e: FailureError = format_err!("Missing or invalid query parameter {}", what)
        .context(Error::Validation)
        .into();
    Box::new(future::ok(Response::from_error(&e)))
}

impl Controller for ControllerImpl {
    fn call(&self, request: Request) -> ControllerFuture {
        let service_factory = self.service_factory.clone();
        let route = self.route_parser.test(&request.path);
        let body = request.body.clone();

        match (request.method, route) {
            // GET /healthcheck
            (Method::Get, Some(Route::Healthcheck)) => serialize_future("Ok", (service_factory.system_factory)().healthcheck()),

            // POST /orders/place-order
            (Method::Post, Some(Route::PlaceOrder)) => serialize_future(
                "Order placed successfully",
                future::result(parse_body::<PlaceOrderPayload>(&body)).and_then(move |payload| {
                    debug!("Received request to place order for customer {}", payload.customer_id);
                    (service_factory.order_factory)().place_order(payload)
                }),
            ),
            // POST /orders/update-order
            (Method::Post, Some(Route::UpdateOrder)) => serialize_future(
                "Order updated successfully",
                future::result(parse_body::<UpdateOrderPayload>(&body)).and_then(move |payload| {
                    debug!("Received request to update order {}", payload.order_id);
                    (service_factory.order_factory)().update_order(payload)
                }),
            ),
            // POST /orders/getPlanSetting
            (Method::Post, Some(Route::PlanSetting)) => serialize_future(
                "Plan setting fetched successfully",
                future::result(parse_body::<CustomerPayload>(&body))
                    .and_then(move |payload| (service_factory.order_factory)().plan_setting(payload.customer_id)),
            ),
            // POST /orders/fetch-order
            (Method::Post, Some(Route::FetchOrder)) => serialize_future(
                "Order fetched successfully",
                future::result(parse_body::<CustomerPayload>(&body))
                    .and_then(move |payload| (service_factory.order_factory)().fetch_order(payload.customer_id)),
            ),
            // GET /orders/activeOrder?customer_id=<customer_id>
            (Method::Get, Some(Route::ActiveOrder)) => match request.query_param::<CustomerId>("customer_id") {
                Some(customer_id) => {
                    debug!("Received request to get active order of customer {}", customer_id);
                    serialize_future(
                        "Active order fetched successfully",
                        (service_factory.order_factory)().active_order(customer_id),
                    )
                }
                None => missing_param("customer_id"),
            },
            // POST /orders/add-selected-recipes
            (Method::Post, Some(Route::AddSelectedRecipes)) => serialize_future(
                "Recipe mappings added successfully",
                future::result(parse_body::<AddSelectedRecipesPayload>(&body))
                    .and_then(move |payload| (service_factory.order_factory)().add_selected_recipes(payload)),
            ),
            // POST /orders/delete-order
            (Method::Post, Some(Route::DeleteOrder)) => serialize_future(
                "Order deleted successfully",
                future::result(parse_body::<OrderIdPayload>(&body)).and_then(move |payload| {
                    debug!("Received request to delete order {}", payload.order_id);
                    (service_factory.order_factory)().delete_order(payload.order_id)
                }),
            ),
            // GET /orders/getOrderDetails/<customer_id>
            (Method::Get, Some(Route::OrderDetailsByCustomer { customer_id })) => serialize_future(
                "Order details fetched successfully",
                (service_factory.order_factory)().order_details_by_customer(customer_id),
            ),

            // GET /categories
            (Method::Get, Some(Route::Categories)) => {
                serialize_future("Categories fetched successfully", (service_factory.catalog_factory)().categories())
            }
            // GET /categories/categorieswithrecipes
            (Method::Get, Some(Route::CategoriesWithRecipes)) => serialize_future(
                "Categories fetched successfully",
                (service_factory.catalog_factory)().categories_with_recipes(),
            ),
            // GET /recipes
            (Method::Get, Some(Route::Recipes)) => {
                serialize_future("Recipes fetched successfully", (service_factory.catalog_factory)().recipes(None))
            }
            // GET /recipes/<category_id>
            (Method::Get, Some(Route::RecipesByCategory { category_id })) => serialize_future(
                "Recipes fetched successfully",
                (service_factory.catalog_factory)().recipes(Some(category_id)),
            ),
            // GET /spices
            (Method::Get, Some(Route::Spices)) => {
                serialize_future("Spice levels fetched successfully", (service_factory.catalog_factory)().spice_levels())
            }
            // GET /snacks
            (Method::Get, Some(Route::Snacks)) => {
                serialize_future("Snacks fetched successfully", (service_factory.catalog_factory)().snacks())
            }

            // GET /snacks/getSnackOrder?order_id=<order_id>&active_week=<week>
            (Method::Get, Some(Route::SnackOrder)) => {
                match (request.query_param::<OrderId>("order_id"), request.query_param::<Week>("active_week")) {
                    (Some(order_id), Some(week)) => serialize_future(
                        "Snack order fetched successfully",
                        (service_factory.snack_factory)().snack_order(order_id, week),
                    ),
                    _ => missing_param("order_id or active_week"),
                }
            }
            // POST /snacks/addSnacksMapping
            (Method::Post, Some(Route::AddSnacks)) => serialize_future(
                "Snacks added successfully",
                future::result(parse_body::<AddSnacksPayload>(&body))
                    .and_then(move |payload| (service_factory.snack_factory)().add_snacks(payload)),
            ),

            // POST /stripe/webhook
            (Method::Post, Some(Route::PaymentWebhook)) => {
                let signature = request.header(SIGNATURE_HEADER).unwrap_or_default().to_string();
                serialize_future(
                    "Webhook received",
                    (service_factory.payment_factory)().handle_webhook(body, signature),
                )
            }
            // POST /stripe/pauseSubscription
            (Method::Post, Some(Route::PauseSubscription)) => serialize_future(
                "Subscription paused successfully",
                future::result(parse_body::<SubscriptionPayload>(&body))
                    .and_then(move |payload| (service_factory.payment_factory)().pause_subscription(payload.subscription_id)),
            ),
            // POST /stripe/resumeSubscription
            (Method::Post, Some(Route::ResumeSubscription)) => serialize_future(
                "Subscription resumed successfully",
                future::result(parse_body::<SubscriptionPayload>(&body))
                    .and_then(move |payload| (service_factory.payment_factory)().resume_subscription(payload.subscription_id)),
            ),
            // POST /stripe/cancelSubscription
            (Method::Post, Some(Route::CancelSubscription)) => serialize_future(
                "Subscription cancelled successfully",
                future::result(parse_body::<SubscriptionPayload>(&body))
                    .and_then(move |payload| (service_factory.payment_factory)().cancel_subscription(payload.subscription_id)),
            ),

            // Fallback
            (method, route) => {
                debug!("No handler for {:?} {} ({:?})", method, request.path, route);
                Box::new(future::ok(Response::not_found()))
            }
        }
    }
}
