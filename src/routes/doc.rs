use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartLineDto, CartList, UpdateCartQuantityRequest},
        orders::{
            CheckoutRequest, CheckoutResponse, FailedStall, OrderList, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, UpdateProductRequest},
        products,
        stalls::{CreateStallRequest, StallList, UpdateStallRequest},
    },
    models::{CartItem, InventoryTransaction, Order, OrderItem, Product, Stall, User},
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, health, orders, params, products as product_routes, seller, stalls,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        stalls::list_stalls,
        stalls::get_stall,
        stalls::create_stall,
        stalls::update_stall,
        product_routes::list_products,
        product_routes::get_product,
        product_routes::create_product,
        product_routes::update_product,
        product_routes::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_quantity,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::pay_order,
        seller::list_stall_orders,
        seller::update_order_status,
        seller::list_transactions,
        seller::adjust_stock,
        admin::list_all_orders,
        admin::list_low_stock
    ),
    components(
        schemas(
            User,
            Stall,
            Product,
            CartItem,
            Order,
            OrderItem,
            InventoryTransaction,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateStallRequest,
            UpdateStallRequest,
            StallList,
            CreateProductRequest,
            UpdateProductRequest,
            products::ProductList,
            AddToCartRequest,
            UpdateCartQuantityRequest,
            CartLineDto,
            CartList,
            CheckoutRequest,
            CheckoutResponse,
            FailedStall,
            OrderList,
            OrderWithItems,
            UpdateOrderStatusRequest,
            seller::AdjustStockRequest,
            admin::ProductList,
            admin::LowStockQuery,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<products::ProductList>,
            ApiResponse<CartList>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<StallList>,
            ApiResponse<admin::ProductList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Stalls", description = "Stall endpoints"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Pre-order endpoints"),
        (name = "Seller", description = "Seller order and inventory endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
