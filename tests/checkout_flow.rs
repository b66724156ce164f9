use chrono::{Duration, NaiveTime, Utc};
use night_market_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{cart::AddToCartRequest, orders::CheckoutRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        products::{ActiveModel as ProductActive, Entity as Products},
        stalls::ActiveModel as StallActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    routes::seller::AdjustStockRequest,
    services::{cart_service, inventory_service, order_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement,
};
use uuid::Uuid;

// Checkout scenarios against a real database, run sequentially because each
// starts from truncated tables. Skipped when no database is configured.
#[tokio::test]
async fn checkout_flows() -> anyhow::Result<()> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run checkout flow tests."
                );
                return Ok(());
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    let state = AppState { pool, orm };

    splits_cart_by_stall(&state).await?;
    aborts_on_price_change(&state).await?;
    aborts_when_product_unavailable(&state).await?;
    rejected_decrement_leaves_order_flagged(&state).await?;
    decrement_error_does_not_fail_checkout(&state).await?;
    failed_stall_keeps_its_cart_lines(&state).await?;
    stock_in_overflow_is_rejected(&state).await?;
    pay_marks_order_paid_once(&state).await?;

    Ok(())
}

// One pre-order per stall, cart cleared, stock decremented.
async fn splits_cart_by_stall(state: &AppState) -> anyhow::Result<()> {
    reset(state).await?;

    let customer = create_user(state, "customer", "makan@example.com").await?;
    let seller_a = create_user(state, "seller", "ahhock@example.com").await?;
    let seller_b = create_user(state, "seller", "maksenik@example.com").await?;
    let stall_a = create_stall(state, seller_a.user_id, "Ah Hock Char Kway Teow").await?;
    let stall_b = create_stall(state, seller_b.user_id, "Mak Senik Apam Balik").await?;

    let kway_teow = create_product(state, stall_a, "Char Kway Teow", 500, 10).await?;
    let teh_tarik = create_product(state, stall_a, "Teh Tarik", 300, 10).await?;
    let laksa = create_product(state, stall_b, "Laksa Special", 1000, 10).await?;

    add(state, &customer, kway_teow, 2).await?;
    add(state, &customer, teh_tarik, 1).await?;
    add(state, &customer, laksa, 1).await?;

    let resp = order_service::checkout(state, &customer, tomorrow_pickup()).await?;
    let data = resp.data.expect("checkout data");
    assert!(data.failed_stalls.is_empty());
    assert_eq!(data.orders.len(), 2);

    let order_a = &data.orders[0];
    let order_b = &data.orders[1];
    assert_eq!(order_a.order.stall_id, stall_a);
    assert_eq!(order_a.order.total_amount, 1300);
    assert_eq!(order_a.items.len(), 2);
    assert_eq!(order_b.order.stall_id, stall_b);
    assert_eq!(order_b.order.total_amount, 1000);
    assert!(order_a.order.tracking_code.starts_with("PM"));
    assert_ne!(order_a.order.tracking_code, order_b.order.tracking_code);
    assert!(order_a.items.iter().all(|i| i.stock_adjusted));

    // Cart is cleared once every stall succeeded.
    let cart = cart_service::list_cart(state, &customer).await?;
    assert!(cart.data.expect("cart data").items.is_empty());

    // Stock came down by the ordered quantities.
    let product = Products::find_by_id(kway_teow)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(product.stock_quantity, 8);

    Ok(())
}

// A price raised after add-to-cart aborts the whole checkout before any write.
async fn aborts_on_price_change(state: &AppState) -> anyhow::Result<()> {
    reset(state).await?;

    let customer = create_user(state, "customer", "makan@example.com").await?;
    let seller = create_user(state, "seller", "ahhock@example.com").await?;
    let stall = create_stall(state, seller.user_id, "Ah Hock Char Kway Teow").await?;
    let product_id = create_product(state, stall, "Char Kway Teow", 500, 10).await?;

    add(state, &customer, product_id, 2).await?;

    let mut active: ProductActive = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product")
        .into();
    active.price = Set(600);
    active.update(&state.orm).await?;

    let err = order_service::checkout(state, &customer, tomorrow_pickup())
        .await
        .expect_err("price change must abort checkout");
    assert!(matches!(err, AppError::Conflict(_)), "got: {err:?}");

    // The cart is intact and no order exists.
    let cart = cart_service::list_cart(state, &customer).await?;
    assert_eq!(cart.data.expect("cart data").items.len(), 1);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pre_orders")
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(count, 0);

    Ok(())
}

async fn aborts_when_product_unavailable(state: &AppState) -> anyhow::Result<()> {
    reset(state).await?;

    let customer = create_user(state, "customer", "makan@example.com").await?;
    let seller = create_user(state, "seller", "ahhock@example.com").await?;
    let stall = create_stall(state, seller.user_id, "Ah Hock Char Kway Teow").await?;
    let product_id = create_product(state, stall, "Char Kway Teow", 500, 10).await?;

    add(state, &customer, product_id, 1).await?;

    let mut active: ProductActive = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product")
        .into();
    active.is_available = Set(false);
    active.update(&state.orm).await?;

    let err = order_service::checkout(state, &customer, tomorrow_pickup())
        .await
        .expect_err("unavailable product must abort checkout");
    assert!(matches!(err, AppError::Conflict(_)), "got: {err:?}");

    Ok(())
}

// Stock drops below the ordered quantity between the gate and the decrement:
// the order stands with the line flagged for review, not rolled back.
async fn rejected_decrement_leaves_order_flagged(state: &AppState) -> anyhow::Result<()> {
    reset(state).await?;

    let customer = create_user(state, "customer", "makan@example.com").await?;
    let seller = create_user(state, "seller", "ahhock@example.com").await?;
    let stall = create_stall(state, seller.user_id, "Ah Hock Char Kway Teow").await?;
    // Stock 1 passes the gate, but cannot cover a quantity of 2.
    let product_id = create_product(state, stall, "Char Kway Teow", 500, 1).await?;

    add(state, &customer, product_id, 2).await?;

    let resp = order_service::checkout(state, &customer, tomorrow_pickup()).await?;
    let data = resp.data.expect("checkout data");
    assert_eq!(data.orders.len(), 1);

    let order = &data.orders[0];
    assert!(!order.items[0].stock_adjusted);

    let stored = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.order.id))
        .one(&state.orm)
        .await?
        .expect("order item");
    assert!(!stored.stock_adjusted);

    // Stock untouched by the rejected decrement.
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(product.stock_quantity, 1);

    Ok(())
}

// A hard database error on the decrement path after the order committed must
// not turn into a failed stall: the order is already durable, so the flow
// succeeds with the line left unflagged.
async fn decrement_error_does_not_fail_checkout(state: &AppState) -> anyhow::Result<()> {
    reset(state).await?;

    let customer = create_user(state, "customer", "makan@example.com").await?;
    let seller = create_user(state, "seller", "ahhock@example.com").await?;
    let stall = create_stall(state, seller.user_id, "Ah Hock Char Kway Teow").await?;
    let product_id = create_product(state, stall, "Char Kway Teow", 500, 10).await?;

    add(state, &customer, product_id, 2).await?;

    // Make every inventory_transactions insert fail so the decrement errors
    // instead of being rejected.
    exec_sql(
        state,
        "ALTER TABLE inventory_transactions ADD CONSTRAINT always_fails CHECK (false) NOT VALID",
    )
    .await?;
    let result = order_service::checkout(state, &customer, tomorrow_pickup()).await;
    exec_sql(
        state,
        "ALTER TABLE inventory_transactions DROP CONSTRAINT always_fails",
    )
    .await?;

    let data = result?.data.expect("checkout data");
    assert!(data.failed_stalls.is_empty());
    assert_eq!(data.orders.len(), 1);

    let order = &data.orders[0];
    assert_eq!(order.order.total_amount, 1000);
    assert!(!order.items[0].stock_adjusted);

    // The cart was cleared and the rolled-back decrement left stock alone.
    let cart = cart_service::list_cart(state, &customer).await?;
    assert!(cart.data.expect("cart data").items.is_empty());
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(product.stock_quantity, 10);

    Ok(())
}

// One stall's order insert fails: the other stall's order is created, the
// failed stall is reported, and only its cart lines survive for retry.
async fn failed_stall_keeps_its_cart_lines(state: &AppState) -> anyhow::Result<()> {
    reset(state).await?;

    let customer = create_user(state, "customer", "makan@example.com").await?;
    let seller_a = create_user(state, "seller", "ahhock@example.com").await?;
    let seller_b = create_user(state, "seller", "maksenik@example.com").await?;
    let stall_a = create_stall(state, seller_a.user_id, "Ah Hock Char Kway Teow").await?;
    let stall_b = create_stall(state, seller_b.user_id, "Mak Senik Apam Balik").await?;

    let kway_teow = create_product(state, stall_a, "Char Kway Teow", 500, 10).await?;
    let apam_balik = create_product(state, stall_b, "Apam Balik", 400, 10).await?;

    add(state, &customer, kway_teow, 1).await?;
    add(state, &customer, apam_balik, 1).await?;

    // Block order inserts for stall B only.
    exec_sql(
        state,
        &format!("ALTER TABLE pre_orders ADD CONSTRAINT blocked_stall CHECK (stall_id <> '{stall_b}')"),
    )
    .await?;
    let result = order_service::checkout(state, &customer, tomorrow_pickup()).await;
    exec_sql(state, "ALTER TABLE pre_orders DROP CONSTRAINT blocked_stall").await?;

    let resp = result?;
    assert_eq!(resp.message, "Checkout partially succeeded");
    let data = resp.data.expect("checkout data");

    assert_eq!(data.orders.len(), 1);
    assert_eq!(data.orders[0].order.stall_id, stall_a);
    assert_eq!(data.failed_stalls.len(), 1);
    assert_eq!(data.failed_stalls[0].stall_id, stall_b);
    assert_eq!(data.failed_stalls[0].stall_name, "Mak Senik Apam Balik");

    // Only the failed stall's line is still in the cart.
    let cart = cart_service::list_cart(state, &customer).await?;
    let items = cart.data.expect("cart data").items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, apam_balik);

    Ok(())
}

async fn stock_in_overflow_is_rejected(state: &AppState) -> anyhow::Result<()> {
    reset(state).await?;

    let seller = create_user(state, "seller", "ahhock@example.com").await?;
    let stall = create_stall(state, seller.user_id, "Ah Hock Char Kway Teow").await?;
    let product_id = create_product(state, stall, "Char Kway Teow", 500, i32::MAX).await?;

    let result = inventory_service::adjust_stock(
        state,
        &seller,
        product_id,
        AdjustStockRequest {
            transaction_type: "in".into(),
            quantity: 1,
            notes: None,
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    // Stock untouched by the rejected adjustment.
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(product.stock_quantity, i32::MAX);

    Ok(())
}

async fn pay_marks_order_paid_once(state: &AppState) -> anyhow::Result<()> {
    reset(state).await?;

    let customer = create_user(state, "customer", "makan@example.com").await?;
    let seller = create_user(state, "seller", "ahhock@example.com").await?;
    let stall = create_stall(state, seller.user_id, "Ah Hock Char Kway Teow").await?;
    let product_id = create_product(state, stall, "Char Kway Teow", 500, 10).await?;

    add(state, &customer, product_id, 1).await?;
    let resp = order_service::checkout(state, &customer, tomorrow_pickup()).await?;
    let order_id = resp.data.expect("checkout data").orders[0].order.id;

    let paid = order_service::pay_order(state, &customer, order_id).await?;
    assert_eq!(paid.data.expect("order").order.payment_status, "paid");

    let again = order_service::pay_order(state, &customer, order_id).await;
    assert!(matches!(again, Err(AppError::BadRequest(_))));

    Ok(())
}

async fn exec_sql(state: &AppState, sql: &str) -> anyhow::Result<()> {
    let backend = state.orm.get_database_backend();
    state
        .orm
        .execute(Statement::from_string(backend, sql.to_string()))
        .await?;
    Ok(())
}

async fn reset(state: &AppState) -> anyhow::Result<()> {
    let backend = state.orm.get_database_backend();
    state
        .orm
        .execute(Statement::from_string(
            backend,
            "TRUNCATE TABLE order_items, pre_orders, cart_items, inventory_transactions, audit_logs, products, stalls, users RESTART IDENTITY CASCADE",
        ))
        .await?;
    Ok(())
}

fn tomorrow_pickup() -> CheckoutRequest {
    CheckoutRequest {
        pickup_date: Some(Utc::now().date_naive() + Duration::days(1)),
        pickup_time: NaiveTime::from_hms_opt(19, 30, 0),
        notes: None,
    }
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: role.into(),
    })
}

async fn create_stall(state: &AppState, seller_id: Uuid, name: &str) -> anyhow::Result<Uuid> {
    let stall = StallActive {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller_id),
        stall_name: Set(name.into()),
        location: Set("Row 1, Lot 1".into()),
        description: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(stall.id)
}

async fn create_product(
    state: &AppState,
    stall_id: Uuid,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        stall_id: Set(stall_id),
        name: Set(name.into()),
        description: Set(None),
        price: Set(price),
        stock_quantity: Set(stock),
        is_available: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

async fn add(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_to_cart(
        state,
        user,
        AddToCartRequest {
            product_id,
            quantity,
        },
    )
    .await?;
    Ok(())
}
