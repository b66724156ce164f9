use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use night_market_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let pool = create_pool(&config.database_url).await?;

    let admin_id = ensure_user(&pool, "admin@pasarmalam.example", "Adm1n!Pasar", "admin").await?;
    let seller_one = ensure_user(&pool, "ahhock@pasarmalam.example", "Kw4yTeow!88", "seller").await?;
    let seller_two = ensure_user(&pool, "maksenik@pasarmalam.example", "Ap4mBalik!7", "seller").await?;
    let customer_id =
        ensure_user(&pool, "customer@pasarmalam.example", "Mak4n!Sedap1", "customer").await?;

    let stall_one = ensure_stall(
        &pool,
        seller_one,
        "Ah Hock Char Kway Teow",
        "Row 3, Lot 12",
        Some("Wok hei since 1989"),
    )
    .await?;
    let stall_two = ensure_stall(
        &pool,
        seller_two,
        "Mak Senik Apam Balik",
        "Row 1, Lot 4",
        Some("Crispy edges, generous peanuts"),
    )
    .await?;

    seed_products(&pool, stall_one, &[
        ("Char Kway Teow", "Flat noodles with prawns and cockles", 900, 40),
        ("Char Kway Teow (Special)", "Extra prawns, duck egg", 1300, 20),
        ("Fried Oyster Omelette", "Or chien with chilli dip", 1100, 25),
    ])
    .await?;
    seed_products(&pool, stall_two, &[
        ("Apam Balik", "Peanut and sweetcorn pancake", 400, 60),
        ("Apam Balik (Crispy)", "Thin and crispy version", 500, 60),
        ("Teh Tarik", "Pulled milk tea", 300, 100),
    ])
    .await?;

    println!("Seed completed. Admin: {admin_id}, Customer: {customer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_stall(
    pool: &sqlx::PgPool,
    seller_id: Uuid,
    stall_name: &str,
    location: &str,
    description: Option<&str>,
) -> anyhow::Result<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO stalls (id, seller_id, stall_name, location, description)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (seller_id) DO UPDATE SET stall_name = EXCLUDED.stall_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller_id)
    .bind(stall_name)
    .bind(location)
    .bind(description)
    .fetch_optional(pool)
    .await?;

    let stall_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM stalls WHERE seller_id = $1")
                .bind(seller_id)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured stall {stall_name}");
    Ok(stall_id)
}

async fn seed_products(
    pool: &sqlx::PgPool,
    stall_id: Uuid,
    products: &[(&str, &str, i64, i32)],
) -> anyhow::Result<()> {
    for (name, desc, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, stall_id, name, description, price, stock_quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (stall_id, name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(stall_id)
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products for stall {stall_id}");
    Ok(())
}
