//! Pure checkout logic: revalidation of cart lines against current product
//! state, partitioning of the cart into per-stall order groups, and tracking
//! code generation. The database-facing half lives in
//! `services::order_service`.

use std::collections::HashMap;

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

/// One line of a customer's cart, joined with its cached display data.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub product_name: String,
    /// Price cached when the line was added, in sen.
    pub unit_price: i64,
    pub quantity: i32,
    pub stall_id: Uuid,
    pub stall_name: String,
}

/// Current product state as read from the store at checkout time.
#[derive(Debug, Clone, Copy)]
pub struct CurrentProduct {
    pub price: i64,
    pub stock_quantity: i32,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceChange {
    pub product_name: String,
    pub old_price: i64,
    pub new_price: i64,
}

/// Outcome of the precondition gate. Checkout writes nothing unless this is
/// clean.
#[derive(Debug, Default)]
pub struct Revalidation {
    pub unavailable: Vec<String>,
    pub price_changed: Vec<PriceChange>,
}

impl Revalidation {
    pub fn is_clean(&self) -> bool {
        self.unavailable.is_empty() && self.price_changed.is_empty()
    }

    /// Human-readable rejection naming the affected products.
    pub fn rejection_message(&self) -> String {
        let mut parts = Vec::new();
        if !self.unavailable.is_empty() {
            parts.push(format!(
                "no longer available: {}",
                self.unavailable.join(", ")
            ));
        }
        if !self.price_changed.is_empty() {
            let names: Vec<&str> = self
                .price_changed
                .iter()
                .map(|c| c.product_name.as_str())
                .collect();
            parts.push(format!("price changed: {}", names.join(", ")));
        }
        parts.join("; ")
    }
}

/// Classify every cart line against the freshly fetched product state.
///
/// A product missing from `current` (deleted since add-to-cart) counts as
/// unavailable, as does zero stock or an availability flag turned off. A line
/// whose cached price differs from the current price is a price change.
pub fn revalidate(lines: &[CartLine], current: &HashMap<Uuid, CurrentProduct>) -> Revalidation {
    let mut result = Revalidation::default();
    for line in lines {
        match current.get(&line.product_id) {
            None => result.unavailable.push(line.product_name.clone()),
            Some(p) if !p.is_available || p.stock_quantity <= 0 => {
                result.unavailable.push(line.product_name.clone());
            }
            Some(p) if p.price != line.unit_price => {
                result.price_changed.push(PriceChange {
                    product_name: line.product_name.clone(),
                    old_price: line.unit_price,
                    new_price: p.price,
                });
            }
            Some(_) => {}
        }
    }
    result
}

/// Group cart lines by stall, keeping first-seen stall order and relative
/// line order within each group. One pre-order is created per group; an
/// order never spans stalls.
pub fn partition_by_stall(lines: &[CartLine]) -> Vec<(Uuid, Vec<CartLine>)> {
    let mut groups: Vec<(Uuid, Vec<CartLine>)> = Vec::new();
    for line in lines {
        match groups.iter_mut().find(|(id, _)| *id == line.stall_id) {
            Some((_, group)) => group.push(line.clone()),
            None => groups.push((line.stall_id, vec![line.clone()])),
        }
    }
    groups
}

/// Order total for one stall group, from revalidated prices.
pub fn group_total(lines: &[CartLine], current: &HashMap<Uuid, CurrentProduct>) -> i64 {
    lines
        .iter()
        .map(|line| {
            let price = current
                .get(&line.product_id)
                .map(|p| p.price)
                .unwrap_or(line.unit_price);
            price * i64::from(line.quantity)
        })
        .sum()
}

/// Customer-facing tracking code: "PM" + six time-derived digits + three
/// random digits. Best-effort unique; the orders table carries a unique
/// constraint and the submitter regenerates on conflict.
pub fn generate_tracking_code() -> String {
    let timestamp = Utc::now().timestamp_millis() % 1_000_000;
    let random: u32 = rand::thread_rng().gen_range(0..1000);
    format!("PM{timestamp:06}{random:03}")
}
