use std::collections::HashMap;

use night_market_api::checkout::{
    CartLine, CurrentProduct, generate_tracking_code, group_total, partition_by_stall, revalidate,
};
use uuid::Uuid;

fn line(product_id: Uuid, name: &str, unit_price: i64, quantity: i32, stall_id: Uuid) -> CartLine {
    CartLine {
        product_id,
        product_name: name.into(),
        unit_price,
        quantity,
        stall_id,
        stall_name: format!("Stall for {name}"),
    }
}

fn current(price: i64, stock: i32, available: bool) -> CurrentProduct {
    CurrentProduct {
        price,
        stock_quantity: stock,
        is_available: available,
    }
}

#[test]
fn revalidate_accepts_clean_cart() {
    let p1 = Uuid::new_v4();
    let stall = Uuid::new_v4();
    let lines = vec![line(p1, "Satay", 200, 5, stall)];
    let mut state = HashMap::new();
    state.insert(p1, current(200, 10, true));

    let result = revalidate(&lines, &state);
    assert!(result.is_clean());
}

#[test]
fn revalidate_flags_deleted_product_as_unavailable() {
    let p1 = Uuid::new_v4();
    let stall = Uuid::new_v4();
    let lines = vec![line(p1, "Satay", 200, 5, stall)];
    let state = HashMap::new();

    let result = revalidate(&lines, &state);
    assert_eq!(result.unavailable, vec!["Satay".to_string()]);
    assert!(result.price_changed.is_empty());
}

#[test]
fn revalidate_flags_zero_stock_and_hidden_products() {
    let sold_out = Uuid::new_v4();
    let hidden = Uuid::new_v4();
    let stall = Uuid::new_v4();
    let lines = vec![
        line(sold_out, "Laksa", 700, 1, stall),
        line(hidden, "Cendol", 350, 2, stall),
    ];
    let mut state = HashMap::new();
    state.insert(sold_out, current(700, 0, true));
    state.insert(hidden, current(350, 5, false));

    let result = revalidate(&lines, &state);
    assert_eq!(result.unavailable, vec!["Laksa".to_string(), "Cendol".to_string()]);
}

#[test]
fn revalidate_flags_price_change_with_both_prices() {
    let p1 = Uuid::new_v4();
    let stall = Uuid::new_v4();
    let lines = vec![line(p1, "Satay", 200, 5, stall)];
    let mut state = HashMap::new();
    state.insert(p1, current(250, 10, true));

    let result = revalidate(&lines, &state);
    assert!(!result.is_clean());
    assert_eq!(result.price_changed.len(), 1);
    assert_eq!(result.price_changed[0].old_price, 200);
    assert_eq!(result.price_changed[0].new_price, 250);
}

#[test]
fn revalidate_does_not_flag_price_change_for_unavailable_product() {
    // Unavailable wins; a stale price on a sold-out product is reported once.
    let p1 = Uuid::new_v4();
    let stall = Uuid::new_v4();
    let lines = vec![line(p1, "Satay", 200, 5, stall)];
    let mut state = HashMap::new();
    state.insert(p1, current(250, 0, true));

    let result = revalidate(&lines, &state);
    assert_eq!(result.unavailable, vec!["Satay".to_string()]);
    assert!(result.price_changed.is_empty());
}

#[test]
fn rejection_message_names_affected_products() {
    let gone = Uuid::new_v4();
    let repriced = Uuid::new_v4();
    let stall = Uuid::new_v4();
    let lines = vec![
        line(gone, "Laksa", 700, 1, stall),
        line(repriced, "Satay", 200, 5, stall),
    ];
    let mut state = HashMap::new();
    state.insert(repriced, current(250, 10, true));

    let result = revalidate(&lines, &state);
    let message = result.rejection_message();
    assert!(message.contains("Laksa"), "message was: {message}");
    assert!(message.contains("Satay"), "message was: {message}");
}

#[test]
fn partition_keeps_first_seen_stall_order() {
    let stall_a = Uuid::new_v4();
    let stall_b = Uuid::new_v4();
    let lines = vec![
        line(Uuid::new_v4(), "Apam Balik", 400, 1, stall_a),
        line(Uuid::new_v4(), "Laksa", 700, 1, stall_b),
        line(Uuid::new_v4(), "Teh Tarik", 300, 2, stall_a),
    ];

    let groups = partition_by_stall(&lines);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].0, stall_a);
    assert_eq!(groups[1].0, stall_b);
    assert_eq!(groups[0].1.len(), 2);
    assert_eq!(groups[0].1[0].product_name, "Apam Balik");
    assert_eq!(groups[0].1[1].product_name, "Teh Tarik");
    assert_eq!(groups[1].1.len(), 1);
}

#[test]
fn partition_of_single_stall_cart_is_one_group() {
    let stall = Uuid::new_v4();
    let lines = vec![
        line(Uuid::new_v4(), "Satay", 200, 5, stall),
        line(Uuid::new_v4(), "Cendol", 350, 1, stall),
    ];

    let groups = partition_by_stall(&lines);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].1, lines);
}

#[test]
fn group_total_uses_revalidated_prices() {
    let stall_a = Uuid::new_v4();
    let stall_b = Uuid::new_v4();
    let p1 = Uuid::new_v4();
    let p2 = Uuid::new_v4();
    let p3 = Uuid::new_v4();
    let lines = vec![
        line(p1, "Char Kway Teow", 500, 2, stall_a),
        line(p2, "Teh Tarik", 300, 1, stall_a),
        line(p3, "Laksa Special", 1000, 1, stall_b),
    ];
    let mut state = HashMap::new();
    state.insert(p1, current(500, 10, true));
    state.insert(p2, current(300, 10, true));
    state.insert(p3, current(1000, 10, true));

    let groups = partition_by_stall(&lines);
    assert_eq!(group_total(&groups[0].1, &state), 1300);
    assert_eq!(group_total(&groups[1].1, &state), 1000);
}

#[test]
fn tracking_code_is_pm_plus_nine_digits() {
    for _ in 0..100 {
        let code = generate_tracking_code();
        assert_eq!(code.len(), 11, "code was: {code}");
        assert!(code.starts_with("PM"));
        assert!(code[2..].chars().all(|c| c.is_ascii_digit()));
    }
}
