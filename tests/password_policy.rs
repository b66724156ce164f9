use night_market_api::services::auth_service::validate_password;

#[test]
fn accepts_a_strong_password() {
    assert!(validate_password("Kw4yTeow!88").is_ok());
}

#[test]
fn rejects_short_passwords() {
    assert!(validate_password("Ab1!xyz").is_err());
}

#[test]
fn rejects_missing_uppercase() {
    assert!(validate_password("kw4yteow!88").is_err());
}

#[test]
fn rejects_missing_lowercase() {
    assert!(validate_password("KW4YTEOW!88").is_err());
}

#[test]
fn rejects_missing_digit() {
    assert!(validate_password("KwayTeow!!!").is_err());
}

#[test]
fn rejects_missing_special_character() {
    assert!(validate_password("Kw4yTeow888").is_err());
}

#[test]
fn rejects_common_passwords() {
    assert!(validate_password("password").is_err());
    assert!(validate_password("Password123").is_err());
}
