use tutordesk::modules::credentials::generate_password;
use tutordesk::tutordesk_core::{hash_password_with_cost, verify_password};

const TEST_COST: u32 = 4;

#[test]
fn test_hash_password_success() {
    let password = "testpassword123";
    let hash = hash_password_with_cost(password, TEST_COST).unwrap();

    assert!(!hash.is_empty());
    assert_ne!(hash, password);
}

#[test]
fn test_verify_password_correct() {
    let password = "correctpassword";
    let hash = hash_password_with_cost(password, TEST_COST).unwrap();

    assert!(verify_password(password, &hash).unwrap());
}

#[test]
fn test_verify_password_incorrect() {
    let hash = hash_password_with_cost("correctpassword", TEST_COST).unwrap();

    assert!(!verify_password("wrongpassword", &hash).unwrap());
}

#[test]
fn test_same_password_hashes_differently() {
    let first = hash_password_with_cost("samepassword", TEST_COST).unwrap();
    let second = hash_password_with_cost("samepassword", TEST_COST).unwrap();

    assert_ne!(first, second);
    assert!(verify_password("samepassword", &first).unwrap());
    assert!(verify_password("samepassword", &second).unwrap());
}

#[test]
fn test_verify_against_malformed_hash() {
    assert!(verify_password("password", "not-a-bcrypt-hash").is_err());
}

#[test]
fn test_generated_password_verifies() {
    let password = generate_password(12);
    let hash = hash_password_with_cost(&password, TEST_COST).unwrap();

    assert!(verify_password(&password, &hash).unwrap());
}
