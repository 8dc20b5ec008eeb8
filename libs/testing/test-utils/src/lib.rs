//! Shared test utilities for domain and handler tests.
//!
//! - `TestDataBuilder`: deterministic ids, names and addresses seeded from the test name
//! - `fixtures`: known-good IBANs, a policy-compliant password and a JWT secret
//! - `assertions`: helpers for UUIDs, options and error bodies
//!
//! ```
//! use test_utils::TestDataBuilder;
//!
//! let data = TestDataBuilder::from_test_name("test_create_user");
//! let email = data.email("staff");
//! assert!(email.ends_with("@example.com"));
//! ```

use uuid::Uuid;

/// Deterministic test data generator.
///
/// Two builders created from the same test name produce the same values, and
/// different labels within one test never collide.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seeds the builder from a hash of the test name.
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Stable UUID for `label` within this test.
    pub fn id(&self, label: &str) -> Uuid {
        let mix = self.mix(label);
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.seed.to_le_bytes());
        bytes[8..].copy_from_slice(&mix.to_le_bytes());
        Uuid::from_bytes(bytes)
    }

    /// Short lowercase username, e.g. `staff_3f2a91`.
    pub fn username(&self, label: &str) -> String {
        format!("{}_{:06x}", label, self.mix(label) & 0xff_ffff)
    }

    pub fn email(&self, label: &str) -> String {
        format!("{}@example.com", self.username(label))
    }

    /// `test-<prefix>-<seed>-<suffix>`
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    fn mix(&self, label: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        label.hash(&mut hasher);
        hasher.finish()
    }
}

/// Values that satisfy the account validation rules.
pub mod fixtures {
    /// Valid IBANs from distinct countries; each passes the mod-97 check.
    pub const VALID_IBANS: [&str; 6] = [
        "DE44500105175407324931",
        "GB82WEST12345698765432",
        "NL91ABNA0417164300",
        "FR1420041010050500013M02606",
        "BE68539007547034",
        "CH9300762011623852957",
    ];

    /// Right length and country, wrong checksum.
    pub const BAD_CHECKSUM_IBAN: &str = "DE44500105175407324932";

    /// Passes the password policy for any generated username.
    pub const PASSWORD: &str = "superman!@#";

    pub const JWT_SECRET: &str = "test-secret-key-that-is-at-least-32-characters";
}

/// Test assertion helpers
pub mod assertions {
    use serde_json::Value;
    use uuid::Uuid;

    pub fn assert_uuid_eq(actual: Uuid, expected: Uuid, context: &str) {
        assert_eq!(
            actual, expected,
            "{}: expected UUID {}, got {}",
            context, expected, actual
        );
    }

    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Asserts an error body lists `field` under `details` and returns its messages.
    pub fn assert_field_error(body: &Value, field: &str) -> Vec<String> {
        let entries = body["details"][field]
            .as_array()
            .unwrap_or_else(|| panic!("expected field error for '{}', body: {}", field, body));
        entries
            .iter()
            .map(|e| e["message"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}
