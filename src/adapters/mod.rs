//! External store adapters
//!
//! The price series and the prediction log live outside this crate; these
//! traits are the seam, with a Postgres implementation, an in-memory one and
//! a retrying wrapper.

pub mod memory;
pub mod postgres;
pub mod retry;
pub mod store;

pub use memory::InMemoryMarketStore;
pub use postgres::PgMarketStore;
pub use retry::{RetryPolicy, RetryingStore};
pub use store::{PredictionLog, PriceStore};

/// Whether `name` is safe to splice into SQL as a (optionally schema
/// qualified) table name.
pub fn is_valid_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("price_points"));
        assert!(is_valid_identifier("market.price_points"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1prices"));
        assert!(!is_valid_identifier("prices; DROP TABLE x"));
        assert!(!is_valid_identifier("a.b.c"));
    }
}
