//! Read-only seams to the product catalog and entitlement system.
//!
//! Both are external collaborators: the engine consults them during
//! authorization and never writes through them.

use algomart_types::{ProductId, ProductInfo, UserId};

/// Lookup into the storefront catalog.
pub trait ProductCatalog: Send + Sync {
    /// Returns the product summary, or `None` for an unknown product.
    fn product(&self, id: &ProductId) -> Option<ProductInfo>;
}

/// Lookup into active paid grants.
///
/// Trial and paid subscription are mutually exclusive concurrently: a user
/// holding an active subscription for a product is denied a trial of it.
pub trait SubscriptionSource: Send + Sync {
    /// Returns true if the user currently holds a paid grant for the product.
    fn has_active_subscription(&self, user_id: &UserId, product_id: &ProductId) -> bool;
}
