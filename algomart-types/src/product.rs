//! Read-only product summary consumed by the trial engine.

use crate::ids::ProductId;
use serde::{Deserialize, Serialize};

/// What the engine needs to know about a catalog product.
///
/// Owned by the catalog service; the trial engine never mutates products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Catalog identifier.
    pub id: ProductId,
    /// Length of the free trial granted for this product.
    pub trial_duration_days: u32,
    /// Whether the product can be trialed at all.
    pub trial_eligible: bool,
}
