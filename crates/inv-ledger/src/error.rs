// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Requests the ledger refuses outright. Contention and sold-out are not
/// errors; they are [`OrderOutcome`](crate::OrderOutcome)s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Order and restock quantities must be strictly positive.
    InvalidQuantity { quantity: i64 },
    /// SKU keys must be non-empty.
    EmptySku,
    /// Opening stock must be non-negative.
    NegativeStock { sku: String, stock: i64 },
    /// `register_sku` on a SKU that already exists.
    SkuExists { sku: String },
    /// Operation on a SKU that was never registered.
    UnknownSku { sku: String },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuantity { quantity } => {
                write!(f, "ledger invariant: quantity must be > 0, got {quantity}")
            }
            Self::EmptySku => write!(f, "ledger invariant: sku must not be empty"),
            Self::NegativeStock { sku, stock } => write!(
                f,
                "ledger invariant: opening stock for {sku} must be >= 0, got {stock}"
            ),
            Self::SkuExists { sku } => write!(f, "ledger: sku {sku} already registered"),
            Self::UnknownSku { sku } => write!(f, "ledger: sku {sku} not found"),
        }
    }
}

impl std::error::Error for LedgerError {}
