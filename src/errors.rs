use thiserror::Error;

/// Everything that can go wrong inside the coin economy. Validation kinds are
/// returned to callers as structured results so the UI can branch on them;
/// `Db` is the only kind that maps to a 500.
#[derive(Debug, Error)]
pub enum EconomyError {
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("discount code not found")]
    InvalidCode,
    #[error("discount code is inactive")]
    InactiveCode,
    #[error("discount code has expired")]
    ExpiredCode,
    #[error("discount code already used")]
    AlreadyUsed,
    #[error("discount code redemption limit reached")]
    MaxRedemptions,
    #[error("purchase amount below code minimum")]
    MinPurchaseNotMet,
    #[error("gift not found")]
    GiftNotFound,
    #[error("cannot send a gift to yourself")]
    SelfGift,
    #[error("receiver is not an approved creator")]
    ReceiverNotCreator,
    #[error("coin package not found")]
    PackageNotFound,
    #[error(transparent)]
    Db(#[from] diesel::result::Error),
}

impl EconomyError {
    /// Stable code the HTTP layer puts on the wire.
    pub fn error_code(&self) -> &'static str {
        match self {
            EconomyError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            EconomyError::InvalidCode => "INVALID_CODE",
            EconomyError::InactiveCode => "INACTIVE_CODE",
            EconomyError::ExpiredCode => "EXPIRED_CODE",
            EconomyError::AlreadyUsed => "ALREADY_USED",
            EconomyError::MaxRedemptions => "MAX_REDEMPTIONS",
            EconomyError::MinPurchaseNotMet => "MIN_PURCHASE",
            EconomyError::GiftNotFound => "GIFT_NOT_FOUND",
            EconomyError::SelfGift => "SELF_GIFT",
            EconomyError::ReceiverNotCreator => "RECEIVER_NOT_CREATOR",
            EconomyError::PackageNotFound => "PACKAGE_NOT_FOUND",
            EconomyError::Db(_) => "INTERNAL",
        }
    }

    pub fn is_validation(&self) -> bool {
        !matches!(self, EconomyError::Db(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_match_the_client_contract() {
        assert_eq!(EconomyError::InvalidCode.error_code(), "INVALID_CODE");
        assert_eq!(EconomyError::InactiveCode.error_code(), "INACTIVE_CODE");
        assert_eq!(EconomyError::ExpiredCode.error_code(), "EXPIRED_CODE");
        assert_eq!(EconomyError::AlreadyUsed.error_code(), "ALREADY_USED");
        assert_eq!(EconomyError::MaxRedemptions.error_code(), "MAX_REDEMPTIONS");
        assert_eq!(EconomyError::MinPurchaseNotMet.error_code(), "MIN_PURCHASE");
        assert_eq!(EconomyError::InsufficientBalance.error_code(), "INSUFFICIENT_BALANCE");
        assert!(EconomyError::SelfGift.is_validation());
        assert!(!EconomyError::Db(diesel::result::Error::NotFound).is_validation());
    }
}
