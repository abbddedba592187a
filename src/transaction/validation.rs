/// Admission rules for a proposed transfer, checked before any mining work.
use crate::error::ValidationError;
use crate::participant::Participant;
use crate::transaction::types::Coin;

pub const VALID_MESSAGE: &str = "Valid transaction. New block added to chain.";

/// Outcome of [`validate`]: a verdict plus a message fit for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub message: String,
    pub error: Option<ValidationError>,
}

impl ValidationResult {
    fn accepted() -> Self {
        Self {
            valid: true,
            message: VALID_MESSAGE.to_string(),
            error: None,
        }
    }

    fn rejected(error: ValidationError) -> Self {
        Self {
            valid: false,
            message: error.to_string(),
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<String, ValidationError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.message),
        }
    }
}

/// Decide whether `sender` may move `amount` to `receiver`. Reads the two
/// balances and nothing else.
pub fn validate(sender: &dyn Participant, receiver: &dyn Participant, amount: Coin) -> ValidationResult {
    match check(sender, receiver, amount) {
        Ok(()) => ValidationResult::accepted(),
        Err(error) => ValidationResult::rejected(error),
    }
}

fn check(sender: &dyn Participant, receiver: &dyn Participant, amount: Coin) -> Result<(), ValidationError> {
    if amount <= Coin::ZERO {
        return Err(ValidationError::NoAmount);
    }

    if sender.key() == receiver.key() {
        return Err(ValidationError::InvalidParties);
    }

    if sender.balance() < amount {
        return Err(ValidationError::InsufficientBalance);
    }

    ensure_receiver_capacity(receiver, amount)
}

/// The receiver's balance must stay representable after the credit.
pub fn ensure_receiver_capacity(receiver: &dyn Participant, amount: Coin) -> Result<(), ValidationError> {
    match receiver.balance().checked_add(amount) {
        Some(_) => Ok(()),
        None => Err(ValidationError::ReceiverOverflow),
    }
}
