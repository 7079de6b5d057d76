//! User model
//!
//! A payment-system account holder. Each user has:
//! - A stable opaque identifier
//! - A normalized phone number (also the local part of their VPA)
//! - A balance (i64 paise)
//! - An active flag
//!
//! CRITICAL: All money values are i64 (paise)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during user balance operations
#[derive(Debug, Error, PartialEq)]
pub enum UserError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },
}

/// An account holder in the payment system
///
/// # Example
/// ```
/// use chrono::Utc;
/// use fraud_detection_core_rs::User;
///
/// let mut user = User::new("u1".to_string(), "9876543210".to_string(), 1_000_000, Utc::now());
/// user.debit(20_000).unwrap(); // Rs 200.00
/// assert_eq!(user.balance(), 980_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque stable identifier
    user_id: String,

    /// Normalized phone number (unique)
    phone: String,

    /// Current balance (i64 paise, non-negative)
    balance: i64,

    /// Account creation time
    created_at: DateTime<Utc>,

    /// Deactivated users cannot transact
    is_active: bool,
}

impl User {
    /// Create a new active user
    ///
    /// # Panics
    /// Panics if `balance` is negative.
    pub fn new(user_id: String, phone: String, balance: i64, created_at: DateTime<Utc>) -> Self {
        assert!(balance >= 0, "balance must be non-negative");
        Self {
            user_id,
            phone,
            balance,
            created_at,
            is_active: true,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Current balance (i64 paise)
    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Whether a debit of `amount` paise would keep the balance non-negative
    pub fn can_pay(&self, amount: i64) -> bool {
        amount <= self.balance
    }

    /// Debit (decrease) the balance
    ///
    /// # Arguments
    /// * `amount` - Amount to debit (i64 paise, must be non-negative)
    pub fn debit(&mut self, amount: i64) -> Result<(), UserError> {
        assert!(amount >= 0, "amount must be non-negative");
        if !self.can_pay(amount) {
            return Err(UserError::InsufficientBalance {
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Credit (increase) the balance
    pub fn credit(&mut self, amount: i64) {
        assert!(amount >= 0, "amount must be non-negative");
        self.balance += amount;
    }
}
