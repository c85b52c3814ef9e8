//! Operation - arithmetic transforms a blueprint can describe
//!
//! Every operation is checked: overflow and division by zero are reported
//! as `ContractError::Arithmetic` instead of wrapping or panicking.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ContractError;

/// Integer transform applied by a configured stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Operation {
    /// Pass the value through unchanged
    Identity,
    /// `x + n`
    Add(i64),
    /// `x - n`
    Sub(i64),
    /// `x * n`
    Mul(i64),
    /// `x / n`, fails for `n == 0`
    Div(i64),
    /// `x % n`, fails for `n == 0`
    Rem(i64),
}

impl Operation {
    /// Apply the operation to `input`
    pub fn apply(&self, input: i64) -> Result<i64, ContractError> {
        let result = match *self {
            Self::Identity => Some(input),
            Self::Add(n) => input.checked_add(n),
            Self::Sub(n) => input.checked_sub(n),
            Self::Mul(n) => input.checked_mul(n),
            Self::Div(0) | Self::Rem(0) => {
                return Err(ContractError::arithmetic(
                    self.to_string(),
                    input,
                    "division by zero",
                ))
            }
            Self::Div(n) => input.checked_div(n),
            Self::Rem(n) => input.checked_rem(n),
        };

        result.ok_or_else(|| ContractError::arithmetic(self.to_string(), input, "overflow"))
    }

    /// Whether `apply` can fail for some input
    pub fn is_fallible(&self) -> bool {
        !matches!(self, Self::Identity)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Add(n) => write!(f, "add({n})"),
            Self::Sub(n) => write!(f, "sub({n})"),
            Self::Mul(n) => write!(f, "mul({n})"),
            Self::Div(n) => write!(f, "div({n})"),
            Self::Rem(n) => write!(f, "rem({n})"),
        }
    }
}
