//! Backend-issued identifiers
//!
//! Every entity id is an integer issued by the backend. The newtypes keep a
//! task id from being passed where a user id is expected; [`IdInput`] is the
//! untyped value a caller hands over before it has been validated.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw integer value
            #[inline]
            #[must_use]
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

backend_id!(
    /// Case identifier
    CaseId
);
backend_id!(
    /// User identifier
    UserId
);
backend_id!(
    /// Task identifier
    TaskId
);
backend_id!(
    /// Case assignment (team membership) identifier
    AssignmentId
);
backend_id!(
    /// Transfer request identifier
    TransferId
);

/// An id as supplied by a caller, before validation
///
/// UI layers hand over whatever they have bound: a number parsed from a route,
/// a string from a form field, or nothing at all. Operations that take ids
/// validate them up front and refuse to touch the network when they are bad.
#[derive(Debug, Clone, PartialEq)]
pub enum IdInput {
    /// Absent (`null` / `undefined`)
    Missing,
    /// Integer value, e.g. an id already held as a number
    Int(i64),
    /// Floating value, possibly non-finite or fractional
    Number(f64),
    /// Textual value, e.g. a route parameter
    Text(String),
}

impl IdInput {
    /// Validate into a positive integer id
    ///
    /// # Errors
    /// `ModelError::InvalidId` when the value is missing, `NaN`, infinite,
    /// fractional, non-positive or non-numeric text.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn validate(&self, field: &'static str) -> Result<i64, ModelError> {
        let invalid = || ModelError::InvalidId {
            field,
            value: self.to_string(),
        };

        match self {
            Self::Missing => Err(invalid()),
            Self::Int(n) if *n > 0 => Ok(*n),
            Self::Int(_) => Err(invalid()),
            Self::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && *n >= 1.0 && *n <= i64::MAX as f64 {
                    Ok(*n as i64)
                } else {
                    Err(invalid())
                }
            }
            Self::Text(s) => match s.trim().parse::<i64>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(invalid()),
            },
        }
    }

    /// Validate as a [`CaseId`]
    pub fn case_id(&self) -> Result<CaseId, ModelError> {
        self.validate("caseId").map(CaseId)
    }

    /// Validate as a [`UserId`]
    pub fn user_id(&self) -> Result<UserId, ModelError> {
        self.validate("userId").map(UserId)
    }

    /// Validate as a [`TaskId`]
    pub fn task_id(&self) -> Result<TaskId, ModelError> {
        self.validate("taskId").map(TaskId)
    }
}

impl fmt::Display for IdInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("<missing>"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for IdInput {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for IdInput {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for IdInput {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for IdInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for IdInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for IdInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

macro_rules! id_input_from_newtype {
    ($($name:ident),*) => {
        $(
            impl From<$name> for IdInput {
                fn from(value: $name) -> Self {
                    Self::from(value.0)
                }
            }
        )*
    };
}

id_input_from_newtype!(CaseId, UserId, TaskId, AssignmentId, TransferId);

impl<T: Into<IdInput>> From<Option<T>> for IdInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}
