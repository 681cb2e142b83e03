use spec_core::{PageListError, ParamsError, SpecError};
use thiserror::Error;

/// Domain-specific errors using thiserror
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid query: {0}")]
    InvalidSpecification(#[from] SpecError),

    #[error("Invalid query parameter: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Invalid page index {index}: pages are numbered from 1")]
    InvalidPageIndex { index: u64 },

    #[error("Order not found for payment intent '{payment_intent_id}'")]
    OrderNotFound { payment_intent_id: String },

    #[error("Dataset error: {message}")]
    Dataset { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },
}

impl DomainError {
    pub fn order_not_found(payment_intent_id: impl Into<String>) -> Self {
        Self::OrderNotFound {
            payment_intent_id: payment_intent_id.into(),
        }
    }

    pub fn dataset(message: impl Into<String>) -> Self {
        Self::Dataset {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

impl<E: std::fmt::Display> From<PageListError<E>> for DomainError {
    fn from(e: PageListError<E>) -> Self {
        match e {
            PageListError::InvalidPageIndex(index) => Self::InvalidPageIndex { index },
            PageListError::Source(e) => Self::query(e.to_string()),
        }
    }
}
