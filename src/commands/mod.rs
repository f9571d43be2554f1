use crate::{db::DbPool, errors::ServiceError, events::EventSender};
use async_trait::async_trait;
use sea_orm::TransactionError;
use std::sync::Arc;

pub mod returns;

/// Command trait for implementing the Command Pattern
///
/// This trait allows for encapsulating all the logic needed to execute a business operation
/// into a single object that can be validated, executed, and produce events.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Arguments
    /// * `db_pool` - Database connection pool for persistence operations
    /// * `event_sender` - Channel to publish domain events
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

/// Flattens a sea-orm transaction failure into the error that caused it.
pub(crate) fn transaction_error(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
