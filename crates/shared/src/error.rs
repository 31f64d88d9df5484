use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// Signing was rejected or the submission never produced a digest.
    #[error("submission failed: {0}")]
    Submission(String),
    /// The ledger executed the transaction and reported failure.
    #[error("execution failed: {0}")]
    Execution(String),
    /// The wait for the transaction's effects itself failed.
    #[error("confirmation wait failed: {0}")]
    ConfirmationWait(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("object query failed: {0}")]
    Transport(String),
    #[error("malformed object response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorRecord {
    #[error(transparent)]
    Fetch(#[from] QueryError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl ErrorRecord {
    pub fn message(&self) -> String {
        self.to_string()
    }
}
