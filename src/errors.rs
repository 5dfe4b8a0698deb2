use failure::{Context, Error as FailureError, Fail};
use postgres;
use postgres::error::SqlState;
use r2d2;

/// Kinds of failures a caller of the order services can observe.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Fail)]
pub enum Error {
    #[fail(display = "Not enough recipes to fulfill the order")]
    InsufficientInventory,
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "No unpaid week left")]
    NoUnpaidWeek,
    #[fail(display = "Order is being modified concurrently")]
    ConcurrentModification,
    #[fail(display = "Payment gateway call failed")]
    UpstreamGateway,
    #[fail(display = "Validation error")]
    Validation,
    #[fail(display = "Parse error")]
    Parse,
    #[fail(display = "Invalid webhook signature")]
    InvalidSignature,
    #[fail(display = "Connection failure")]
    Connection,
}

#[derive(Clone, Debug, Fail)]
pub enum RepoError {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Row is locked by another transaction")]
    ConcurrentModification,
    #[fail(display = "Constraint violated: {}", reason)]
    Constraint { reason: String },
    #[fail(display = "Connection: {}", reason)]
    Connection { reason: String },
}

impl From<postgres::Error> for RepoError {
    fn from(v: postgres::Error) -> Self {
        match v.code() {
            Some(code) if *code == SqlState::LOCK_NOT_AVAILABLE || *code == SqlState::T_R_SERIALIZATION_FAILURE => {
                RepoError::ConcurrentModification
            }
            Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION || *code == SqlState::UNIQUE_VIOLATION => {
                RepoError::Constraint { reason: format!("{}", v) }
            }
            _ => RepoError::Connection { reason: format!("{}", v) },
        }
    }
}

impl From<r2d2::Error> for RepoError {
    fn from(v: r2d2::Error) -> Self {
        RepoError::Connection { reason: format!("{}", v) }
    }
}

impl From<RepoError> for Error {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => Error::NotFound,
            RepoError::ConcurrentModification => Error::ConcurrentModification,
            RepoError::Constraint { .. } => Error::Validation,
            RepoError::Connection { .. } => Error::Connection,
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Finds the first error kind in the cause chain, whether raised directly or attached as context.
pub fn error_kind(e: &FailureError) -> Option<Error> {
    for cause in e.iter_chain() {
        if let Some(kind) = cause.downcast_ref::<Error>() {
            return Some(*kind);
        }
        if let Some(ctx) = cause.downcast_ref::<Context<Error>>() {
            return Some(*ctx.get_context());
        }
        if let Some(repo_error) = cause.downcast_ref::<RepoError>() {
            return Some(repo_error.clone().into());
        }
    }

    None
}
