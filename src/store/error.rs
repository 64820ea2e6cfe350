//! Local entity store error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("group {0} is already registered")]
    GroupAlreadyRegistered(i64),

    #[error("relation {0} is already registered")]
    RelationAlreadyRegistered(i64),
}
