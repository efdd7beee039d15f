use thiserror::Error;

use crate::model::{ResponseError, SessionError, TemplateError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Response(#[from] ResponseError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
