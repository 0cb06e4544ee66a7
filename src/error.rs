use derive_more::From;

use crate::backend::BackendError;
use crate::providers::controller::ControllerError;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Backend(BackendError),

    #[from]
    Controller(ControllerError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Backend(e) => write!(f, "{}", e),
            Error::Controller(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}
