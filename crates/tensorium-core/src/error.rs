use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid address length: {0} bytes, expected 20")]
    InvalidAddressLength(usize),
}

pub type Result<T> = std::result::Result<T, CoreError>;
