//! JSON-RPC error mapping
//!
//! 4xxx codes are caller errors, 5xxx are failures on the daemon side.

use enrich_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    /// A pipeline run is already active
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const ENGINE_ERROR: i32 = 5002;
}

fn error_code(err: &AppError) -> i32 {
    match err {
        AppError::Validation(_) | AppError::Domain(_) | AppError::Serialization(_) => {
            code::VALIDATION_ERROR
        }
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Conflict(_) | AppError::InvalidState(_) => code::CONFLICT,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Engine(_) => code::ENGINE_ERROR,
        AppError::Io(_) | AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    }
}

/// Convert AppError to a JSON-RPC error object (message is the error's Display)
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(error_code(&err), err.to_string(), None::<()>)
}
