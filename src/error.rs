// Error taxonomy for the whole crate. Config/validation errors are fatal at
// load time; step-time conditions (lookup misses, snap failures, state file
// mismatches) are soft and never surface here - they contribute zeros or
// defaults and emit a warning at the call site instead.

#[derive(Debug)]
pub enum LimnoError {
    Config(String),
    Validation(String),
    Raster(String),
    IoError(std::io::Error),
    CsvError(String),
}

impl std::fmt::Display for LimnoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimnoError::Config(msg) => write!(f, "Configuration error: {}", msg),
            LimnoError::Validation(msg) => write!(f, "Validation error: {}", msg),
            LimnoError::Raster(msg) => write!(f, "Raster error: {}", msg),
            LimnoError::IoError(e) => write!(f, "IO error: {}", e),
            LimnoError::CsvError(msg) => write!(f, "CSV error: {}", msg),
        }
    }
}

impl std::error::Error for LimnoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LimnoError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LimnoError {
    fn from(error: std::io::Error) -> Self {
        LimnoError::IoError(error)
    }
}

impl From<csv::Error> for LimnoError {
    fn from(error: csv::Error) -> Self {
        LimnoError::CsvError(error.to_string())
    }
}

impl From<LimnoError> for String {
    fn from(error: LimnoError) -> Self {
        error.to_string()
    }
}

pub type Result<T> = std::result::Result<T, LimnoError>;
