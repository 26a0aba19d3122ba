use foundation::RecordId;
use formats::FormatError;

/// One dataset row was rejected. Never fatal: the row is excluded and the
/// rest of the dataset loads.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingField(&'static str),
    InvalidId(String),
    DuplicateId(RecordId),
    InvalidNumber { field: &'static str, value: String },
    CoordinateOutOfRange { lat: f64, lng: f64 },
    UnknownCategory(String),
    UnknownClimateImpact(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "missing required field `{field}`"),
            ValidationError::InvalidId(raw) => {
                write!(f, "id must be a positive integer, got {raw:?}")
            }
            ValidationError::DuplicateId(id) => write!(f, "duplicate record id {id}"),
            ValidationError::InvalidNumber { field, value } => {
                write!(f, "`{field}` is not a number: {value:?}")
            }
            ValidationError::CoordinateOutOfRange { lat, lng } => {
                write!(f, "coordinate out of range: lat={lat} lng={lng}")
            }
            ValidationError::UnknownCategory(raw) => write!(f, "unknown category {raw:?}"),
            ValidationError::UnknownClimateImpact(raw) => {
                write!(f, "unknown climate impact {raw:?}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Error reported by the externally supplied fetch primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FetchError {}

/// The dataset could not be obtained at all. Fatal for the session until the
/// user retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Fetch(FetchError),
    Parse(FormatError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Fetch(e) => write!(f, "failed to fetch dataset: {e}"),
            LoadError::Parse(e) => write!(f, "failed to parse dataset: {e}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Fetch(e) => Some(e),
            LoadError::Parse(e) => Some(e),
        }
    }
}

impl From<FormatError> for LoadError {
    fn from(e: FormatError) -> Self {
        LoadError::Parse(e)
    }
}

impl From<FetchError> for LoadError {
    fn from(e: FetchError) -> Self {
        LoadError::Fetch(e)
    }
}
