use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum DataRecordParsingError {
    #[error("end of data")]
    EOF,
    #[error("not implemented")]
    NotImplemented,
    #[error("invalid data")]
    InvalidData,
    #[error("failed to parse record: {0}")]
    ParseFailure(String),
}

impl From<std::num::ParseFloatError> for DataRecordParsingError {
    fn from(err: std::num::ParseFloatError) -> Self {
        DataRecordParsingError::ParseFailure(err.to_string())
    }
}

impl From<std::num::ParseIntError> for DataRecordParsingError {
    fn from(err: std::num::ParseIntError) -> Self {
        DataRecordParsingError::ParseFailure(err.to_string())
    }
}

pub trait ParseableDataRecord {
    type Metadata;

    fn from_data_row(
        _metadata: Option<&Self::Metadata>,
        _row: &[&str],
    ) -> Result<Self, DataRecordParsingError>
    where
        Self: Sized,
    {
        Err(DataRecordParsingError::NotImplemented)
    }
}
