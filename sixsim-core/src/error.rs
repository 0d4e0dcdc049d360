use thiserror::Error;

use crate::Asn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("virtual clock cannot move backwards from ASN {now} to ASN {requested}")]
    ClockRegression { now: Asn, requested: Asn },
}
