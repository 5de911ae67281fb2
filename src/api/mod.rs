pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod imports;
pub(crate) mod reports;
pub(crate) mod router;
