pub(crate) mod bmc;
pub(crate) mod helpers;
pub(crate) mod prove;
pub(crate) mod scenario;
