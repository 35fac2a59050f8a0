mod service_auth;

pub use service_auth::*;
