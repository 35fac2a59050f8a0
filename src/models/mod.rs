mod download_token;
mod order;

pub use download_token::*;
pub use order::*;
