pub mod logging;
pub mod pagination;
pub mod security;
pub mod similarity;
pub mod validation;

pub use logging::truncate_text;
pub use pagination::{paginate, Page};
pub use security::{generate_salt, hash_password, verify_password};
pub use similarity::string_similarity;
pub use validation::{
    format_ilos, validate_email, validate_password_strength, validate_username,
};
