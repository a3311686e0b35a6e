pub mod account;

// Re-export handler functions for use in routing
pub use account::delete_account;
pub use account::method_not_allowed;
pub use account::preflight;
