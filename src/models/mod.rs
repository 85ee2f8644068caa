pub mod deal;
pub mod identity;
pub mod outcome;
pub mod source;

// Re-exports for convenience
pub use deal::*;
pub use identity::*;
pub use outcome::*;
pub use source::*;
