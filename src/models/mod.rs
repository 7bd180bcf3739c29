pub mod lenient;
pub mod payload;
pub mod product;

pub use payload::{MutationAction, ProductChanges, ProductPayload, ProductRef, TargetedChanges};
pub use product::{Product, ProductStatus, StatusFilter, Step};
