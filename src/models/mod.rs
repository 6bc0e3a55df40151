pub mod attribute;
pub mod product;

pub use attribute::*;
pub use product::*;
