pub mod attachment;
pub mod enums;
pub mod filters;
pub mod visit;

pub use attachment::*;
pub use enums::*;
pub use filters::*;
pub use visit::*;
