pub mod id;
pub mod record;
pub mod step;

pub use id::*;
pub use record::*;
pub use step::*;
