pub mod ber;
pub mod ids;
pub mod kag;
pub mod record;

pub use ber::*;
pub use ids::*;
pub use kag::*;
pub use record::*;
