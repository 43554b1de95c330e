pub mod catalog;
pub mod page;
pub mod review;
pub mod tag;
pub mod user;

pub use catalog::*;
pub use page::*;
pub use review::*;
pub use tag::*;
pub use user::*;
