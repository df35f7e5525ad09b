pub mod lenient;
pub mod model;
pub mod phone;
pub mod reference;
pub mod schema;
pub mod sla;

pub use model::*;
pub use phone::*;
pub use reference::*;
pub use schema::*;
pub use sla::*;
