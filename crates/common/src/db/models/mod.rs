//! SeaORM entity models

mod session;

pub use session::{
    Entity as SessionEntity,
    Model as Session,
    ActiveModel as SessionActiveModel,
    Column as SessionColumn,
};
