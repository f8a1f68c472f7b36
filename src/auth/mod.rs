pub mod password;
pub mod register;
pub mod user;

pub use password::*;
pub use register::*;
pub use user::*;
