mod amount;
mod donation;
mod notification;
mod operator;
mod partner;

pub use amount::*;
pub use donation::*;
pub use notification::*;
pub use operator::*;
pub use partner::*;
