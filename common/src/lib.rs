mod db;
mod errors;
mod helpers;
mod lifecycle;
mod locks;
mod operators;
mod partners;
mod pix;
mod schema;
mod signature;
mod webhook;

pub use db::*;
pub use errors::*;
pub use helpers::*;
pub use lifecycle::*;
pub use locks::*;
pub use operators::*;
pub use partners::*;
pub use pix::*;
pub use schema::*;
pub use signature::*;
pub use webhook::*;
