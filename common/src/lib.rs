#[macro_use]
extern crate async_trait;
#[macro_use]
pub extern crate failure;
pub extern crate async_std;
pub extern crate futures;

pub mod cancellation;
pub mod condvar;
pub mod errors;
pub mod io;
pub mod pipe;
pub mod task;

pub use async_trait::*;
pub use failure::Fail;
