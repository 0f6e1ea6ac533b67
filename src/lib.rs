#![allow(warnings)]
#![allow(dead_code)]

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate lazy_static;

pub mod api;
mod def;
mod enc;
mod ipred;
mod mc;
mod tbl;
mod tracer;
mod util;

#[cfg(feature = "bench")]
pub mod bench;
