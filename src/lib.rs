// Ensure each result error is either unwrapped or returned
#![deny(unused_must_use)]

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

pub mod class;
pub mod error;
pub mod instruction;
pub mod javap;
pub mod jvm;
pub mod read;

pub use crate::class::ClassFile;
pub use crate::error::{ClassError, VmError};
pub use crate::jvm::{ClassPath, JavaVm};
