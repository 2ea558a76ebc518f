pub mod prompt;

pub use prompt::{Confirm, StdinConfirm};
