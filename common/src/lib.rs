mod constants;
mod recording;

pub mod util;

pub use constants::*;
pub use recording::*;
pub use util::{format_clock, millis};
