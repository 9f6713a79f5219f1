pub use attribution::*;
pub use counter::*;

mod attribution;
mod counter;
