pub use enums::*;
pub use flat_array::*;
pub use int_pair::*;
pub use ui_variable::*;

mod enums;
mod flat_array;
mod int_pair;
mod ui_variable;
