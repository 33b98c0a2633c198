// State management module.
// Budget selection state and the load lifecycle it moves through.

pub mod budget;
pub mod loading;

pub use budget::BudgetData;
pub use loading::LoadState;
