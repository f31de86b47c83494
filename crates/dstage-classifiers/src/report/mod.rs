pub mod page;
pub mod plots;
pub mod waterfall;

pub use page::{render_outcome, render_page};
pub use plots::{force_plot_document, plot_force};
pub use waterfall::waterfall_svg;
