pub mod filters;
pub mod health;
pub mod recommendations;
pub mod wines;

pub use filters::get_filters;
pub use health::health_check;
pub use recommendations::recommendations_config;
pub use wines::wines_config;
