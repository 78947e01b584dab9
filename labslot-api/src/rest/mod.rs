pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::{ApiDoc, create_router};
