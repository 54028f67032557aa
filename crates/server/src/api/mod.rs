pub mod handlers;
pub mod middleware;
pub mod passes;
pub mod routes;
pub mod sync;
pub mod tickets;

pub use routes::create_router;
