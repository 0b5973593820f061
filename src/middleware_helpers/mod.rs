pub mod request_id;
pub mod session;

pub use request_id::request_id_middleware;
pub use session::{session_middleware, SessionLayer, SESSION_HEADER};
