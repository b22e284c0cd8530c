pub mod envelope;
pub mod health;
pub mod search;
pub mod server;
pub mod tool;

pub use envelope::{CallEnvelope, ReplyEnvelope, RpcError};
pub use health::{BatchHealthRecord, CheckedCall, HealthRecord, RegistrationCheck};
pub use search::SearchRequest;
pub use server::{Server, ServerStatus, TransportType};
pub use tool::{ServerTool, Tool};
